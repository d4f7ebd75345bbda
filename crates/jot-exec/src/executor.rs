use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use jot_core::DocumentId;
use jot_core::DraftProgress;
use jot_core::NoteContent;
use jot_core::NoteLoadStatus;
use jot_core::NoteRef;
use jot_core::NoteSaveStatus;
use jot_core::NotesAction;
use tracing::debug;
use tracing::warn;

use crate::contracts::Authenticator;
use crate::contracts::CollaboratorError;
use crate::contracts::SessionGrant;

/// Out-of-band work requested by the runtime. Each task reports back with
/// exactly one [`TaskCompletion`].
#[derive(Debug, Clone)]
pub enum NoteTask {
    Authenticate {
        seed: String,
    },
    FetchNote {
        grant: SessionGrant,
        document_id: DocumentId,
    },
    SaveDraft {
        grant: SessionGrant,
        title: String,
        content: NoteContent,
    },
    SaveNote {
        grant: SessionGrant,
        document_id: DocumentId,
        content: NoteContent,
    },
}

impl NoteTask {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::FetchNote { .. } => "fetch_note",
            Self::SaveDraft { .. } => "save_draft",
            Self::SaveNote { .. } => "save_note",
        }
    }
}

/// Sign-in count at the time a task was started. Bumped on every sign-in so
/// results from an earlier session can be told apart.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCompletion {
    pub task: &'static str,
    pub generation: Generation,
    pub actions: Vec<NotesAction>,
    pub failure: Option<String>,
}

pub trait TaskExecutor {
    fn spawn(&self, generation: Generation, task: NoteTask, done: Sender<TaskCompletion>);
}

/// Runs each task on the calling thread before returning.
#[derive(Clone)]
pub struct InlineExecutor {
    authenticator: Arc<dyn Authenticator>,
}

impl InlineExecutor {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

impl TaskExecutor for InlineExecutor {
    fn spawn(&self, generation: Generation, task: NoteTask, done: Sender<TaskCompletion>) {
        let _ = done.send(run_task(self.authenticator.as_ref(), generation, task));
    }
}

/// Runs each task on its own worker thread. A panicking task still reports
/// back, with its failure event.
#[derive(Clone)]
pub struct ThreadedExecutor {
    authenticator: Arc<dyn Authenticator>,
}

impl ThreadedExecutor {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }
}

impl TaskExecutor for ThreadedExecutor {
    fn spawn(&self, generation: Generation, task: NoteTask, done: Sender<TaskCompletion>) {
        let authenticator = Arc::clone(&self.authenticator);
        thread::spawn(move || {
            let kind = task.kind();
            let fallback = fallback_action(&task);
            let completion = panic::catch_unwind(AssertUnwindSafe(|| {
                run_task(authenticator.as_ref(), generation, task)
            }))
            .unwrap_or_else(|_| {
                warn!(task = kind, "task panicked");
                TaskCompletion {
                    task: kind,
                    generation,
                    actions: vec![fallback],
                    failure: Some(format!("{kind} task panicked")),
                }
            });
            let _ = done.send(completion);
        });
    }
}

/// The recoverable event reported when `task` does not succeed.
pub fn fallback_action(task: &NoteTask) -> NotesAction {
    match task {
        NoteTask::Authenticate { .. } => NotesAction::AuthFailed,
        NoteTask::FetchNote { document_id, .. } => NotesAction::NoteLoadingStatusChanged {
            document_id: document_id.clone(),
            status: NoteLoadStatus::Init,
        },
        NoteTask::SaveDraft { .. } => NotesAction::DraftStatusChanged {
            status: DraftProgress::Failed,
        },
        NoteTask::SaveNote { document_id, .. } => NotesAction::NoteSavingStatusChanged {
            document_id: document_id.clone(),
            status: NoteSaveStatus::SaveFailed,
        },
    }
}

pub fn run_task(
    authenticator: &dyn Authenticator,
    generation: Generation,
    task: NoteTask,
) -> TaskCompletion {
    let kind = task.kind();
    debug!(task = kind, generation, "task started");
    let fallback = fallback_action(&task);
    let outcome = match task {
        NoteTask::Authenticate { seed } => authenticate(authenticator, &seed),
        NoteTask::FetchNote { grant, document_id } => {
            fetch_note(authenticator, &grant, &document_id)
        }
        NoteTask::SaveDraft {
            grant,
            title,
            content,
        } => save_draft(authenticator, &grant, title, content),
        NoteTask::SaveNote {
            grant,
            document_id,
            content,
        } => save_note(authenticator, &grant, &document_id, content),
    };

    match outcome {
        Ok(action) => {
            debug!(task = kind, "task finished");
            TaskCompletion {
                task: kind,
                generation,
                actions: vec![action],
                failure: None,
            }
        }
        Err(err) => {
            warn!(task = kind, error = %err, "task failed");
            TaskCompletion {
                task: kind,
                generation,
                actions: vec![fallback],
                failure: Some(err.to_string()),
            }
        }
    }
}

fn authenticate(
    authenticator: &dyn Authenticator,
    seed: &str,
) -> Result<NotesAction, CollaboratorError> {
    let grant = authenticator.authenticate(seed)?;
    let connection = authenticator.connect(&grant)?;
    let notes = connection.index.list_notes()?;
    Ok(NotesAction::AuthSucceeded {
        store_handle: grant.store,
        index_handle: grant.index,
        notes,
    })
}

fn fetch_note(
    authenticator: &dyn Authenticator,
    grant: &SessionGrant,
    document_id: &DocumentId,
) -> Result<NotesAction, CollaboratorError> {
    let connection = authenticator.connect(grant)?;
    let document = connection.store.load(document_id)?;
    Ok(NotesAction::NoteContentLoaded {
        document_id: document_id.clone(),
        document,
    })
}

fn save_draft(
    authenticator: &dyn Authenticator,
    grant: &SessionGrant,
    title: String,
    content: NoteContent,
) -> Result<NotesAction, CollaboratorError> {
    let connection = authenticator.connect(grant)?;
    let document = connection.store.create(content)?;
    if let Err(err) = connection.index.add_note(NoteRef {
        id: document.id.clone(),
        title: title.clone(),
    }) {
        warn!(document_id = %document.id, error = %err, "stored document left out of the index");
        return Err(CollaboratorError::Unindexed {
            id: document.id,
            source: Box::new(err),
        });
    }
    Ok(NotesAction::DraftSaved {
        title,
        document_id: document.id.clone(),
        document,
    })
}

fn save_note(
    authenticator: &dyn Authenticator,
    grant: &SessionGrant,
    document_id: &DocumentId,
    content: NoteContent,
) -> Result<NotesAction, CollaboratorError> {
    let connection = authenticator.connect(grant)?;
    let document = connection.store.update(document_id, content)?;
    Ok(NotesAction::NoteSaved {
        document_id: document_id.clone(),
        document,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jot_core::IndexHandle;
    use jot_core::StoreHandle;
    use tempfile::tempdir;

    use std::sync::mpsc;

    use super::*;
    use crate::contracts::Connection;
    use crate::contracts::DocumentStore;
    use crate::contracts::IdentityIndex;
    use crate::local::LocalBackend;
    use pretty_assertions::assert_eq;

    const SEED: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

    fn content(text: &str) -> NoteContent {
        NoteContent {
            date: Utc::now(),
            text: text.to_string(),
        }
    }

    #[test]
    fn bad_seed_completes_with_auth_failed() {
        let dir = tempdir().expect("tmpdir");
        let backend = LocalBackend::open(dir.path()).expect("open");

        let completion = run_task(
            &backend,
            0,
            NoteTask::Authenticate {
                seed: "short".to_string(),
            },
        );

        assert_eq!(completion.task, "authenticate");
        assert_eq!(completion.actions, vec![NotesAction::AuthFailed]);
        assert!(completion.failure.is_some());
    }

    #[test]
    fn save_draft_creates_document_and_lists_it_in_index() {
        let dir = tempdir().expect("tmpdir");
        let backend = LocalBackend::open(dir.path()).expect("open");
        let grant = backend.authenticate(SEED).expect("auth");

        let completion = run_task(
            &backend,
            0,
            NoteTask::SaveDraft {
                grant: grant.clone(),
                title: "Groceries".to_string(),
                content: content("milk"),
            },
        );

        let [NotesAction::DraftSaved {
            title,
            document_id,
            document,
        }] = completion.actions.as_slice()
        else {
            panic!("unexpected completion {completion:?}");
        };
        assert_eq!(title, "Groceries");
        assert_eq!(document.text(), "milk");

        let listed = run_task(&backend, 0, NoteTask::Authenticate { seed: SEED.to_string() });
        let [NotesAction::AuthSucceeded { notes, .. }] = listed.actions.as_slice() else {
            panic!("unexpected completion {listed:?}");
        };
        assert_eq!(notes, &vec![NoteRef {
            id: document_id.clone(),
            title: "Groceries".to_string(),
        }]);
    }

    #[test]
    fn failed_fetch_returns_entry_to_init() {
        let dir = tempdir().expect("tmpdir");
        let backend = LocalBackend::open(dir.path()).expect("open");
        let grant = backend.authenticate(SEED).expect("auth");

        let completion = run_task(
            &backend,
            0,
            NoteTask::FetchNote {
                grant,
                document_id: DocumentId::from("missing"),
            },
        );

        assert_eq!(
            completion.actions,
            vec![NotesAction::NoteLoadingStatusChanged {
                document_id: DocumentId::from("missing"),
                status: NoteLoadStatus::Init,
            }]
        );
    }

    #[test]
    fn failed_save_reports_save_failed() {
        let dir = tempdir().expect("tmpdir");
        let backend = LocalBackend::open(dir.path()).expect("open");
        let grant = SessionGrant {
            store: StoreHandle::new("x", "did:jot:1"),
            index: IndexHandle::new("x", "did:jot:2"),
        };

        let completion = run_task(
            &backend,
            0,
            NoteTask::SaveNote {
                grant,
                document_id: DocumentId::from("a"),
                content: content("x"),
            },
        );

        assert_eq!(
            completion.actions,
            vec![NotesAction::NoteSavingStatusChanged {
                document_id: DocumentId::from("a"),
                status: NoteSaveStatus::SaveFailed,
            }]
        );
        assert_eq!(
            completion.failure.as_deref(),
            Some("store and index handles belong to different identities")
        );
    }

    /// Local store whose index refuses every write.
    struct ReadOnlyIndex(LocalBackend);

    struct RefusingIndex;

    impl IdentityIndex for RefusingIndex {
        fn list_notes(&self) -> Result<Vec<NoteRef>, CollaboratorError> {
            Ok(Vec::new())
        }

        fn add_note(&self, _note: NoteRef) -> Result<(), CollaboratorError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "index is read-only").into())
        }
    }

    impl Authenticator for ReadOnlyIndex {
        fn authenticate(&self, seed: &str) -> Result<SessionGrant, CollaboratorError> {
            self.0.authenticate(seed)
        }

        fn connect(&self, _grant: &SessionGrant) -> Result<Connection, CollaboratorError> {
            Ok(Connection {
                store: Box::new(self.0.store()),
                index: Box::new(RefusingIndex),
            })
        }
    }

    struct Panicking;

    impl Authenticator for Panicking {
        fn authenticate(&self, _seed: &str) -> Result<SessionGrant, CollaboratorError> {
            panic!("handshake blew up");
        }

        fn connect(&self, _grant: &SessionGrant) -> Result<Connection, CollaboratorError> {
            panic!("connect blew up");
        }
    }

    #[test]
    fn draft_stored_but_not_indexed_names_the_orphaned_document() {
        let dir = tempdir().expect("tmpdir");
        let backend = LocalBackend::open(dir.path()).expect("open");
        let grant = backend.authenticate(SEED).expect("auth");
        let authenticator = ReadOnlyIndex(backend.clone());

        let completion = run_task(
            &authenticator,
            3,
            NoteTask::SaveDraft {
                grant,
                title: "Lost".to_string(),
                content: content("orphan"),
            },
        );

        assert_eq!(
            completion.actions,
            vec![NotesAction::DraftStatusChanged {
                status: DraftProgress::Failed,
            }]
        );
        assert_eq!(completion.generation, 3);
        let failure = completion.failure.expect("failure reported");
        let id = failure
            .strip_prefix("document ")
            .and_then(|rest| rest.split_whitespace().next())
            .expect("orphaned id in message");
        assert!(failure.contains("was stored but not added to the index"));
        assert_eq!(
            backend.store().load(&DocumentId::from(id)).expect("still stored").text(),
            "orphan"
        );
    }

    #[test]
    fn panicking_worker_still_reports_completion() {
        let executor = ThreadedExecutor::new(Arc::new(Panicking));
        let (tx, rx) = mpsc::channel();

        executor.spawn(
            7,
            NoteTask::Authenticate {
                seed: SEED.to_string(),
            },
            tx,
        );
        let completion = rx.recv().expect("completion");

        assert_eq!(completion.generation, 7);
        assert_eq!(completion.actions, vec![NotesAction::AuthFailed]);
        assert_eq!(
            completion.failure.as_deref(),
            Some("authenticate task panicked")
        );
    }
}
