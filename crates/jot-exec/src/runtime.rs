use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;

use chrono::Utc;
use jot_core::dispatch;
use jot_core::reduce;
use jot_core::Dispatch;
use jot_core::DocumentId;
use jot_core::DraftProgress;
use jot_core::InvariantViolation;
use jot_core::NoteContent;
use jot_core::NoteEntry;
use jot_core::NoteLoadStatus;
use jot_core::NoteSaveStatus;
use jot_core::NotesAction;
use jot_core::NotesState;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::contracts::SessionGrant;
use crate::executor::Generation;
use crate::executor::NoteTask;
use crate::executor::TaskCompletion;
use crate::executor::TaskExecutor;

/// Single-threaded event loop around the reducer.
///
/// User intents are applied strictly and hand their I/O to the executor.
/// Completions come back over a channel and pass the staleness guard before
/// they reach the reducer. Completions started before the latest sign-in are
/// dropped unseen.
pub struct NotesRuntime<E: TaskExecutor> {
    state: NotesState,
    executor: E,
    generation: Generation,
    tx: Sender<TaskCompletion>,
    rx: Receiver<TaskCompletion>,
    in_flight: usize,
    failures: Vec<String>,
}

impl<E: TaskExecutor> NotesRuntime<E> {
    pub fn new(executor: E) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state: NotesState::new(),
            executor,
            generation: 0,
            tx,
            rx,
            in_flight: 0,
            failures: Vec::new(),
        }
    }

    pub fn state(&self) -> &NotesState {
        &self.state
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Collaborator failures reported since the last call.
    pub fn take_failures(&mut self) -> Vec<String> {
        std::mem::take(&mut self.failures)
    }

    pub fn authenticate(&mut self, seed: &str) -> Result<(), InvariantViolation> {
        self.apply(NotesAction::BeginAuth)?;
        self.generation += 1;
        self.start(NoteTask::Authenticate {
            seed: seed.to_string(),
        });
        Ok(())
    }

    pub fn go_home(&mut self) -> Result<(), InvariantViolation> {
        self.apply(NotesAction::ResetToHome)
    }

    pub fn open_draft(&mut self) -> Result<(), InvariantViolation> {
        self.apply(NotesAction::OpenDraft)
    }

    pub fn delete_draft(&mut self) -> Result<(), InvariantViolation> {
        self.apply(NotesAction::DeleteDraft)
    }

    /// Opens a note and fetches its content when only the index entry is
    /// known. An entry left at `Loading` by an abandoned fetch is fetched
    /// again.
    pub fn open_note(&mut self, document_id: &DocumentId) -> Result<(), InvariantViolation> {
        self.apply(NotesAction::OpenNote {
            document_id: document_id.clone(),
        })?;
        if let Some(NoteEntry::IndexLoaded { .. }) = self.state.note(document_id) {
            self.apply(NotesAction::NoteLoadingStatusChanged {
                document_id: document_id.clone(),
                status: NoteLoadStatus::Loading,
            })?;
            let grant = self.grant("openNote")?;
            self.start(NoteTask::FetchNote {
                grant,
                document_id: document_id.clone(),
            });
        }
        Ok(())
    }

    pub fn save_draft(&mut self, title: &str, text: &str) -> Result<(), InvariantViolation> {
        self.apply(NotesAction::DraftStatusChanged {
            status: DraftProgress::Saving,
        })?;
        let grant = self.grant("draftStatusChanged")?;
        self.start(NoteTask::SaveDraft {
            grant,
            title: title.to_string(),
            content: note_content(text),
        });
        Ok(())
    }

    pub fn save_note(
        &mut self,
        document_id: &DocumentId,
        text: &str,
    ) -> Result<(), InvariantViolation> {
        self.apply(NotesAction::NoteSavingStatusChanged {
            document_id: document_id.clone(),
            status: NoteSaveStatus::Saving,
        })?;
        let grant = self.grant("noteSavingStatusChanged")?;
        self.start(NoteTask::SaveNote {
            grant,
            document_id: document_id.clone(),
            content: note_content(text),
        });
        Ok(())
    }

    /// Applies every completion that is ready without blocking. Returns how
    /// many completions were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.complete(completion);
            handled += 1;
        }
        handled
    }

    /// Blocks until every started task has reported back.
    pub fn wait_idle(&mut self) {
        while self.in_flight > 0 {
            match self.rx.recv() {
                Ok(completion) => self.complete(completion),
                Err(_) => break,
            }
        }
    }

    fn apply(&mut self, action: NotesAction) -> Result<(), InvariantViolation> {
        let name = action.name();
        match reduce(&self.state, action) {
            Ok(next) => {
                debug!(action = name, "applied");
                self.state = next;
                Ok(())
            }
            Err(err) => {
                warn!(action = name, error = %err, "rejected");
                Err(err)
            }
        }
    }

    fn complete(&mut self, completion: TaskCompletion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if completion.generation < self.generation {
            debug!(
                task = completion.task,
                generation = completion.generation,
                current = self.generation,
                "completion from an earlier session dropped"
            );
            return;
        }
        if let Some(failure) = completion.failure {
            self.failures.push(failure);
        }
        for action in completion.actions {
            let name = action.name();
            match dispatch(&self.state, action) {
                Ok(Dispatch::Applied(next)) => {
                    debug!(task = completion.task, action = name, "completion applied");
                    self.state = next;
                }
                Ok(Dispatch::Ignored(reason)) => {
                    debug!(
                        task = completion.task,
                        action = name,
                        reason = reason.label(),
                        "stale completion dropped"
                    );
                }
                Err(err) => {
                    warn!(task = completion.task, action = name, error = %err, "completion rejected");
                }
            }
        }
    }

    fn start(&mut self, task: NoteTask) {
        info!(task = task.kind(), "starting task");
        self.in_flight += 1;
        self.executor.spawn(self.generation, task, self.tx.clone());
    }

    fn grant(&self, action: &'static str) -> Result<SessionGrant, InvariantViolation> {
        let session = self
            .state
            .session()
            .ok_or(InvariantViolation::NotAuthenticated { action })?;
        Ok(SessionGrant {
            store: session.store.clone(),
            index: session.index.clone(),
        })
    }
}

fn note_content(text: &str) -> NoteContent {
    NoteContent {
        date: Utc::now(),
        text: text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jot_core::DraftStatus;
    use jot_core::Navigation;
    use tempfile::tempdir;
    use tempfile::TempDir;

    use super::*;
    use crate::contracts::Authenticator;
    use std::sync::Mutex;

    use crate::contracts::DocumentStore;
    use crate::executor::run_task;
    use crate::executor::InlineExecutor;
    use crate::executor::ThreadedExecutor;
    use crate::local::LocalBackend;
    use pretty_assertions::assert_eq;

    const SEED: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
    const OTHER_SEED: &str = "99887766554433221100ffeeddccbbaa99887766554433221100ffeeddccbbaa";

    type Queued = (Generation, NoteTask, Sender<TaskCompletion>);

    /// Holds tasks until the test releases them, newest first, so results
    /// arrive in the opposite order they were requested.
    #[derive(Clone)]
    struct Deferred {
        backend: LocalBackend,
        queue: Arc<Mutex<Vec<Queued>>>,
    }

    impl Deferred {
        fn new(backend: &LocalBackend) -> Self {
            Self {
                backend: backend.clone(),
                queue: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn release_newest_first(&self) {
            let queued = std::mem::take(&mut *self.queue.lock().expect("queue"));
            for (generation, task, done) in queued.into_iter().rev() {
                let _ = done.send(run_task(&self.backend, generation, task));
            }
        }
    }

    impl TaskExecutor for Deferred {
        fn spawn(&self, generation: Generation, task: NoteTask, done: Sender<TaskCompletion>) {
            self.queue.lock().expect("queue").push((generation, task, done));
        }
    }

    fn backend() -> (TempDir, LocalBackend) {
        let dir = tempdir().expect("tmpdir");
        let backend = LocalBackend::open(dir.path()).expect("open");
        (dir, backend)
    }

    fn inline(backend: &LocalBackend) -> NotesRuntime<InlineExecutor> {
        NotesRuntime::new(InlineExecutor::new(Arc::new(backend.clone())))
    }

    /// Writes a note straight through the collaborators, as another client
    /// would have.
    fn seed_note(backend: &LocalBackend, title: &str, text: &str) -> DocumentId {
        let grant = backend.authenticate(SEED).expect("auth");
        let connection = backend.connect(&grant).expect("connect");
        let document = connection.store.create(note_content(text)).expect("create");
        connection
            .index
            .add_note(jot_core::NoteRef {
                id: document.id.clone(),
                title: title.to_string(),
            })
            .expect("index");
        document.id
    }

    #[test]
    fn new_identity_lands_on_draft_and_saves_first_note() {
        let (_dir, backend) = backend();
        let mut runtime = inline(&backend);

        runtime.authenticate(SEED).expect("auth");
        runtime.wait_idle();
        assert_eq!(runtime.state().navigation(), Navigation::Draft);

        runtime.save_draft("First", "hello").expect("save");
        assert_eq!(runtime.in_flight(), 1);
        runtime.wait_idle();

        let state = runtime.state();
        let (id, entry) = state.current_note().expect("viewing saved note");
        assert_eq!(entry.title(), "First");
        assert_eq!(entry.document().map(|doc| doc.text()), Some("hello"));
        assert_eq!(entry.status_label(), "saved");
        assert_eq!(state.draft_status(), DraftStatus::Unsaved);
        assert_eq!(backend.store().load(id).expect("persisted").text(), "hello");
    }

    #[test]
    fn opening_indexed_note_fetches_then_saves_edit() {
        let (_dir, backend) = backend();
        let id = seed_note(&backend, "Todo", "buy milk");
        let mut runtime = inline(&backend);

        runtime.authenticate(SEED).expect("auth");
        runtime.wait_idle();
        assert_eq!(runtime.state().navigation(), Navigation::Home);
        assert!(!runtime.state().note(&id).expect("indexed").is_stored());

        runtime.open_note(&id).expect("open");
        runtime.wait_idle();
        let entry = runtime.state().note(&id).expect("entry");
        assert_eq!(entry.status_label(), "loaded");
        assert_eq!(entry.document().map(|doc| doc.version), Some(1));

        runtime.save_note(&id, "buy oat milk").expect("save");
        runtime.wait_idle();
        let entry = runtime.state().note(&id).expect("entry");
        assert_eq!(entry.status_label(), "saved");
        assert_eq!(entry.document().map(|doc| doc.text()), Some("buy oat milk"));
        assert_eq!(entry.document().map(|doc| doc.version), Some(2));
        assert!(runtime.take_failures().is_empty());
    }

    #[test]
    fn bad_seed_reports_failure_and_stays_signed_out() {
        let (_dir, backend) = backend();
        let mut runtime = inline(&backend);

        runtime.authenticate("nope").expect("begin");
        runtime.wait_idle();

        assert_eq!(runtime.state().auth.label(), "failed");
        assert_eq!(
            runtime.take_failures(),
            vec!["seed must be 64 hex characters".to_string()]
        );
    }

    #[test]
    fn intents_without_session_are_rejected_without_starting_work() {
        let (_dir, backend) = backend();
        let mut runtime = inline(&backend);

        assert_eq!(
            runtime.open_draft(),
            Err(InvariantViolation::NotAuthenticated { action: "openDraft" })
        );
        assert_eq!(
            runtime.save_draft("t", "x"),
            Err(InvariantViolation::NotAuthenticated {
                action: "draftStatusChanged"
            })
        );
        assert_eq!(runtime.in_flight(), 0);
    }

    #[test]
    fn saving_a_note_that_was_never_loaded_is_rejected() {
        let (_dir, backend) = backend();
        let id = seed_note(&backend, "Todo", "x");
        let mut runtime = inline(&backend);
        runtime.authenticate(SEED).expect("auth");
        runtime.wait_idle();

        assert_eq!(
            runtime.save_note(&id, "y"),
            Err(InvariantViolation::NoteNotStored { id })
        );
        assert_eq!(runtime.in_flight(), 0);
    }

    #[test]
    fn fetch_completing_after_navigation_is_dropped_and_refetched() {
        let (_dir, backend) = backend();
        let a = seed_note(&backend, "A", "alpha");
        let b = seed_note(&backend, "B", "beta");
        let mut runtime = inline(&backend);
        runtime.authenticate(SEED).expect("auth");
        runtime.wait_idle();

        // the inline executor has already queued the completion, but the
        // user moves on before the loop drains it
        runtime.open_note(&a).expect("open a");
        runtime.open_note(&b).expect("open b");
        runtime.wait_idle();

        assert!(!runtime.state().note(&a).expect("a").is_stored());
        assert!(runtime.state().note(&b).expect("b").is_stored());

        runtime.open_note(&a).expect("reopen a");
        runtime.wait_idle();
        assert!(runtime.state().note(&a).expect("a").is_stored());
    }

    #[test]
    fn threaded_executor_delivers_completions_to_the_loop() {
        let (_dir, backend) = backend();
        let id = seed_note(&backend, "Remote", "from a worker");
        let mut runtime = NotesRuntime::new(ThreadedExecutor::new(Arc::new(backend.clone())));

        runtime.authenticate(SEED).expect("auth");
        runtime.wait_idle();
        runtime.open_note(&id).expect("open");
        runtime.wait_idle();

        assert_eq!(runtime.in_flight(), 0);
        assert_eq!(runtime.pump(), 0);
        let (_, entry) = runtime.state().current_note().expect("current");
        assert_eq!(entry.document().map(|doc| doc.text()), Some("from a worker"));
    }

    #[test]
    fn late_handshake_from_an_abandoned_sign_in_is_dropped() {
        let (_dir, backend) = backend();
        let executor = Deferred::new(&backend);
        let mut runtime = NotesRuntime::new(executor.clone());

        runtime.authenticate(SEED).expect("first sign-in");
        runtime.authenticate(OTHER_SEED).expect("second sign-in");
        executor.release_newest_first();
        runtime.wait_idle();

        let session = runtime.state().session().expect("signed in");
        assert_eq!(
            session.index.identity(),
            crate::local::identity_for_seed(OTHER_SEED).expect("identity")
        );
        assert_eq!(runtime.in_flight(), 0);
    }

    #[test]
    fn draft_saved_by_previous_identity_stays_out_of_new_session() {
        let (_dir, backend) = backend();
        let executor = Deferred::new(&backend);
        let mut runtime = NotesRuntime::new(executor.clone());
        runtime.authenticate(SEED).expect("sign in");
        executor.release_newest_first();
        runtime.wait_idle();
        assert_eq!(runtime.state().navigation(), Navigation::Draft);

        runtime.save_draft("Private", "for the first identity").expect("save");
        runtime.authenticate(OTHER_SEED).expect("switch identity");
        executor.release_newest_first();
        runtime.wait_idle();

        let state = runtime.state();
        assert_eq!(
            state.session().map(|session| session.index.identity().to_string()),
            Some(crate::local::identity_for_seed(OTHER_SEED).expect("identity"))
        );
        assert!(state.notes().is_empty());
        assert_eq!(state.navigation(), Navigation::Draft);
        assert_eq!(state.draft_status(), DraftStatus::Unsaved);
        assert!(runtime.take_failures().is_empty());
    }
}
