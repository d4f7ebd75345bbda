use chrono::TimeZone;
use chrono::Utc;
use pretty_assertions::assert_eq;

pub(super) use super::dispatch;
pub(super) use super::reduce;
pub(super) use super::Dispatch;
pub(super) use super::StaleReason;
pub(super) use crate::actions::DraftProgress;
pub(super) use crate::actions::NotesAction;
pub(super) use crate::error::InvariantViolation;
pub(super) use crate::registry::NoteEntry;
pub(super) use crate::registry::NoteLoadStatus;
pub(super) use crate::registry::NoteRegistry;
pub(super) use crate::registry::NoteSaveStatus;
pub(super) use crate::state::AuthState;
pub(super) use crate::state::Document;
pub(super) use crate::state::DocumentId;
pub(super) use crate::state::DraftStatus;
pub(super) use crate::state::IndexHandle;
pub(super) use crate::state::Navigation;
pub(super) use crate::state::NoteContent;
pub(super) use crate::state::NoteRef;
pub(super) use crate::state::NotesState;
pub(super) use crate::state::StoreHandle;


fn id(value: &str) -> DocumentId {
    DocumentId::from(value)
}

fn document(doc_id: &str, text: &str, version: u64) -> Document {
    Document {
        id: id(doc_id),
        version,
        content: NoteContent {
            date: Utc.with_ymd_and_hms(2021, 3, 1, 9, 30, 0).unwrap(),
            text: text.to_string(),
        },
    }
}

fn auth_succeeded(notes: &[(&str, &str)]) -> NotesAction {
    NotesAction::AuthSucceeded {
        store_handle: StoreHandle::new("/srv/jot", "did:jot:test"),
        index_handle: IndexHandle::new("/srv/jot", "did:jot:test"),
        notes: notes
            .iter()
            .map(|(doc_id, title)| NoteRef::new(*doc_id, *title))
            .collect(),
    }
}

fn apply(state: &NotesState, action: NotesAction) -> NotesState {
    let next = reduce(state, action).expect("event accepted");
    assert_eq!(next.validate(), Ok(()));
    next
}

/// Authenticated with notes `a` and `b`, both only known from the index.
fn signed_in() -> NotesState {
    apply(&NotesState::new(), auth_succeeded(&[("a", "A"), ("b", "B")]))
}

/// Authenticated and viewing note `a`, whose content has been loaded.
fn viewing_loaded_a() -> NotesState {
    let state = apply(&signed_in(), NotesAction::OpenNote { document_id: id("a") });
    apply(
        &state,
        NotesAction::NoteContentLoaded {
            document_id: id("a"),
            document: document("a", "alpha", 1),
        },
    )
}

fn unauthenticated_states() -> Vec<NotesState> {
    vec![
        NotesState::new(),
        NotesState {
            auth: AuthState::Loading,
        },
        NotesState {
            auth: AuthState::Failed,
        },
    ]
}
