use thiserror::Error;

use super::state::DocumentId;

/// An event arrived whose precondition does not hold for the current
/// snapshot. The event is rejected and the snapshot stays as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("`{action}` requires an authenticated session")]
    NotAuthenticated { action: &'static str },
    #[error("no note with id {id}")]
    UnknownNote { id: DocumentId },
    #[error("note {id} already has its content loaded")]
    NoteNotIndexLoaded { id: DocumentId },
    #[error("note {id} has no loaded content yet")]
    NoteNotStored { id: DocumentId },
    #[error("draft status can only change on the draft screen")]
    DraftNotOpen,
    #[error("note {id} already exists")]
    DuplicateNote { id: DocumentId },
    #[error("navigation points at note {id} which is not in the registry")]
    DanglingNavigation { id: DocumentId },
}
