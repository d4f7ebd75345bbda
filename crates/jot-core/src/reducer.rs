use super::actions::NotesAction;
use super::error::InvariantViolation;
use super::registry::NoteEntry;
use super::registry::NoteRegistry;
use super::state::AuthState;
use super::state::DocumentId;
use super::state::Navigation;
use super::state::NotesState;
use super::state::Session;

/// Outcome of [`dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Applied(NotesState),
    Ignored(StaleReason),
}

/// Why a completion was dropped instead of applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    NotViewingNote { id: DocumentId },
    AlreadyLoaded { id: DocumentId },
    NotTracked { id: DocumentId },
    DraftClosed,
}

impl StaleReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotViewingNote { .. } => "note no longer on screen",
            Self::AlreadyLoaded { .. } => "content already loaded",
            Self::NotTracked { .. } => "note not in current session",
            Self::DraftClosed => "draft screen closed",
        }
    }
}

/// Computes the next snapshot. Never mutates `state`; a rejected event
/// leaves the caller holding the unchanged snapshot.
pub fn reduce(state: &NotesState, action: NotesAction) -> Result<NotesState, InvariantViolation> {
    match action {
        NotesAction::BeginAuth => Ok(NotesState {
            auth: AuthState::Loading,
        }),
        NotesAction::AuthFailed => Ok(NotesState {
            auth: AuthState::Failed,
        }),
        NotesAction::AuthSucceeded {
            store_handle,
            index_handle,
            notes,
        } => Ok(NotesState {
            auth: AuthState::Authenticated(Session::new(
                store_handle,
                index_handle,
                NoteRegistry::from_index(notes),
            )),
        }),
        NotesAction::ResetToHome => Ok(match state.session() {
            Some(session) => authenticated(session.navigate(Navigation::Home)),
            None => state.clone(),
        }),
        NotesAction::DeleteDraft => Ok(match state.session() {
            Some(session) => authenticated(session.navigate(Navigation::Home)),
            None => state.clone(),
        }),
        NotesAction::OpenDraft => {
            let session = require_session(state, "openDraft")?;
            Ok(authenticated(session.navigate(Navigation::Draft)))
        }
        NotesAction::OpenNote { document_id } => {
            let session = require_session(state, "openNote")?;
            if !session.notes.contains(&document_id) {
                return Err(InvariantViolation::UnknownNote { id: document_id });
            }
            Ok(authenticated(
                session.navigate(Navigation::Note { document_id }),
            ))
        }
        NotesAction::DraftStatusChanged { status } => {
            let session = require_session(state, "draftStatusChanged")?;
            if session.navigation != Navigation::Draft {
                return Err(InvariantViolation::DraftNotOpen);
            }
            Ok(authenticated(session.with_draft_status(status.into())))
        }
        NotesAction::DraftSaved {
            title,
            document_id,
            document,
        } => {
            let session = require_session(state, "draftSaved")?;
            let notes = session
                .notes
                .with_new_note(&document_id, title, document)?;
            // registry and navigation change together so a note screen never
            // shows up without its entry
            Ok(authenticated(
                session
                    .with_notes(notes)
                    .navigate(Navigation::Note { document_id }),
            ))
        }
        NotesAction::NoteContentLoaded {
            document_id,
            document,
        } => {
            let session = require_session(state, "noteContentLoaded")?;
            let notes = session.notes.with_content(&document_id, document)?;
            Ok(authenticated(session.with_notes(notes)))
        }
        NotesAction::NoteLoadingStatusChanged {
            document_id,
            status,
        } => {
            let session = require_session(state, "noteLoadingStatusChanged")?;
            let notes = session.notes.with_load_status(&document_id, status)?;
            Ok(authenticated(session.with_notes(notes)))
        }
        NotesAction::NoteSavingStatusChanged {
            document_id,
            status,
        } => {
            let session = require_session(state, "noteSavingStatusChanged")?;
            let notes = session.notes.with_save_status(&document_id, status)?;
            Ok(authenticated(session.with_notes(notes)))
        }
        NotesAction::NoteSaved {
            document_id,
            document,
        } => {
            let session = require_session(state, "noteSaved")?;
            let notes = session
                .notes
                .with_saved_document(&document_id, document)?;
            Ok(authenticated(session.with_notes(notes)))
        }
    }
}

/// Guard in front of [`reduce`] for events coming back from async work.
/// Completions for documents the snapshot no longer cares about are dropped
/// rather than applied or reported as violations.
pub fn dispatch(state: &NotesState, action: NotesAction) -> Result<Dispatch, InvariantViolation> {
    if let Some(reason) = stale_reason(state, &action) {
        return Ok(Dispatch::Ignored(reason));
    }
    reduce(state, action).map(Dispatch::Applied)
}

pub fn stale_reason(state: &NotesState, action: &NotesAction) -> Option<StaleReason> {
    match action {
        NotesAction::NoteLoadingStatusChanged { document_id, .. } => {
            viewing(state, document_id).err()
        }
        NotesAction::NoteContentLoaded { document_id, .. } => {
            if let Err(reason) = viewing(state, document_id) {
                return Some(reason);
            }
            match state.note(document_id) {
                Some(NoteEntry::Stored { .. }) => Some(StaleReason::AlreadyLoaded {
                    id: document_id.clone(),
                }),
                _ => None,
            }
        }
        NotesAction::NoteSavingStatusChanged { document_id, .. }
        | NotesAction::NoteSaved { document_id, .. } => match state.note(document_id) {
            Some(NoteEntry::Stored { .. }) => None,
            Some(NoteEntry::IndexLoaded { .. }) | None => Some(StaleReason::NotTracked {
                id: document_id.clone(),
            }),
        },
        NotesAction::DraftStatusChanged { .. } => {
            if state.navigation() == Navigation::Draft {
                None
            } else {
                Some(StaleReason::DraftClosed)
            }
        }
        NotesAction::BeginAuth
        | NotesAction::AuthFailed
        | NotesAction::AuthSucceeded { .. }
        | NotesAction::ResetToHome
        | NotesAction::OpenDraft
        | NotesAction::OpenNote { .. }
        | NotesAction::DeleteDraft
        | NotesAction::DraftSaved { .. } => None,
    }
}

fn viewing(state: &NotesState, id: &DocumentId) -> Result<(), StaleReason> {
    match state.navigation() {
        Navigation::Note { document_id } if &document_id == id => Ok(()),
        _ => Err(StaleReason::NotViewingNote { id: id.clone() }),
    }
}

fn require_session<'a>(
    state: &'a NotesState,
    action: &'static str,
) -> Result<&'a Session, InvariantViolation> {
    state
        .session()
        .ok_or(InvariantViolation::NotAuthenticated { action })
}

fn authenticated(session: Session) -> NotesState {
    NotesState {
        auth: AuthState::Authenticated(session),
    }
}

#[cfg(test)]
mod tests;
