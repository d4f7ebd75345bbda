use serde::Deserialize;
use serde::Serialize;

use super::registry::NoteLoadStatus;
use super::registry::NoteSaveStatus;
use super::state::Document;
use super::state::DocumentId;
use super::state::DraftStatus;
use super::state::IndexHandle;
use super::state::NoteRef;
use super::state::StoreHandle;

/// Draft progress an async save can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftProgress {
    Saving,
    Failed,
}

impl From<DraftProgress> for DraftStatus {
    fn from(progress: DraftProgress) -> Self {
        match progress {
            DraftProgress::Saving => DraftStatus::Saving,
            DraftProgress::Failed => DraftStatus::Failed,
        }
    }
}

/// The closed set of events the reducer understands. User intents and
/// async completions both arrive as one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NotesAction {
    BeginAuth,
    AuthFailed,
    #[serde(rename_all = "camelCase")]
    AuthSucceeded {
        store_handle: StoreHandle,
        index_handle: IndexHandle,
        notes: Vec<NoteRef>,
    },
    ResetToHome,
    OpenDraft,
    #[serde(rename_all = "camelCase")]
    OpenNote {
        document_id: DocumentId,
    },
    DeleteDraft,
    DraftStatusChanged {
        status: DraftProgress,
    },
    #[serde(rename_all = "camelCase")]
    DraftSaved {
        title: String,
        document_id: DocumentId,
        document: Document,
    },
    #[serde(rename_all = "camelCase")]
    NoteContentLoaded {
        document_id: DocumentId,
        document: Document,
    },
    #[serde(rename_all = "camelCase")]
    NoteLoadingStatusChanged {
        document_id: DocumentId,
        status: NoteLoadStatus,
    },
    #[serde(rename_all = "camelCase")]
    NoteSavingStatusChanged {
        document_id: DocumentId,
        status: NoteSaveStatus,
    },
    #[serde(rename_all = "camelCase")]
    NoteSaved {
        document_id: DocumentId,
        document: Document,
    },
}

impl NotesAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginAuth => "beginAuth",
            Self::AuthFailed => "authFailed",
            Self::AuthSucceeded { .. } => "authSucceeded",
            Self::ResetToHome => "resetToHome",
            Self::OpenDraft => "openDraft",
            Self::OpenNote { .. } => "openNote",
            Self::DeleteDraft => "deleteDraft",
            Self::DraftStatusChanged { .. } => "draftStatusChanged",
            Self::DraftSaved { .. } => "draftSaved",
            Self::NoteContentLoaded { .. } => "noteContentLoaded",
            Self::NoteLoadingStatusChanged { .. } => "noteLoadingStatusChanged",
            Self::NoteSavingStatusChanged { .. } => "noteSavingStatusChanged",
            Self::NoteSaved { .. } => "noteSaved",
        }
    }

    pub fn document_id(&self) -> Option<&DocumentId> {
        match self {
            Self::OpenNote { document_id }
            | Self::DraftSaved { document_id, .. }
            | Self::NoteContentLoaded { document_id, .. }
            | Self::NoteLoadingStatusChanged { document_id, .. }
            | Self::NoteSavingStatusChanged { document_id, .. }
            | Self::NoteSaved { document_id, .. } => Some(document_id),
            Self::BeginAuth
            | Self::AuthFailed
            | Self::AuthSucceeded { .. }
            | Self::ResetToHome
            | Self::OpenDraft
            | Self::DeleteDraft
            | Self::DraftStatusChanged { .. } => None,
        }
    }
}

/// Parses one wire event. Unknown `type`s and malformed payloads are
/// rejected here, before anything reaches the reducer.
pub fn parse_action(json: &str) -> Result<NotesAction, serde_json::Error> {
    serde_json::from_str(json)
}
