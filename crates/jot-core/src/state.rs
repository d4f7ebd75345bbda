use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::error::InvariantViolation;
use super::registry::NoteEntry;
use super::registry::NoteRegistry;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Body of a note as persisted in the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteContent {
    pub date: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub version: u64,
    pub content: NoteContent,
}

impl Document {
    pub fn text(&self) -> &str {
        &self.content.text
    }
}

/// `(id, title)` pair as listed by the identity index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRef {
    pub id: DocumentId,
    pub title: String,
}

impl NoteRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: DocumentId(id.into()),
            title: title.into(),
        }
    }
}

/// Capability for the document store, granted on authentication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreHandle {
    endpoint: String,
    identity: String,
}

impl StoreHandle {
    pub fn new(endpoint: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            identity: identity.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Capability for the identity index, granted on authentication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexHandle {
    endpoint: String,
    identity: String,
}

impl IndexHandle {
    pub fn new(endpoint: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            identity: identity.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Navigation {
    Home,
    Draft,
    Note { document_id: DocumentId },
}

impl Navigation {
    pub fn note_id(&self) -> Option<&DocumentId> {
        match self {
            Self::Note { document_id } => Some(document_id),
            Self::Home | Self::Draft => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Draft => "draft",
            Self::Note { .. } => "note",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Unsaved,
    Saving,
    Failed,
    Saved,
}

impl DraftStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unsaved => "unsaved",
            Self::Saving => "saving",
            Self::Failed => "failed",
            Self::Saved => "saved",
        }
    }
}

/// Everything that only exists while an identity is authenticated.
///
/// Navigation, draft progress and the registry live here so that a draft or
/// note screen without a session cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub store: StoreHandle,
    pub index: IndexHandle,
    pub navigation: Navigation,
    pub draft_status: DraftStatus,
    pub notes: Arc<NoteRegistry>,
}

impl Session {
    pub fn new(store: StoreHandle, index: IndexHandle, notes: NoteRegistry) -> Self {
        let navigation = if notes.is_empty() {
            Navigation::Draft
        } else {
            Navigation::Home
        };
        Self {
            store,
            index,
            navigation,
            draft_status: DraftStatus::Unsaved,
            notes: Arc::new(notes),
        }
    }

    /// Same session on another screen. Leaving the draft screen resets the
    /// draft progress.
    pub fn navigate(&self, navigation: Navigation) -> Self {
        let draft_status = match (&self.navigation, &navigation) {
            (Navigation::Draft, Navigation::Draft) => self.draft_status,
            _ => DraftStatus::Unsaved,
        };
        Self {
            store: self.store.clone(),
            index: self.index.clone(),
            navigation,
            draft_status,
            notes: Arc::clone(&self.notes),
        }
    }

    pub fn with_draft_status(&self, draft_status: DraftStatus) -> Self {
        Self {
            draft_status,
            ..self.clone()
        }
    }

    pub fn with_notes(&self, notes: NoteRegistry) -> Self {
        Self {
            notes: Arc::new(notes),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthState {
    Pending,
    Loading,
    Failed,
    Authenticated(Session),
}

impl AuthState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Failed => "failed",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

/// Composite snapshot handed to the front end after every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesState {
    pub auth: AuthState,
}

impl Default for NotesState {
    fn default() -> Self {
        Self::new()
    }
}

impl NotesState {
    pub fn new() -> Self {
        Self {
            auth: AuthState::Pending,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.auth {
            AuthState::Authenticated(session) => Some(session),
            AuthState::Pending | AuthState::Loading | AuthState::Failed => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().is_some()
    }

    pub fn navigation(&self) -> Navigation {
        self.session()
            .map(|session| session.navigation.clone())
            .unwrap_or(Navigation::Home)
    }

    pub fn draft_status(&self) -> DraftStatus {
        self.session()
            .map(|session| session.draft_status)
            .unwrap_or(DraftStatus::Unsaved)
    }

    pub fn notes(&self) -> &NoteRegistry {
        self.session()
            .map(|session| session.notes.as_ref())
            .unwrap_or(NoteRegistry::empty())
    }

    pub fn note(&self, id: &DocumentId) -> Option<&NoteEntry> {
        self.notes().get(id)
    }

    /// The note currently on screen, if any.
    pub fn current_note(&self) -> Option<(&DocumentId, &NoteEntry)> {
        let session = self.session()?;
        let id = session.navigation.note_id()?;
        session.notes.get(id).map(|entry| (id, entry))
    }

    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let Some(session) = self.session() else {
            return Ok(());
        };
        if let Navigation::Note { document_id } = &session.navigation {
            if !session.notes.contains(document_id) {
                return Err(InvariantViolation::DanglingNavigation {
                    id: document_id.clone(),
                });
            }
        }
        if session.navigation != Navigation::Draft && session.draft_status != DraftStatus::Unsaved
        {
            return Err(InvariantViolation::DraftNotOpen);
        }
        Ok(())
    }
}
