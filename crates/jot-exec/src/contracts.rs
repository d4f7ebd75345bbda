use jot_core::Document;
use jot_core::DocumentId;
use jot_core::IndexHandle;
use jot_core::NoteContent;
use jot_core::NoteRef;
use jot_core::StoreHandle;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("seed must be 64 hex characters")]
    InvalidSeed,
    #[error("document {0} not found")]
    NotFound(DocumentId),
    #[error("store and index handles belong to different identities")]
    HandleMismatch,
    #[error("document {id} was stored but not added to the index: {source}")]
    Unindexed {
        id: DocumentId,
        source: Box<CollaboratorError>,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Handles produced by a successful authentication handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub store: StoreHandle,
    pub index: IndexHandle,
}

pub trait DocumentStore: Send + Sync {
    fn create(&self, content: NoteContent) -> Result<Document, CollaboratorError>;
    fn load(&self, id: &DocumentId) -> Result<Document, CollaboratorError>;
    fn update(&self, id: &DocumentId, content: NoteContent)
        -> Result<Document, CollaboratorError>;
}

pub trait IdentityIndex: Send + Sync {
    fn list_notes(&self) -> Result<Vec<NoteRef>, CollaboratorError>;
    fn add_note(&self, note: NoteRef) -> Result<(), CollaboratorError>;
}

pub struct Connection {
    pub store: Box<dyn DocumentStore>,
    pub index: Box<dyn IdentityIndex>,
}

pub trait Authenticator: Send + Sync {
    fn authenticate(&self, seed: &str) -> Result<SessionGrant, CollaboratorError>;
    fn connect(&self, grant: &SessionGrant) -> Result<Connection, CollaboratorError>;
}
