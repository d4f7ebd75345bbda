use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use super::error::InvariantViolation;
use super::state::Document;
use super::state::DocumentId;
use super::state::NoteRef;

static EMPTY_REGISTRY: NoteRegistry = NoteRegistry(BTreeMap::new());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteLoadStatus {
    Init,
    Loading,
}

impl NoteLoadStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Loading => "loading",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteSaveStatus {
    Loaded,
    Saving,
    SaveFailed,
    Saved,
}

impl NoteSaveStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::Saving => "saving",
            Self::SaveFailed => "save failed",
            Self::Saved => "saved",
        }
    }
}

/// Lifecycle of one note. An entry starts as `IndexLoaded` when it is only
/// known from the identity index and becomes `Stored` once, when its
/// document arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum NoteEntry {
    IndexLoaded {
        status: NoteLoadStatus,
        title: String,
    },
    Stored {
        status: NoteSaveStatus,
        title: String,
        document: Document,
    },
}

impl NoteEntry {
    pub fn title(&self) -> &str {
        match self {
            Self::IndexLoaded { title, .. } | Self::Stored { title, .. } => title,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::IndexLoaded { .. } => None,
            Self::Stored { document, .. } => Some(document),
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            Self::IndexLoaded { status, .. } => status.label(),
            Self::Stored { status, .. } => status.label(),
        }
    }
}

/// Notes of the current identity keyed by document id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteRegistry(BTreeMap<DocumentId, NoteEntry>);

impl NoteRegistry {
    pub fn empty() -> &'static NoteRegistry {
        &EMPTY_REGISTRY
    }

    /// Registry as discovered from the identity index. Later duplicates of
    /// an id replace earlier ones.
    pub fn from_index(refs: impl IntoIterator<Item = NoteRef>) -> Self {
        Self(
            refs.into_iter()
                .map(|note| {
                    (
                        note.id,
                        NoteEntry::IndexLoaded {
                            status: NoteLoadStatus::Init,
                            title: note.title,
                        },
                    )
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.0.contains_key(id)
    }

    pub fn get(&self, id: &DocumentId) -> Option<&NoteEntry> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DocumentId, &NoteEntry)> {
        self.0.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.0.keys()
    }

    pub fn with_load_status(
        &self,
        id: &DocumentId,
        status: NoteLoadStatus,
    ) -> Result<Self, InvariantViolation> {
        match self.lookup(id)? {
            NoteEntry::IndexLoaded { title, .. } => Ok(self.replace(
                id,
                NoteEntry::IndexLoaded {
                    status,
                    title: title.clone(),
                },
            )),
            NoteEntry::Stored { .. } => Err(InvariantViolation::NoteNotIndexLoaded { id: id.clone() }),
        }
    }

    pub fn with_content(
        &self,
        id: &DocumentId,
        document: Document,
    ) -> Result<Self, InvariantViolation> {
        match self.lookup(id)? {
            NoteEntry::IndexLoaded { title, .. } => Ok(self.replace(
                id,
                NoteEntry::Stored {
                    status: NoteSaveStatus::Loaded,
                    title: title.clone(),
                    document,
                },
            )),
            NoteEntry::Stored { .. } => Err(InvariantViolation::NoteNotIndexLoaded { id: id.clone() }),
        }
    }

    pub fn with_save_status(
        &self,
        id: &DocumentId,
        status: NoteSaveStatus,
    ) -> Result<Self, InvariantViolation> {
        match self.lookup(id)? {
            NoteEntry::Stored {
                title, document, ..
            } => Ok(self.replace(
                id,
                NoteEntry::Stored {
                    status,
                    title: title.clone(),
                    document: document.clone(),
                },
            )),
            NoteEntry::IndexLoaded { .. } => Err(InvariantViolation::NoteNotStored { id: id.clone() }),
        }
    }

    pub fn with_saved_document(
        &self,
        id: &DocumentId,
        document: Document,
    ) -> Result<Self, InvariantViolation> {
        match self.lookup(id)? {
            NoteEntry::Stored { title, .. } => Ok(self.replace(
                id,
                NoteEntry::Stored {
                    status: NoteSaveStatus::Saved,
                    title: title.clone(),
                    document,
                },
            )),
            NoteEntry::IndexLoaded { .. } => Err(InvariantViolation::NoteNotStored { id: id.clone() }),
        }
    }

    pub fn with_new_note(
        &self,
        id: &DocumentId,
        title: String,
        document: Document,
    ) -> Result<Self, InvariantViolation> {
        if self.contains(id) {
            return Err(InvariantViolation::DuplicateNote { id: id.clone() });
        }
        Ok(self.replace(
            id,
            NoteEntry::Stored {
                status: NoteSaveStatus::Saved,
                title,
                document,
            },
        ))
    }

    fn lookup(&self, id: &DocumentId) -> Result<&NoteEntry, InvariantViolation> {
        self.0
            .get(id)
            .ok_or_else(|| InvariantViolation::UnknownNote { id: id.clone() })
    }

    fn replace(&self, id: &DocumentId, entry: NoteEntry) -> Self {
        let mut next = self.0.clone();
        next.insert(id.clone(), entry);
        Self(next)
    }
}
