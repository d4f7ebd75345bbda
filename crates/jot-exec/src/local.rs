use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use chrono::DateTime;
use chrono::Utc;
use jot_core::Document;
use jot_core::DocumentId;
use jot_core::IndexHandle;
use jot_core::NoteContent;
use jot_core::NoteRef;
use jot_core::StoreHandle;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::contracts::Authenticator;
use crate::contracts::CollaboratorError;
use crate::contracts::Connection;
use crate::contracts::DocumentStore;
use crate::contracts::IdentityIndex;
use crate::contracts::SessionGrant;

const SEED_LEN: usize = 32;
const IDENTITY_PREFIX: &str = "did:jot:";

/// File-backed stand-in for the document store and identity index.
///
/// Layout under `root`:
/// - `documents/<id>.json` latest version of each document
/// - `documents/<id>.history.jsonl` every version ever written
/// - `index/<identity>.json` note listing per identity
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    store_lock: Arc<Mutex<()>>,
    index_lock: Arc<Mutex<()>>,
}

impl LocalBackend {
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("documents"))?;
        std::fs::create_dir_all(root.join("index"))?;
        Ok(Self {
            root,
            store_lock: Arc::new(Mutex::new(())),
            index_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> LocalDocumentStore {
        LocalDocumentStore {
            dir: self.root.join("documents"),
            lock: Arc::clone(&self.store_lock),
        }
    }

    pub fn index(&self, identity: &str) -> LocalIdentityIndex {
        LocalIdentityIndex {
            path: self
                .root
                .join("index")
                .join(format!("{}.json", identity.replace(':', "_"))),
            lock: Arc::clone(&self.index_lock),
        }
    }
}

impl Authenticator for LocalBackend {
    fn authenticate(&self, seed: &str) -> Result<SessionGrant, CollaboratorError> {
        let identity = identity_for_seed(seed)?;
        let endpoint = self.root.display().to_string();
        Ok(SessionGrant {
            store: StoreHandle::new(endpoint.clone(), identity.clone()),
            index: IndexHandle::new(endpoint, identity),
        })
    }

    fn connect(&self, grant: &SessionGrant) -> Result<Connection, CollaboratorError> {
        if grant.store.identity() != grant.index.identity() {
            return Err(CollaboratorError::HandleMismatch);
        }
        Ok(Connection {
            store: Box::new(self.store()),
            index: Box::new(self.index(grant.index.identity())),
        })
    }
}

/// Derives the identity for a 32-byte hex seed.
pub fn identity_for_seed(seed: &str) -> Result<String, CollaboratorError> {
    let bytes = hex::decode(seed.trim()).map_err(|_| CollaboratorError::InvalidSeed)?;
    if bytes.len() != SEED_LEN {
        return Err(CollaboratorError::InvalidSeed);
    }
    let digest = Sha256::digest(&bytes);
    Ok(format!("{IDENTITY_PREFIX}{}", hex::encode(&digest[..16])))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HistoryRecord {
    version: u64,
    ts: DateTime<Utc>,
    content: NoteContent,
}

#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl LocalDocumentStore {
    pub fn history(&self, id: &DocumentId) -> Result<Vec<NoteContent>, CollaboratorError> {
        let path = self.history_path(id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut versions = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<HistoryRecord>(&line) {
                versions.push(record.content);
            }
        }
        Ok(versions)
    }

    fn document_path(&self, id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn history_path(&self, id: &DocumentId) -> PathBuf {
        self.dir.join(format!("{id}.history.jsonl"))
    }

    fn read(&self, id: &DocumentId) -> Result<Document, CollaboratorError> {
        let path = self.document_path(id);
        if !is_plain_id(id) || !path.exists() {
            return Err(CollaboratorError::NotFound(id.clone()));
        }
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write(&self, document: &Document) -> Result<(), CollaboratorError> {
        let record = HistoryRecord {
            version: document.version,
            ts: Utc::now(),
            content: document.content.clone(),
        };
        append_line(
            self.history_path(&document.id).as_path(),
            serde_json::to_string(&record)?.as_str(),
        )?;
        write_atomic(
            self.document_path(&document.id).as_path(),
            &serde_json::to_vec_pretty(document)?,
        )?;
        Ok(())
    }
}

impl DocumentStore for LocalDocumentStore {
    fn create(&self, content: NoteContent) -> Result<Document, CollaboratorError> {
        let document = Document {
            id: DocumentId::new(uuid::Uuid::new_v4().to_string()),
            version: 1,
            content,
        };
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.write(&document)?;
        Ok(document)
    }

    fn load(&self, id: &DocumentId) -> Result<Document, CollaboratorError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.read(id)
    }

    fn update(
        &self,
        id: &DocumentId,
        content: NoteContent,
    ) -> Result<Document, CollaboratorError> {
        // read, version bump and rename happen under one lock
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = self.read(id)?;
        let document = Document {
            id: current.id,
            version: current.version.saturating_add(1),
            content,
        };
        self.write(&document)?;
        Ok(document)
    }
}

#[derive(Debug, Clone)]
pub struct LocalIdentityIndex {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl LocalIdentityIndex {
    fn read(&self) -> Result<Vec<NoteRef>, CollaboratorError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = std::fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl IdentityIndex for LocalIdentityIndex {
    fn list_notes(&self) -> Result<Vec<NoteRef>, CollaboratorError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.read()
    }

    fn add_note(&self, note: NoteRef) -> Result<(), CollaboratorError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut notes = self.read()?;
        match notes.iter_mut().find(|existing| existing.id == note.id) {
            Some(existing) => existing.title = note.title,
            None => notes.push(note),
        }
        write_atomic(self.path.as_path(), &serde_json::to_vec_pretty(&notes)?)?;
        Ok(())
    }
}

// ids end up in file names
fn is_plain_id(id: &DocumentId) -> bool {
    !id.as_str().is_empty()
        && id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.flush()?;
    Ok(())
}
