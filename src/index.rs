//! The `map.json` metadata index.
//!
//! One JSON object per storage root, mapping string-encoded insertion
//! positions (`"0"`, `"1"`, ...) to [`DocumentRecord`]s. Every append loads
//! the whole document, inserts one entry, and rewrites it.
//!
//! # Concurrency
//!
//! Load-modify-store runs while holding `map.json.lock`, a file created
//! with create-new semantics and removed when the guard drops. The new
//! document is written to a temporary file and renamed over `map.json`, so
//! readers never observe a half-written index. A writer that cannot take
//! the lock within the timeout fails with [`HomeDocsError::IndexLocked`];
//! a lock left behind by a crashed process has to be removed by hand.
//! Waiting for the lock blocks the calling thread, so async callers run
//! [`MetadataIndex::append`] on the blocking pool.
//!
//! A file that exists but does not parse is reported as
//! [`HomeDocsError::IndexCorruption`] and is never overwritten.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{HomeDocsError, Result};
use crate::models::{DocumentRecord, IndexEntry};

pub const INDEX_FILE: &str = "map.json";
pub const LOCK_FILE: &str = "map.json.lock";
const TEMP_FILE: &str = "map.json.tmp";

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// In-memory form of `map.json`, ordered by numeric key.
pub type IndexMap = BTreeMap<u64, DocumentRecord>;

#[derive(Debug, Clone)]
pub struct MetadataIndex {
    root: PathBuf,
    lock_timeout: Duration,
}

impl MetadataIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Reads the index, creating an empty one if none exists yet.
    pub fn load(&self) -> Result<IndexMap> {
        let path = self.path();
        self.create_if_missing(&path)?;

        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content)
            .map_err(|e| HomeDocsError::index_corruption(&path, e.to_string()))
    }

    /// Appends `record` under the next positional key and returns the key.
    pub fn append(&self, record: DocumentRecord) -> Result<u64> {
        let _lock = IndexLock::acquire(self.root.join(LOCK_FILE), self.lock_timeout)?;

        let mut map = self.load()?;
        let key = map.len() as u64;
        if map.contains_key(&key) {
            return Err(HomeDocsError::index_corruption(
                self.path(),
                format!("key {} is already taken; keys are not contiguous", key),
            ));
        }
        if map.values().any(|r| r.id == record.id) {
            return Err(HomeDocsError::DuplicateId(record.id));
        }

        map.insert(key, record);
        self.store(&map)?;
        Ok(key)
    }

    /// Every record, ordered by key.
    pub fn all(&self) -> Result<Vec<IndexEntry>> {
        Ok(self
            .load()?
            .into_iter()
            .map(|(key, record)| IndexEntry { key, record })
            .collect())
    }

    pub fn get(&self, key: u64) -> Result<Option<DocumentRecord>> {
        Ok(self.load()?.remove(&key))
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<IndexEntry>> {
        Ok(self
            .load()?
            .into_iter()
            .find(|(_, r)| r.id == id)
            .map(|(key, record)| IndexEntry { key, record }))
    }

    fn create_if_missing(&self, path: &Path) -> Result<()> {
        if path.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.root)
            .map_err(|e| HomeDocsError::storage_write(&self.root, e))?;
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut f) => f
                .write_all(b"{}")
                .map_err(|e| HomeDocsError::storage_write(path, e)),
            // another caller created it first
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(HomeDocsError::storage_write(path, e)),
        }
    }

    fn store(&self, map: &IndexMap) -> Result<()> {
        let tmp = self.root.join(TEMP_FILE);
        let bytes = serde_json::to_vec(map)?;
        {
            let mut f =
                std::fs::File::create(&tmp).map_err(|e| HomeDocsError::storage_write(&tmp, e))?;
            f.write_all(&bytes)
                .and_then(|_| f.sync_all())
                .map_err(|e| HomeDocsError::storage_write(&tmp, e))?;
        }
        let path = self.path();
        std::fs::rename(&tmp, &path).map_err(|e| HomeDocsError::storage_write(&path, e))
    }
}

/// Exclusive lock over the index, released on drop.
struct IndexLock {
    path: PathBuf,
}

impl IndexLock {
    fn acquire(path: PathBuf, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        let mut delay = Duration::from_millis(5);
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut f) => {
                    let _ = writeln!(f, "{}", std::process::id());
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if start.elapsed() >= timeout {
                        return Err(HomeDocsError::IndexLocked(path));
                    }
                    std::thread::sleep(delay);
                    delay = (delay * 2).min(Duration::from_millis(100));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    // root directory does not exist yet
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| HomeDocsError::storage_write(parent, e))?;
                    }
                }
                Err(e) => return Err(HomeDocsError::storage_write(&path, e)),
            }
        }
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release index lock");
        }
    }
}
