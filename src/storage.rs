// 💾 Blob Storage - one durable text blob per logical key
//
// Every backend offers the same two operations: read the whole blob or
// replace the whole blob. A missing blob reads as None.

use crate::error::StorageError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub trait BlobStore {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Replace the blob; readers see either the old or the new body
    fn write(&mut self, key: &str, body: &[u8]) -> StorageResult<()>;
}

impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, body: &[u8]) -> StorageResult<()> {
        (**self).write(key, body)
    }
}

// ============================================================================
// FILESYSTEM
// ============================================================================

/// One file per key inside a root directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(FsBlobStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let flat = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains('/')
            && !key.contains('\\');
        if !flat {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn backend(&self) -> &'static str {
        "fs"
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, body: &[u8]) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.root.join(format!(".{}.tmp", key));

        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(body)?;
            file.sync_all()?;
        }

        // rename is atomic on the same filesystem
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// ============================================================================
// SQLITE
// ============================================================================

pub struct SqliteBlobStore {
    conn: Connection,
}

impl SqliteBlobStore {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        // WAL for crash recovery; in-memory databases report "memory" and that is fine
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                body BLOB NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        Ok(SqliteBlobStore { conn })
    }
}

impl BlobStore for SqliteBlobStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let body = self
            .conn
            .query_row("SELECT body FROM blobs WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(body)
    }

    fn write(&mut self, key: &str, body: &[u8]) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO blobs (key, body, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            params![key, body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

// ============================================================================
// MEMORY
// ============================================================================

/// Process-local store; clones share the same blobs
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(key).cloned())
    }

    fn write(&mut self, key: &str, body: &[u8]) -> StorageResult<()> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(key.to_string(), body.to_vec());
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn exercise(store: &mut dyn BlobStore) {
        assert_eq!(store.read("rankings.csv").unwrap(), None);

        store.write("rankings.csv", b"first").unwrap();
        assert_eq!(store.read("rankings.csv").unwrap(), Some(b"first".to_vec()));

        store.write("rankings.csv", b"second").unwrap();
        assert_eq!(store.read("rankings.csv").unwrap(), Some(b"second".to_vec()));
        assert_eq!(store.read("other.csv").unwrap(), None);
    }

    #[test]
    fn test_fs_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = FsBlobStore::new(dir.path()).unwrap();
        exercise(&mut store);

        // no temp file left behind
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_fs_store_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let mut store = FsBlobStore::new(dir.path()).unwrap();

        assert!(matches!(store.read("../escape"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(store.write("a/b", b"x"), Err(StorageError::InvalidKey(_))));
        assert!(matches!(store.read(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_sqlite_store_round_trip() {
        let mut store = SqliteBlobStore::open_in_memory().unwrap();
        exercise(&mut store);
    }

    #[test]
    fn test_sqlite_store_persists_across_connections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blobs.db");

        {
            let mut store = SqliteBlobStore::open(&path).unwrap();
            store.write("k", b"kept").unwrap();
        }

        let store = SqliteBlobStore::open(&path).unwrap();
        assert_eq!(store.read("k").unwrap(), Some(b"kept".to_vec()));
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let mut a = MemoryBlobStore::new();
        exercise(&mut a);

        let b = a.clone();
        a.write("shared", b"v").unwrap();
        assert_eq!(b.read("shared").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_boxed_store_delegates() {
        let mut boxed: Box<dyn BlobStore + Send> = Box::new(MemoryBlobStore::new());
        assert_eq!(boxed.backend(), "memory");
        exercise(&mut boxed);
    }
}
