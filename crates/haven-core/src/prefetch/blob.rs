//! Locally addressable media blobs.
//!
//! Every handle a store hands out must be released exactly once. The cache
//! owns all handles it creates and releases them on eviction, clear and
//! drop.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(String);

impl BlobHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait BlobStore: Send + Sync {
    fn create(&self, key: &str, bytes: &[u8]) -> io::Result<BlobHandle>;
    fn release(&self, handle: &BlobHandle) -> io::Result<()>;
    /// Handles created and not yet released.
    fn live_count(&self) -> usize;
}

/// Blobs held in memory under `blob:haven/<n>` handles.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<BlobHandle, Vec<u8>>>,
    next: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: &BlobHandle) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(handle)
            .cloned()
    }
}

impl BlobStore for MemoryBlobStore {
    fn create(&self, _key: &str, bytes: &[u8]) -> io::Result<BlobHandle> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let handle = BlobHandle(format!("blob:haven/{n}"));
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(handle.clone(), bytes.to_vec());
        Ok(handle)
    }

    fn release(&self, handle: &BlobHandle) -> io::Result<()> {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(handle);
        Ok(())
    }

    fn live_count(&self) -> usize {
        self.blobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// One file per blob under a cache directory; the handle is the file path.
#[derive(Debug)]
pub struct DiskBlobStore {
    dir: PathBuf,
    live: Mutex<HashSet<PathBuf>>,
}

impl DiskBlobStore {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            live: Mutex::new(HashSet::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(key: &str) -> String {
        let stem: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .take(64)
            .collect();
        format!("{stem}-{}.bin", Uuid::new_v4().simple())
    }
}

impl BlobStore for DiskBlobStore {
    fn create(&self, key: &str, bytes: &[u8]) -> io::Result<BlobHandle> {
        let path = self.dir.join(Self::file_name(key));
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "blob written");
        let handle = BlobHandle(path.to_string_lossy().into_owned());
        self.live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path);
        Ok(handle)
    }

    fn release(&self, handle: &BlobHandle) -> io::Result<()> {
        let path = PathBuf::from(handle.as_str());
        let known = self
            .live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&path);
        if !known {
            return Ok(());
        }
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn live_count(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
