//! Byte-level access to book files.
//!
//! The parser never touches the filesystem directly; it is handed a
//! `ByteSource` so tests can run against in-memory fixtures.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{ReaderError, Result};

pub trait ByteSource: Debug + Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn read_all(&self, path: &Path) -> Result<Vec<u8>>;

    /// Read the half-open byte range `start..end`.
    fn read_range(&self, path: &Path, start: u64, end: u64) -> Result<Vec<u8>>;

    fn file_size(&self, path: &Path) -> Result<u64>;
}

/// Reads straight from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsByteSource;

impl ByteSource for FsByteSource {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|err| ReaderError::read(path, err))
    }

    fn read_range(&self, path: &Path, start: u64, end: u64) -> Result<Vec<u8>> {
        let mut file = fs::File::open(path).map_err(|err| ReaderError::read(path, err))?;
        file.seek(SeekFrom::Start(start))
            .map_err(|err| ReaderError::read(path, err))?;
        let mut buf = Vec::with_capacity(end.saturating_sub(start) as usize);
        file.take(end.saturating_sub(start))
            .read_to_end(&mut buf)
            .map_err(|err| ReaderError::read(path, err))?;
        Ok(buf)
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        fs::metadata(path)
            .map(|meta| meta.len())
            .map_err(|err| ReaderError::read(path, err))
    }
}

/// In-memory files keyed by path. Clones share the same file table.
#[derive(Debug, Clone, Default)]
pub struct MemoryByteSource {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), bytes.into());
        }
    }

    pub fn remove(&self, path: &Path) {
        if let Ok(mut files) = self.files.write() {
            files.remove(path);
        }
    }

    fn with_file<T>(&self, path: &Path, f: impl FnOnce(&[u8]) -> T) -> Result<T> {
        let files = self
            .files
            .read()
            .map_err(|_| ReaderError::storage("memory byte source lock poisoned"))?;
        files
            .get(path)
            .map(|bytes| f(bytes))
            .ok_or_else(|| ReaderError::SourceNotFound(path.to_path_buf()))
    }
}

impl ByteSource for MemoryByteSource {
    fn exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        self.with_file(path, |bytes| bytes.to_vec())
    }

    fn read_range(&self, path: &Path, start: u64, end: u64) -> Result<Vec<u8>> {
        self.with_file(path, |bytes| {
            let len = bytes.len();
            let start = (start as usize).min(len);
            let end = (end as usize).clamp(start, len);
            bytes[start..end].to_vec()
        })
    }

    fn file_size(&self, path: &Path) -> Result<u64> {
        self.with_file(path, |bytes| bytes.len() as u64)
    }
}
