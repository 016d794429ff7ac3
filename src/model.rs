//! Book and chapter records.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::encoding::TextEncoding;

/// Stable identifier of a book, derived from its file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub String);

impl BookId {
    pub fn for_path(path: &Path) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path.as_os_str().to_string_lossy().as_bytes());
        BookId(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub file_path: PathBuf,
    /// Encoding recorded at first parse; `None` until detection has run.
    #[serde(default)]
    pub encoding: Option<TextEncoding>,
    #[serde(default)]
    pub last_read_chapter: usize,
    /// Character offset of the first character of the last displayed page,
    /// relative to the chapter's paginated content.
    #[serde(default)]
    pub last_read_position: usize,
    #[serde(default)]
    pub is_reading: bool,
    #[serde(default)]
    pub added_at: u64,
    #[serde(default)]
    pub last_read_at: Option<u64>,
}

impl Book {
    pub fn new(title: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        Self {
            id: BookId::for_path(&file_path),
            title: title.into(),
            file_path,
            encoding: None,
            last_read_chapter: 0,
            last_read_position: 0,
            is_reading: false,
            added_at: unix_now(),
            last_read_at: None,
        }
    }

    /// Chapter to resume at, if progress was recorded and still fits.
    pub fn resume_chapter(&self, chapter_count: usize) -> Option<usize> {
        (self.is_reading && self.last_read_chapter < chapter_count).then_some(self.last_read_chapter)
    }
}

/// A contiguous byte range of a book's raw content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub book_id: BookId,
    pub title: String,
    pub start_offset: u64,
    pub end_offset: u64,
}

impl Chapter {
    pub fn byte_len(&self) -> u64 {
        self.end_offset.saturating_sub(self.start_offset)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
