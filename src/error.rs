//! Error types shared by the parser, store and session layers.

use std::path::PathBuf;
use thiserror::Error;

use crate::encoding::TextEncoding;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bytes {start}..{end} of {path} could not be decoded (recorded encoding {recorded})")]
    DecodeFailure {
        path: PathBuf,
        start: u64,
        end: u64,
        recorded: TextEncoding,
    },

    #[error("segmentation produced no chapters")]
    EmptyResult,

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("chapter index {index} out of range (chapter count {count})")]
    InvalidChapter { index: usize, count: usize },

    #[error("operation cancelled at stage={0}")]
    Cancelled(&'static str),
}

impl ReaderError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            return ReaderError::SourceNotFound(path.into());
        }
        ReaderError::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn storage(message: impl std::fmt::Display) -> Self {
        ReaderError::StorageFailure(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_source_not_found() {
        let err = ReaderError::read(
            "/nope.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, ReaderError::SourceNotFound(path) if path == PathBuf::from("/nope.txt")));
    }

    #[test]
    fn other_io_errors_keep_their_source() {
        let err = ReaderError::read(
            "/locked.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ReaderError::Read { .. }));
        assert!(err.to_string().contains("/locked.txt"));
    }
}
