//! Core of a plain-text book reader.
//!
//! Raw `.txt` bytes go through encoding detection, are cut into chapters by
//! byte offset, and each chapter is decoded on demand and paginated by a
//! character budget. `ReadingSession` ties these together with a record store
//! that remembers chapters and reading progress.

pub mod byte_source;
pub mod cancellation;
pub mod chapter_loader;
pub mod config;
pub mod encoding;
pub mod error;
pub mod model;
pub mod pagination;
pub mod parser;
pub mod segmenter;
pub mod session;
pub mod store;

pub use byte_source::{ByteSource, FsByteSource, MemoryByteSource};
pub use cancellation::CancellationToken;
pub use config::{LogLevel, ReaderConfig};
pub use encoding::TextEncoding;
pub use error::{ReaderError, Result};
pub use model::{Book, BookId, Chapter};
pub use parser::{BookParser, Parser, TxtParser};
pub use session::{
    ChapterRequest, LoadedChapter, Navigation, ReadingProgress, ReadingSession, SessionError,
    SessionOp, SessionState,
};
pub use store::{MemoryStore, RecordStore, TomlStore};
