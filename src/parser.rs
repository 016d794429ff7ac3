//! Book parsers.
//!
//! `BookParser` is the capability the reading session depends on. Formats are
//! a closed set behind the `Parser` enum; plain text is the only one today.

use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::byte_source::ByteSource;
use crate::cancellation::CancellationToken;
use crate::chapter_loader::load_chapter_text;
use crate::encoding::{self, TextEncoding};
use crate::error::{ReaderError, Result};
use crate::model::{Book, Chapter};
use crate::segmenter::{SegmenterOptions, segment};

pub trait BookParser {
    /// Build a fresh book record for the file at `path`.
    fn parse_book(&self, path: &Path) -> Result<Book>;

    /// Segment `book` into chapters, recording the encoding used on `book`.
    fn parse_chapters_with_cancel(
        &self,
        book: &mut Book,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Chapter>>;

    fn load_chapter_content_with_cancel(
        &self,
        book: &Book,
        chapter: &Chapter,
        cancel: Option<&CancellationToken>,
    ) -> Result<String>;

    /// Current length in bytes of the book's source file.
    fn content_len(&self, book: &Book) -> Result<u64>;

    fn parse_chapters(&self, book: &mut Book) -> Result<Vec<Chapter>> {
        self.parse_chapters_with_cancel(book, None)
    }

    fn load_chapter_content(&self, book: &Book, chapter: &Chapter) -> Result<String> {
        self.load_chapter_content_with_cancel(book, chapter, None)
    }
}

/// Parser for unstructured `.txt` books.
#[derive(Debug, Clone)]
pub struct TxtParser {
    source: Arc<dyn ByteSource>,
    options: SegmenterOptions,
}

impl TxtParser {
    pub fn new(source: Arc<dyn ByteSource>, options: SegmenterOptions) -> Self {
        Self { source, options }
    }

    pub fn source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }

    pub fn options(&self) -> &SegmenterOptions {
        &self.options
    }

    fn choose_encoding(book: &Book, bytes: &[u8]) -> TextEncoding {
        if let Some(recorded) = book.encoding {
            if recorded.decode_strict(bytes).is_some() {
                return recorded;
            }
            warn!(
                path = %book.file_path.display(),
                %recorded,
                "Recorded encoding no longer decodes the file; detecting again"
            );
        }
        encoding::detect(bytes)
    }
}

impl BookParser for TxtParser {
    fn parse_book(&self, path: &Path) -> Result<Book> {
        if !self.source.exists(path) {
            return Err(ReaderError::SourceNotFound(path.to_path_buf()));
        }
        let title = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => path.file_stem(),
            _ => path.file_name(),
        }
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string());
        Ok(Book::new(title, path))
    }

    fn parse_chapters_with_cancel(
        &self,
        book: &mut Book,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Chapter>> {
        if let Some(token) = cancel {
            token.check_cancelled("book_read")?;
        }
        let bytes = self.source.read_all(&book.file_path)?;
        if let Some(token) = cancel {
            token.check_cancelled("segment")?;
        }

        let encoding = Self::choose_encoding(book, &bytes);
        book.encoding = Some(encoding);
        let chapters = segment(&book.id, &bytes, encoding, &self.options);
        if chapters.is_empty() {
            return Err(ReaderError::EmptyResult);
        }
        info!(
            path = %book.file_path.display(),
            %encoding,
            chapters = chapters.len(),
            "Parsed chapters"
        );
        Ok(chapters)
    }

    fn load_chapter_content_with_cancel(
        &self,
        book: &Book,
        chapter: &Chapter,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        load_chapter_text(
            self.source.as_ref(),
            &book.file_path,
            book.encoding.unwrap_or_default(),
            chapter,
            cancel,
        )
    }

    fn content_len(&self, book: &Book) -> Result<u64> {
        self.source.file_size(&book.file_path)
    }
}

/// Closed set of supported book formats.
#[derive(Debug, Clone)]
pub enum Parser {
    Txt(TxtParser),
}

impl Parser {
    pub fn txt(source: Arc<dyn ByteSource>, options: SegmenterOptions) -> Self {
        Parser::Txt(TxtParser::new(source, options))
    }
}

impl BookParser for Parser {
    fn parse_book(&self, path: &Path) -> Result<Book> {
        match self {
            Parser::Txt(parser) => parser.parse_book(path),
        }
    }

    fn parse_chapters_with_cancel(
        &self,
        book: &mut Book,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Chapter>> {
        match self {
            Parser::Txt(parser) => parser.parse_chapters_with_cancel(book, cancel),
        }
    }

    fn load_chapter_content_with_cancel(
        &self,
        book: &Book,
        chapter: &Chapter,
        cancel: Option<&CancellationToken>,
    ) -> Result<String> {
        match self {
            Parser::Txt(parser) => parser.load_chapter_content_with_cancel(book, chapter, cancel),
        }
    }

    fn content_len(&self, book: &Book) -> Result<u64> {
        match self {
            Parser::Txt(parser) => parser.content_len(book),
        }
    }
}
