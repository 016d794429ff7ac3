//! Reading session: chapter list, the active chapter's pages and the
//! `(chapter, page)` cursor, plus progress persistence.
//!
//! Chapter loads can also run off-thread. `request_chapter` hands out a
//! `ChapterRequest` tagged with a generation number; `apply_loaded` only
//! accepts the result of the most recently issued request and the superseded
//! request's cancellation token is tripped.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::config::ReaderConfig;
use crate::error::ReaderError;
use crate::model::{Book, BookId, Chapter, unix_now};
use crate::pagination::{
    checked_characters_per_page, page_for_offset, page_start_offsets, paginate,
};
use crate::parser::{BookParser, Parser};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOp {
    Open,
    LoadChapter,
    Navigate,
    UpdateProgress,
    Repaginate,
}

impl std::fmt::Display for SessionOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionOp::Open => "open",
            SessionOp::LoadChapter => "load_chapter",
            SessionOp::Navigate => "navigate",
            SessionOp::UpdateProgress => "update_progress",
            SessionOp::Repaginate => "repaginate",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
#[error("{op} failed: {source}")]
pub struct SessionError {
    pub op: SessionOp,
    #[source]
    pub source: ReaderError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    ChapterLoaded {
        chapter_index: usize,
        pages: Vec<String>,
        page_index: usize,
    },
    Failed {
        op: SessionOp,
        cause: String,
    },
}

/// Outcome of a navigation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Moved to another page of the same chapter.
    Moved,
    /// Crossed into another chapter; progress has been persisted.
    ChapterChanged,
    /// Nothing to move to; state is unchanged.
    AtBoundary,
}

/// Where to land inside a freshly paginated chapter.
#[derive(Debug, Clone, Copy)]
enum Landing {
    First,
    Last,
    Offset(usize),
}

impl Landing {
    fn resolve(self, pages: &[String]) -> usize {
        match self {
            Landing::First => 0,
            Landing::Last => pages.len().saturating_sub(1),
            Landing::Offset(offset) => page_for_offset(pages, offset),
        }
    }
}

/// A chapter load detached from the session so it can run on another thread.
#[derive(Debug, Clone)]
pub struct ChapterRequest {
    generation: u64,
    index: usize,
    book: Book,
    chapter: Chapter,
    token: CancellationToken,
}

impl ChapterRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn execute(&self, parser: &Parser) -> LoadedChapter {
        let result =
            parser.load_chapter_content_with_cancel(&self.book, &self.chapter, Some(&self.token));
        LoadedChapter {
            generation: self.generation,
            index: self.index,
            result,
        }
    }
}

#[derive(Debug)]
pub struct LoadedChapter {
    generation: u64,
    index: usize,
    result: Result<String, ReaderError>,
}

/// Serializable snapshot of where the reader is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingProgress {
    pub book_id: BookId,
    pub book_title: String,
    pub chapter_title: String,
    pub chapter_index: usize,
    pub chapter_count: usize,
    pub page_index: usize,
    pub page_count: usize,
    /// Share of the book's bytes up to the end of the current page, 0..=100.
    pub percent: f64,
}

#[derive(Debug)]
pub struct ReadingSession {
    parser: Parser,
    store: Arc<dyn RecordStore>,
    config: ReaderConfig,
    book: Option<Book>,
    chapters: Vec<Chapter>,
    state: SessionState,
    generation: u64,
    in_flight: Option<CancellationToken>,
}

impl ReadingSession {
    pub fn new(parser: Parser, store: Arc<dyn RecordStore>, mut config: ReaderConfig) -> Self {
        config.normalize();
        Self {
            parser,
            store,
            config,
            book: None,
            chapters: Vec::new(),
            state: SessionState::Unloaded,
            generation: 0,
            in_flight: None,
        }
    }

    /// Open the book stored for `path`, registering it first if the store has
    /// never seen it.
    pub fn open_path(&mut self, path: &Path) -> Result<(), SessionError> {
        let book = match self.load_or_register(path) {
            Ok(book) => book,
            Err(err) => return Err(self.fail(SessionOp::Open, err)),
        };
        self.open(book)
    }

    pub fn open(&mut self, book: Book) -> Result<(), SessionError> {
        self.open_with_cancel(book, None)
    }

    /// Like `open`, but segmentation and the first chapter load stop early
    /// once `cancel` is tripped.
    pub fn open_with_cancel(
        &mut self,
        book: Book,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), SessionError> {
        self.supersede_in_flight();
        self.state = SessionState::Unloaded;
        self.chapters.clear();
        info!(path = %book.file_path.display(), title = %book.title, "Opening book");
        self.book = Some(book);
        self.prepare_book(cancel)
            .map_err(|err| self.fail(SessionOp::Open, err))?;
        if let SessionState::ChapterLoaded {
            chapter_index,
            page_index,
            ..
        } = &self.state
        {
            info!(
                chapters = self.chapters.len(),
                chapter = chapter_index,
                page = page_index,
                "Book opened"
            );
        }
        Ok(())
    }

    pub fn load_chapter(&mut self, index: usize) -> Result<(), SessionError> {
        self.check_index(index)
            .map_err(|source| SessionError {
                op: SessionOp::LoadChapter,
                source,
            })?;
        self.supersede_in_flight();
        self.enter_chapter(index, Landing::First, None)
            .map_err(|err| self.fail(SessionOp::LoadChapter, err))
    }

    pub fn next_page(&mut self) -> Result<Navigation, SessionError> {
        let Some((chapter_index, page_index, page_count)) = self.cursor() else {
            return Ok(Navigation::AtBoundary);
        };
        if page_index + 1 < page_count {
            self.set_page_index(page_index + 1);
            debug!(chapter = chapter_index, page = page_index + 1, "Next page");
            return Ok(Navigation::Moved);
        }
        if chapter_index + 1 < self.chapters.len() {
            return self.cross_chapter(chapter_index + 1, Landing::First);
        }
        debug!(chapter = chapter_index, page = page_index, "Already at the end of the book");
        Ok(Navigation::AtBoundary)
    }

    pub fn previous_page(&mut self) -> Result<Navigation, SessionError> {
        let Some((chapter_index, page_index, _)) = self.cursor() else {
            return Ok(Navigation::AtBoundary);
        };
        if page_index > 0 {
            self.set_page_index(page_index - 1);
            debug!(chapter = chapter_index, page = page_index - 1, "Previous page");
            return Ok(Navigation::Moved);
        }
        if chapter_index > 0 {
            let landing = if self.config.previous_page_lands_on_last_page {
                Landing::Last
            } else {
                Landing::First
            };
            return self.cross_chapter(chapter_index - 1, landing);
        }
        debug!("Already at the start of the book");
        Ok(Navigation::AtBoundary)
    }

    pub fn next_chapter(&mut self) -> Result<Navigation, SessionError> {
        match self.cursor() {
            Some((chapter_index, _, _)) if chapter_index + 1 < self.chapters.len() => {
                self.cross_chapter(chapter_index + 1, Landing::First)
            }
            _ => Ok(Navigation::AtBoundary),
        }
    }

    pub fn previous_chapter(&mut self) -> Result<Navigation, SessionError> {
        match self.cursor() {
            Some((chapter_index, _, _)) if chapter_index > 0 => {
                self.cross_chapter(chapter_index - 1, Landing::First)
            }
            _ => Ok(Navigation::AtBoundary),
        }
    }

    /// Write the cursor into the book record and persist it. A no-op until a
    /// chapter is loaded.
    pub fn update_progress(&mut self) -> Result<(), SessionError> {
        let Some(position) = self.current_position() else {
            return Ok(());
        };
        let Some(book) = self.book.as_mut() else {
            return Ok(());
        };
        book.last_read_chapter = position.0;
        book.last_read_position = position.1;
        book.is_reading = true;
        book.last_read_at = Some(unix_now());
        let saved = self.store.save_book(book);
        match saved {
            Ok(()) => {
                debug!(
                    chapter = position.0,
                    position = position.1,
                    "Saved reading progress"
                );
                Ok(())
            }
            Err(err) => Err(self.fail(SessionOp::UpdateProgress, err)),
        }
    }

    /// Persist progress and hand back the book record.
    pub fn close(mut self) -> Result<Option<Book>, SessionError> {
        self.supersede_in_flight();
        self.update_progress()?;
        if let Some(book) = &self.book {
            info!(title = %book.title, chapter = book.last_read_chapter, "Closed book");
        }
        Ok(self.book)
    }

    /// Change the page size and re-paginate the active chapter, staying on
    /// the page that holds the same content offset.
    pub fn set_characters_per_page(&mut self, characters_per_page: usize) -> Result<(), SessionError> {
        let characters_per_page = checked_characters_per_page(characters_per_page);
        if characters_per_page == self.config.characters_per_page {
            return Ok(());
        }
        self.config.characters_per_page = characters_per_page;
        let Some((chapter_index, offset)) = self.current_position() else {
            return Ok(());
        };
        debug!(characters_per_page, offset, "Repaginating active chapter");
        self.enter_chapter(chapter_index, Landing::Offset(offset), None)
            .map_err(|err| self.fail(SessionOp::Repaginate, err))
    }

    /// Issue a detached load of chapter `index`. Any earlier request still in
    /// flight is cancelled and its result will be ignored.
    pub fn request_chapter(&mut self, index: usize) -> Result<ChapterRequest, SessionError> {
        let to_error = |source| SessionError {
            op: SessionOp::LoadChapter,
            source,
        };
        self.check_index(index).map_err(to_error)?;
        let book = self
            .book
            .clone()
            .ok_or(ReaderError::InvalidChapter { index, count: 0 })
            .map_err(to_error)?;
        let chapter = self.chapters[index].clone();

        self.supersede_in_flight();
        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());
        debug!(generation = self.generation, chapter = index, "Issued chapter request");
        Ok(ChapterRequest {
            generation: self.generation,
            index,
            book,
            chapter,
            token,
        })
    }

    /// Apply a detached load. Returns `Ok(false)` when the result belongs to
    /// a superseded request and was discarded.
    pub fn apply_loaded(&mut self, loaded: LoadedChapter) -> Result<bool, SessionError> {
        if loaded.generation != self.generation {
            debug!(
                generation = loaded.generation,
                current = self.generation,
                chapter = loaded.index,
                "Discarding stale chapter load"
            );
            return Ok(false);
        }
        self.in_flight = None;
        let text = loaded
            .result
            .map_err(|err| self.fail(SessionOp::LoadChapter, err))?;
        let pages = paginate(&text, self.config.characters_per_page);
        debug!(chapter = loaded.index, pages = pages.len(), "Applied chapter load");
        self.state = SessionState::ChapterLoaded {
            chapter_index: loaded.index,
            pages,
            page_index: 0,
        };
        Ok(true)
    }

    pub fn progress(&self) -> Option<ReadingProgress> {
        let book = self.book.as_ref()?;
        let SessionState::ChapterLoaded {
            chapter_index,
            pages,
            page_index,
        } = &self.state
        else {
            return None;
        };
        let chapter = self.chapters.get(*chapter_index)?;
        let total = self.chapters.last().map(|c| c.end_offset).unwrap_or(0);
        let page_fraction = if pages.is_empty() {
            1.0
        } else {
            (*page_index + 1) as f64 / pages.len() as f64
        };
        let percent = if total == 0 {
            100.0
        } else {
            let read = chapter.start_offset as f64 + chapter.byte_len() as f64 * page_fraction;
            (read / total as f64 * 100.0).clamp(0.0, 100.0)
        };
        Some(ReadingProgress {
            book_id: book.id.clone(),
            book_title: book.title.clone(),
            chapter_title: chapter.title.clone(),
            chapter_index: *chapter_index,
            chapter_count: self.chapters.len(),
            page_index: *page_index,
            page_count: pages.len(),
            percent,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn book(&self) -> Option<&Book> {
        self.book.as_ref()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.cursor()
            .and_then(|(chapter_index, _, _)| self.chapters.get(chapter_index))
    }

    pub fn current_page(&self) -> Option<&str> {
        match &self.state {
            SessionState::ChapterLoaded {
                pages, page_index, ..
            } => pages.get(*page_index).map(String::as_str),
            _ => None,
        }
    }

    fn load_or_register(&self, path: &Path) -> Result<Book, ReaderError> {
        let id = BookId::for_path(path);
        if let Some(book) = self.store.load_book(&id)? {
            debug!(book = %id, "Found stored book record");
            return Ok(book);
        }
        let book = self.parser.parse_book(path)?;
        self.store.insert_book(&book)?;
        info!(path = %path.display(), title = %book.title, "Registered new book");
        Ok(book)
    }

    fn prepare_book(&mut self, cancel: Option<&CancellationToken>) -> Result<(), ReaderError> {
        let Some(book) = self.book.as_mut() else {
            return Err(ReaderError::EmptyResult);
        };
        if book.encoding.is_none() {
            if let Some(stored) = self.store.load_book(&book.id)? {
                book.encoding = stored.encoding;
            }
        }

        let cached = self.store.query_chapters_for(&book.id)?;
        let file_len = self.parser.content_len(book)?;
        let covers_file = cached
            .last()
            .is_some_and(|last| last.end_offset == file_len);
        if !cached.is_empty() && !covers_file {
            info!(
                book = %book.id,
                file_len,
                "Stored chapters no longer cover the file; segmenting again"
            );
        }
        let chapters = if covers_file && book.encoding.is_some() {
            debug!(book = %book.id, chapters = cached.len(), "Reusing stored chapters");
            cached
        } else {
            let parsed = self.parser.parse_chapters_with_cancel(book, cancel)?;
            self.store.insert_chapters(&book.id, &parsed)?;
            self.store.save_book(book)?;
            parsed
        };
        if chapters.is_empty() {
            return Err(ReaderError::EmptyResult);
        }

        let resume = book.resume_chapter(chapters.len());
        let landing = match resume {
            Some(_) if self.config.resume_page_position => Landing::Offset(book.last_read_position),
            _ => Landing::First,
        };
        if resume.is_none() && book.is_reading {
            warn!(
                chapter = book.last_read_chapter,
                chapters = chapters.len(),
                "Recorded chapter no longer exists; starting from the beginning"
            );
        }
        self.chapters = chapters;
        self.enter_chapter(resume.unwrap_or(0), landing, cancel)
    }

    fn enter_chapter(
        &mut self,
        index: usize,
        landing: Landing,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), ReaderError> {
        self.check_index(index)?;
        let Some(book) = self.book.as_ref() else {
            return Err(ReaderError::InvalidChapter { index, count: 0 });
        };
        let chapter = &self.chapters[index];
        let text = self
            .parser
            .load_chapter_content_with_cancel(book, chapter, cancel)?;
        let pages = paginate(&text, self.config.characters_per_page);
        let page_index = landing.resolve(&pages);
        debug!(
            chapter = index,
            title = %chapter.title,
            pages = pages.len(),
            page = page_index,
            "Paginated chapter"
        );
        self.state = SessionState::ChapterLoaded {
            chapter_index: index,
            pages,
            page_index,
        };
        Ok(())
    }

    fn cross_chapter(&mut self, index: usize, landing: Landing) -> Result<Navigation, SessionError> {
        self.supersede_in_flight();
        self.enter_chapter(index, landing, None)
            .map_err(|err| self.fail(SessionOp::Navigate, err))?;
        self.update_progress()?;
        Ok(Navigation::ChapterChanged)
    }

    fn check_index(&self, index: usize) -> Result<(), ReaderError> {
        if self.book.is_none() || index >= self.chapters.len() {
            return Err(ReaderError::InvalidChapter {
                index,
                count: self.chapters.len(),
            });
        }
        Ok(())
    }

    fn cursor(&self) -> Option<(usize, usize, usize)> {
        match &self.state {
            SessionState::ChapterLoaded {
                chapter_index,
                pages,
                page_index,
            } => Some((*chapter_index, *page_index, pages.len())),
            _ => None,
        }
    }

    /// Active chapter and the content offset of the current page's start.
    fn current_position(&self) -> Option<(usize, usize)> {
        match &self.state {
            SessionState::ChapterLoaded {
                chapter_index,
                pages,
                page_index,
            } => {
                let offset = page_start_offsets(pages)
                    .get(*page_index)
                    .copied()
                    .unwrap_or(0);
                Some((*chapter_index, offset))
            }
            _ => None,
        }
    }

    fn set_page_index(&mut self, index: usize) {
        if let SessionState::ChapterLoaded { page_index, .. } = &mut self.state {
            *page_index = index;
        }
    }

    fn supersede_in_flight(&mut self) {
        self.generation += 1;
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }

    fn fail(&mut self, op: SessionOp, source: ReaderError) -> SessionError {
        warn!(%op, "Reading session operation failed: {source}");
        self.state = SessionState::Failed {
            op,
            cause: source.to_string(),
        };
        SessionError { op, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_source::MemoryByteSource;
    use crate::store::MemoryStore;
    use std::path::PathBuf;

    const NOVEL: &str = "第1章 开始\naaaaaaaa\nbbbbbbbb\n第2章 继续\ncccccccc\n第3章 结束\ndddddddd\n";
    const PATH: &str = "/books/novel.txt";

    struct Fixture {
        source: Arc<MemoryByteSource>,
        store: Arc<MemoryStore>,
    }

    impl Fixture {
        fn new(text: &str) -> Self {
            let source = Arc::new(MemoryByteSource::new());
            source.insert(PATH, text.as_bytes().to_vec());
            Self {
                source,
                store: Arc::new(MemoryStore::new()),
            }
        }

        fn session(&self, config: ReaderConfig) -> ReadingSession {
            let parser = Parser::txt(self.source.clone(), config.segmenter_options());
            ReadingSession::new(parser, self.store.clone(), config)
        }
    }

    fn small_pages() -> ReaderConfig {
        ReaderConfig {
            characters_per_page: 10,
            ..ReaderConfig::default()
        }
    }

    fn book() -> Book {
        Book::new("novel", PATH)
    }

    fn cursor(session: &ReadingSession) -> (usize, usize) {
        match session.state() {
            SessionState::ChapterLoaded {
                chapter_index,
                page_index,
                ..
            } => (*chapter_index, *page_index),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn open_lands_on_first_page_without_progress() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();

        assert_eq!(cursor(&session), (0, 0));
        assert_eq!(session.chapters().len(), 3);
        assert_eq!(session.current_page(), Some("第1章 开始"));
        assert_eq!(fixture.store.chapter_batches(), 1);
        let stored = fixture.store.load_book(&book().id).unwrap().unwrap();
        assert_eq!(stored.encoding, Some(crate::encoding::TextEncoding::Utf8));
    }

    #[test]
    fn next_page_walks_pages_then_chapters() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();

        assert_eq!(session.next_page().unwrap(), Navigation::Moved);
        assert_eq!(session.next_page().unwrap(), Navigation::Moved);
        assert_eq!(session.current_page(), Some("bbbbbbbb"));
        assert_eq!(session.next_page().unwrap(), Navigation::ChapterChanged);
        assert_eq!(cursor(&session), (1, 0));

        let stored = fixture.store.load_book(&book().id).unwrap().unwrap();
        assert_eq!(stored.last_read_chapter, 1);
        assert!(stored.is_reading);
        assert!(stored.last_read_at.is_some());
    }

    #[test]
    fn next_page_on_last_page_of_book_is_a_boundary() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();
        session.load_chapter(2).unwrap();
        assert_eq!(session.next_page().unwrap(), Navigation::Moved);

        let before = session.state().clone();
        assert_eq!(session.next_page().unwrap(), Navigation::AtBoundary);
        assert_eq!(session.state(), &before);
        assert_eq!(session.next_chapter().unwrap(), Navigation::AtBoundary);
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn previous_page_lands_on_first_page_by_default() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();
        assert_eq!(session.previous_page().unwrap(), Navigation::AtBoundary);

        session.load_chapter(1).unwrap();
        assert_eq!(session.previous_page().unwrap(), Navigation::ChapterChanged);
        assert_eq!(cursor(&session), (0, 0));
    }

    #[test]
    fn previous_page_can_land_on_last_page() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(ReaderConfig {
            previous_page_lands_on_last_page: true,
            ..small_pages()
        });
        session.open(book()).unwrap();
        session.load_chapter(1).unwrap();
        assert_eq!(session.previous_page().unwrap(), Navigation::ChapterChanged);
        assert_eq!(cursor(&session), (0, 2));
    }

    #[test]
    fn reopening_resumes_chapter_without_segmenting_again() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();
        session.next_chapter().unwrap();
        session.next_page().unwrap();
        let closed = session.close().unwrap().unwrap();
        assert_eq!(closed.last_read_chapter, 1);

        let mut session = fixture.session(small_pages());
        session.open(closed).unwrap();
        assert_eq!(cursor(&session), (1, 0));
        assert_eq!(fixture.store.chapter_batches(), 1);
    }

    #[test]
    fn page_position_resume_restores_page() {
        let fixture = Fixture::new(NOVEL);
        let config = ReaderConfig {
            resume_page_position: true,
            ..small_pages()
        };
        let mut session = fixture.session(config.clone());
        session.open(book()).unwrap();
        session.next_page().unwrap();
        session.next_page().unwrap();
        let closed = session.close().unwrap().unwrap();
        assert_eq!(closed.last_read_position, 14);

        let mut session = fixture.session(config);
        session.open(closed).unwrap();
        assert_eq!(cursor(&session), (0, 2));
    }

    #[test]
    fn open_path_registers_then_reuses_record() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open_path(Path::new(PATH)).unwrap();
        assert_eq!(session.book().map(|b| b.title.as_str()), Some("novel"));
        session.close().unwrap();

        let mut session = fixture.session(small_pages());
        session.open_path(Path::new(PATH)).unwrap();
        assert_eq!(session.book().map(|b| b.is_reading), Some(true));
        assert_eq!(fixture.store.chapter_batches(), 1);
    }

    #[test]
    fn invalid_chapter_leaves_state_unchanged() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();
        let before = session.state().clone();

        let err = session.load_chapter(9).unwrap_err();
        assert_eq!(err.op, SessionOp::LoadChapter);
        assert!(matches!(
            err.source,
            ReaderError::InvalidChapter { index: 9, count: 3 }
        ));
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn missing_source_fails_open() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        let err = session
            .open(Book::new("gone", PathBuf::from("/books/gone.txt")))
            .unwrap_err();
        assert_eq!(err.op, SessionOp::Open);
        assert!(matches!(err.source, ReaderError::SourceNotFound(_)));
        assert!(matches!(
            session.state(),
            SessionState::Failed {
                op: SessionOp::Open,
                ..
            }
        ));
        assert_eq!(session.next_page().unwrap(), Navigation::AtBoundary);
    }

    #[test]
    fn storage_failure_during_progress_is_reported() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();
        fixture.store.set_fail_writes(true);

        let err = session.next_chapter().unwrap_err();
        assert_eq!(err.op, SessionOp::UpdateProgress);
        assert!(matches!(err.source, ReaderError::StorageFailure(_)));
        assert!(matches!(session.state(), SessionState::Failed { .. }));
    }

    #[test]
    fn only_last_issued_chapter_request_applies() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();

        let first = session.request_chapter(1).unwrap();
        let second = session.request_chapter(2).unwrap();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        let parser = session.parser().clone();
        let worker = std::thread::spawn(move || second.execute(&parser));
        let late = first.execute(session.parser());
        let fresh = worker.join().unwrap();

        assert!(session.apply_loaded(fresh).unwrap());
        assert!(!session.apply_loaded(late).unwrap());
        assert_eq!(cursor(&session), (2, 0));
        assert_eq!(session.current_page(), Some("第3章 结束"));
    }

    #[test]
    fn direct_load_supersedes_pending_request() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();

        let pending = session.request_chapter(2).unwrap();
        session.load_chapter(1).unwrap();
        let loaded = pending.execute(session.parser());
        assert!(!session.apply_loaded(loaded).unwrap());
        assert_eq!(cursor(&session), (1, 0));
    }

    #[test]
    fn changing_page_size_keeps_reading_position() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();
        session.next_page().unwrap();
        session.next_page().unwrap();

        session.set_characters_per_page(15).unwrap();
        assert_eq!(cursor(&session), (0, 1));
        assert_eq!(session.current_page(), Some("bbbbbbbb"));
        assert_eq!(session.config().characters_per_page, 15);
    }

    #[test]
    fn progress_reaches_full_on_last_page() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();

        let start = session.progress().unwrap();
        assert_eq!(start.chapter_title, "第1章 开始");
        assert_eq!((start.chapter_count, start.page_count), (3, 3));
        assert!(start.percent > 0.0 && start.percent < 50.0);

        session.load_chapter(2).unwrap();
        session.next_page().unwrap();
        let end = session.progress().unwrap();
        assert_eq!(end.percent, 100.0);

        let json = serde_json::to_value(&end).unwrap();
        assert_eq!(json["chapter_index"], 2);
        assert_eq!(json["book_title"], "novel");
    }

    #[test]
    fn empty_file_opens_with_no_pages() {
        let fixture = Fixture::new("");
        let mut session = fixture.session(small_pages());
        session.open(book()).unwrap();
        assert_eq!(session.chapters().len(), 1);
        assert_eq!(session.current_page(), None);
        assert_eq!(session.next_page().unwrap(), Navigation::AtBoundary);
        assert_eq!(session.progress().unwrap().percent, 100.0);
    }

    #[test]
    fn grown_file_is_segmented_again() {
        let fixture = Fixture::new("第1章 a\nxx\n");
        let mut session = fixture.session(small_pages());
        session.open_path(Path::new(PATH)).unwrap();
        assert_eq!(session.chapters().len(), 1);
        session.close().unwrap();

        let grown = "第1章 a\nxx\n第2章 b\nyy\n";
        fixture.source.insert(PATH, grown.as_bytes().to_vec());
        let mut session = fixture.session(small_pages());
        session.open_path(Path::new(PATH)).unwrap();

        assert_eq!(session.chapters().len(), 2);
        assert_eq!(
            session.chapters().last().map(|c| c.end_offset),
            Some(grown.len() as u64)
        );
        assert_eq!(fixture.store.chapter_batches(), 2);
        let stored = fixture.store.query_chapters_for(&book().id).unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[test]
    fn small_page_size_is_not_raised() {
        let text = "ab\ncd\nef\n";
        let fixture = Fixture::new(text);
        let mut session = fixture.session(ReaderConfig {
            characters_per_page: 3,
            ..ReaderConfig::default()
        });
        session.open(book()).unwrap();
        assert_eq!(session.config().characters_per_page, 3);
        match session.state() {
            SessionState::ChapterLoaded { pages, .. } => assert_eq!(pages, &paginate(text, 3)),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(session.current_page(), Some("ab"));

        session.set_characters_per_page(0).unwrap();
        assert_eq!(session.config().characters_per_page, 1);
    }

    #[test]
    fn each_short_chapter_fits_one_page() {
        let text = format!("第1章 开始\n{}\n第2章 继续\n{}", "A".repeat(50), "B".repeat(50));
        let fixture = Fixture::new(&text);
        let mut session = fixture.session(ReaderConfig {
            characters_per_page: 100,
            ..ReaderConfig::default()
        });
        session.open(book()).unwrap();
        assert_eq!(session.chapters().len(), 2);

        let first = session.progress().unwrap();
        assert_eq!((first.chapter_index, first.page_count), (0, 1));
        assert_eq!(session.next_page().unwrap(), Navigation::ChapterChanged);
        let second = session.progress().unwrap();
        assert_eq!((second.chapter_index, second.page_count), (1, 1));
        assert_eq!(
            session.current_page().map(|page| page.to_string()),
            Some(format!("第2章 继续\n{}", "B".repeat(50)))
        );
    }

    #[test]
    fn cancelled_open_stops_before_segmenting() {
        let fixture = Fixture::new(NOVEL);
        let mut session = fixture.session(small_pages());
        let token = CancellationToken::new();
        token.cancel();

        let err = session.open_with_cancel(book(), Some(&token)).unwrap_err();
        assert_eq!(err.op, SessionOp::Open);
        assert!(matches!(err.source, ReaderError::Cancelled("book_read")));
        assert!(matches!(session.state(), SessionState::Failed { .. }));
        assert_eq!(fixture.store.chapter_batches(), 0);

        session.open_with_cancel(book(), Some(&CancellationToken::new())).unwrap();
        assert_eq!(cursor(&session), (0, 0));
    }
}
