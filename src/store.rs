//! Record store for books and their chapter tables.
//!
//! `TomlStore` keeps one directory per book under the store root, named by the
//! book's path hash, holding `book.toml` and `chapters.toml`. Chapter tables
//! are written as a single batch through a temporary file and a rename.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::error::{ReaderError, Result};
use crate::model::{Book, BookId, Chapter};

pub trait RecordStore: Debug + Send + Sync {
    /// Add a new book; fails if a record with the same id exists.
    fn insert_book(&self, book: &Book) -> Result<()>;

    /// Insert or overwrite a book record.
    fn save_book(&self, book: &Book) -> Result<()>;

    fn load_book(&self, id: &BookId) -> Result<Option<Book>>;

    /// Remove a book together with its chapters.
    fn delete_book(&self, id: &BookId) -> Result<()>;

    /// Replace the chapter table of a book in one batch.
    fn insert_chapters(&self, book_id: &BookId, chapters: &[Chapter]) -> Result<()>;

    /// Chapters of a book ordered by `start_offset`.
    fn query_chapters_for(&self, book_id: &BookId) -> Result<Vec<Chapter>>;
}

#[derive(Serialize, Deserialize)]
struct ChapterTable {
    #[serde(default)]
    chapters: Vec<Chapter>,
}

#[derive(Debug, Clone)]
pub struct TomlStore {
    root: PathBuf,
}

impl TomlStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| {
            ReaderError::storage(format!("create store dir {}: {err}", root.display()))
        })?;
        info!(root = %root.display(), "Opened record store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn book_dir(&self, id: &BookId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn book_path(&self, id: &BookId) -> PathBuf {
        self.book_dir(id).join("book.toml")
    }

    fn chapters_path(&self, id: &BookId) -> PathBuf {
        self.book_dir(id).join("chapters.toml")
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                ReaderError::storage(format!("create {}: {err}", parent.display()))
            })?;
        }
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, contents)
            .map_err(|err| ReaderError::storage(format!("write {}: {err}", tmp.display())))?;
        fs::rename(&tmp, path)
            .map_err(|err| ReaderError::storage(format!("rename {}: {err}", path.display())))
    }
}

impl RecordStore for TomlStore {
    fn insert_book(&self, book: &Book) -> Result<()> {
        if self.book_path(&book.id).exists() {
            return Err(ReaderError::storage(format!(
                "book {} already exists",
                book.file_path.display()
            )));
        }
        self.save_book(book)
    }

    fn save_book(&self, book: &Book) -> Result<()> {
        let contents = toml::to_string(book).map_err(ReaderError::storage)?;
        self.write_atomic(&self.book_path(&book.id), &contents)?;
        debug!(book = %book.id, "Saved book record");
        Ok(())
    }

    fn load_book(&self, id: &BookId) -> Result<Option<Book>> {
        let path = self.book_path(id);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ReaderError::storage(format!("read {}: {err}", path.display())));
            }
        };
        toml::from_str(&data)
            .map(Some)
            .map_err(|err| ReaderError::storage(format!("parse {}: {err}", path.display())))
    }

    fn delete_book(&self, id: &BookId) -> Result<()> {
        let dir = self.book_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(book = %id, "Deleted book record and chapters");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ReaderError::storage(format!(
                "remove {}: {err}",
                dir.display()
            ))),
        }
    }

    fn insert_chapters(&self, book_id: &BookId, chapters: &[Chapter]) -> Result<()> {
        let table = ChapterTable {
            chapters: chapters.to_vec(),
        };
        let contents = toml::to_string(&table).map_err(ReaderError::storage)?;
        self.write_atomic(&self.chapters_path(book_id), &contents)?;
        debug!(book = %book_id, chapters = chapters.len(), "Stored chapter table");
        Ok(())
    }

    fn query_chapters_for(&self, book_id: &BookId) -> Result<Vec<Chapter>> {
        let path = self.chapters_path(book_id);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(ReaderError::storage(format!("read {}: {err}", path.display())));
            }
        };
        let mut table: ChapterTable = toml::from_str(&data)
            .map_err(|err| ReaderError::storage(format!("parse {}: {err}", path.display())))?;
        table.chapters.sort_by_key(|chapter| chapter.start_offset);
        Ok(table.chapters)
    }
}

/// Store kept entirely in memory. Counts chapter batches and can be told to
/// fail writes, which tests use to observe caching and error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: Mutex<HashMap<BookId, Book>>,
    chapters: Mutex<HashMap<BookId, Vec<Chapter>>>,
    chapter_batches: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chapter_batches(&self) -> usize {
        self.chapter_batches.load(Ordering::Acquire)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(ReaderError::storage("writes disabled"));
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> ReaderError {
    ReaderError::storage("memory store lock poisoned")
}

impl RecordStore for MemoryStore {
    fn insert_book(&self, book: &Book) -> Result<()> {
        self.check_writable()?;
        let mut books = self.books.lock().map_err(poisoned)?;
        if books.contains_key(&book.id) {
            return Err(ReaderError::storage(format!(
                "book {} already exists",
                book.file_path.display()
            )));
        }
        books.insert(book.id.clone(), book.clone());
        Ok(())
    }

    fn save_book(&self, book: &Book) -> Result<()> {
        self.check_writable()?;
        self.books
            .lock()
            .map_err(poisoned)?
            .insert(book.id.clone(), book.clone());
        Ok(())
    }

    fn load_book(&self, id: &BookId) -> Result<Option<Book>> {
        Ok(self.books.lock().map_err(poisoned)?.get(id).cloned())
    }

    fn delete_book(&self, id: &BookId) -> Result<()> {
        self.check_writable()?;
        self.books.lock().map_err(poisoned)?.remove(id);
        self.chapters.lock().map_err(poisoned)?.remove(id);
        Ok(())
    }

    fn insert_chapters(&self, book_id: &BookId, chapters: &[Chapter]) -> Result<()> {
        self.check_writable()?;
        let mut sorted = chapters.to_vec();
        sorted.sort_by_key(|chapter| chapter.start_offset);
        self.chapters
            .lock()
            .map_err(poisoned)?
            .insert(book_id.clone(), sorted);
        self.chapter_batches.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn query_chapters_for(&self, book_id: &BookId) -> Result<Vec<Chapter>> {
        Ok(self
            .chapters
            .lock()
            .map_err(poisoned)?
            .get(book_id)
            .cloned()
            .unwrap_or_default())
    }
}
