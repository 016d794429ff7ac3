//! Chapter segmentation for plain-text books.
//!
//! The scan works on raw bytes so that every offset it records is a byte
//! offset in the book's own encoding. Lines are decoded one at a time only to
//! test them against the title pattern; the loader later slices the file with
//! exactly these offsets.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::encoding::TextEncoding;
use crate::model::{BookId, Chapter};

pub const DEFAULT_TITLE_PATTERN: &str = r"(?i)^(?:第[0-9０-９一二三四五六七八九十百千万零〇两]+[章节卷集部篇回]|(?:chapter|section|volume|part|book)\s+(?:[0-9]+|[ivxlcdm]+)\b).*$";

static RE_DEFAULT_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_TITLE_PATTERN).unwrap());

/// Regex deciding whether a trimmed line opens a new chapter.
#[derive(Debug, Clone)]
pub struct TitlePattern {
    regex: Regex,
}

impl TitlePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Default for TitlePattern {
    fn default() -> Self {
        Self {
            regex: RE_DEFAULT_TITLE.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmenterOptions {
    pub pattern: TitlePattern,
    /// Title of the chapter that precedes the first matched heading.
    pub first_title: String,
    /// Title of the single chapter emitted when no heading matches.
    pub full_text_title: String,
    /// A heading only closes the pending chapter once it spans this many bytes.
    pub min_chapter_bytes: u64,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            pattern: TitlePattern::default(),
            first_title: "Chapter 1".to_string(),
            full_text_title: "Full Text".to_string(),
            min_chapter_bytes: 0,
        }
    }
}

/// One line of the raw buffer. `content_end` excludes the terminator,
/// `end` includes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineSpan {
    start: usize,
    content_end: usize,
    end: usize,
}

fn line_spans(bytes: &[u8], encoding: TextEncoding) -> Vec<LineSpan> {
    let unit = encoding.code_unit_len();
    let is_unit = |at: usize, ch: u8| match unit {
        1 => bytes[at] == ch,
        _ => bytes[at] == ch && bytes[at + 1] == 0,
    };

    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    while i + unit <= bytes.len() {
        if is_unit(i, b'\n') {
            let mut content_end = i;
            if content_end >= start + unit && is_unit(content_end - unit, b'\r') {
                content_end -= unit;
            }
            spans.push(LineSpan {
                start,
                content_end,
                end: i + unit,
            });
            start = i + unit;
        }
        i += unit;
    }
    if start < bytes.len() {
        spans.push(LineSpan {
            start,
            content_end: bytes.len(),
            end: bytes.len(),
        });
    }
    spans
}

/// Split `bytes` into chapters. The result is never empty and always covers
/// `0..bytes.len()` without gaps or overlaps.
pub fn segment(
    book_id: &BookId,
    bytes: &[u8],
    encoding: TextEncoding,
    options: &SegmenterOptions,
) -> Vec<Chapter> {
    let total = bytes.len() as u64;
    let mut chapters = Vec::new();
    let mut current_title = options.first_title.clone();
    let mut current_start = 0u64;
    let mut current_offset = 0u64;
    let mut matched_any = false;

    for span in line_spans(bytes, encoding) {
        let line = encoding.decode_lossy(&bytes[span.start..span.content_end]);
        let trimmed = line.trim();
        if !trimmed.is_empty() && options.pattern.is_match(trimmed) {
            matched_any = true;
            let pending = current_offset - current_start;
            if pending > 0 && pending >= options.min_chapter_bytes {
                let title = std::mem::replace(&mut current_title, trimmed.to_string());
                chapters.push(Chapter {
                    book_id: book_id.clone(),
                    title,
                    start_offset: current_start,
                    end_offset: current_offset,
                });
                current_start = current_offset;
            } else if pending == 0 {
                current_title = trimmed.to_string();
            } else {
                debug!(
                    title = trimmed,
                    pending, "Heading absorbed into short pending chapter"
                );
            }
        }
        current_offset = span.end as u64;
    }

    if current_offset > current_start {
        chapters.push(Chapter {
            book_id: book_id.clone(),
            title: current_title,
            start_offset: current_start,
            end_offset: current_offset,
        });
    }

    if !matched_any || chapters.is_empty() {
        info!(bytes = total, "No chapter headings found; using a single chapter");
        return vec![Chapter {
            book_id: book_id.clone(),
            title: options.full_text_title.clone(),
            start_offset: 0,
            end_offset: total,
        }];
    }

    info!(chapters = chapters.len(), bytes = total, %encoding, "Segmented book");
    chapters
}
