//! Pagination utilities.
//!
//! Chapter text is split into lines, blank lines are dropped, and the
//! remaining lines are packed greedily into pages bounded by a character
//! budget. Lines are never split, so a single line longer than the budget
//! becomes a page of its own.

use tracing::warn;

/// Smallest accepted characters-per-page value.
pub const MIN_CHARACTERS_PER_PAGE: usize = 1;

const LINE_SEPARATOR: char = '\n';

/// Replace a zero page size with the minimum; any positive value is kept.
pub fn checked_characters_per_page(characters_per_page: usize) -> usize {
    if characters_per_page < MIN_CHARACTERS_PER_PAGE {
        warn!(
            characters_per_page,
            min = MIN_CHARACTERS_PER_PAGE,
            "characters_per_page must be positive; using the minimum"
        );
        return MIN_CHARACTERS_PER_PAGE;
    }
    characters_per_page
}

/// Split chapter text into pages of at most `characters_per_page` characters
/// (counted as Unicode scalar values, separators included).
pub fn paginate(text: &str, characters_per_page: usize) -> Vec<String> {
    let capacity = characters_per_page.max(1);

    let mut pages = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let separator_len = if current.is_empty() { 0 } else { 1 };
        let line_len = line.chars().count();
        let prospective_len = current_len + separator_len + line_len;

        if !current.is_empty() && prospective_len > capacity {
            pages.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current.is_empty() {
            // May exceed the budget; lines are kept intact.
            current.push_str(line);
            current_len = line_len;
        } else {
            current.push(LINE_SEPARATOR);
            current.push_str(line);
            current_len += 1 + line_len;
        }
    }

    if !current.is_empty() {
        pages.push(current);
    }

    pages
}

/// Content-relative character offset at which each page starts. Offsets count
/// page characters only, so they stay meaningful across different page sizes.
pub fn page_start_offsets(pages: &[String]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(pages.len());
    let mut offset = 0usize;
    for page in pages {
        offsets.push(offset);
        offset += page.chars().filter(|c| *c != LINE_SEPARATOR).count();
    }
    offsets
}

/// Index of the page containing the content-relative `offset`, clamped to the
/// last page. Returns 0 for an empty page list.
pub fn page_for_offset(pages: &[String], offset: usize) -> usize {
    let starts = page_start_offsets(pages);
    match starts.binary_search(&offset) {
        Ok(idx) => idx,
        Err(insert_at) => insert_at.saturating_sub(1),
    }
}
