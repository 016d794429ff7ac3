//! Loads and decodes the byte range of a single chapter.

use std::path::Path;
use tracing::{debug, warn};

use crate::byte_source::ByteSource;
use crate::cancellation::CancellationToken;
use crate::encoding::{TextEncoding, fallback_order};
use crate::error::{ReaderError, Result};
use crate::model::Chapter;

/// Read `chapter`'s bytes from `path` and decode them, trying `recorded`
/// first and then the remaining candidates. Fails with `DecodeFailure` rather
/// than guessing when nothing decodes the slice strictly.
pub fn load_chapter_text(
    source: &dyn ByteSource,
    path: &Path,
    recorded: TextEncoding,
    chapter: &Chapter,
    cancel: Option<&CancellationToken>,
) -> Result<String> {
    if let Some(token) = cancel {
        token.check_cancelled("chapter_read")?;
    }
    let bytes = source.read_range(path, chapter.start_offset, chapter.end_offset)?;
    if let Some(token) = cancel {
        token.check_cancelled("chapter_decode")?;
    }

    for candidate in fallback_order(recorded) {
        if let Some(text) = candidate.decode_strict(&bytes) {
            if candidate != recorded {
                warn!(
                    chapter = %chapter.title,
                    %recorded,
                    used = %candidate,
                    "Chapter did not decode with the recorded encoding"
                );
            }
            debug!(
                chapter = %chapter.title,
                bytes = bytes.len(),
                chars = text.chars().count(),
                "Loaded chapter content"
            );
            return Ok(text.into_owned());
        }
    }

    Err(ReaderError::DecodeFailure {
        path: path.to_path_buf(),
        start: chapter.start_offset,
        end: chapter.end_offset,
        recorded,
    })
}
