use serde::Deserialize;
use tracing::warn;

use crate::pagination::checked_characters_per_page;
use crate::segmenter::{SegmenterOptions, TitlePattern};

/// Reader configuration, flattened from the TOML tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    pub characters_per_page: usize,
    pub resume_page_position: bool,
    pub previous_page_lands_on_last_page: bool,
    pub font_size: u32,
    pub line_spacing: f32,
    pub paragraph_spacing: f32,
    pub page_margin: u16,
    pub chapter_title_pattern: String,
    pub first_chapter_title: String,
    pub full_text_title: String,
    pub min_chapter_bytes: u64,
    pub store_dir: String,
    pub log_level: LogLevel,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            characters_per_page: crate::config::defaults::default_characters_per_page(),
            resume_page_position: false,
            previous_page_lands_on_last_page: false,
            font_size: crate::config::defaults::default_font_size(),
            line_spacing: crate::config::defaults::default_line_spacing(),
            paragraph_spacing: crate::config::defaults::default_paragraph_spacing(),
            page_margin: crate::config::defaults::default_page_margin(),
            chapter_title_pattern: crate::config::defaults::default_chapter_title_pattern(),
            first_chapter_title: crate::config::defaults::default_first_chapter_title(),
            full_text_title: crate::config::defaults::default_full_text_title(),
            min_chapter_bytes: 0,
            store_dir: crate::config::defaults::default_store_dir(),
            log_level: crate::config::defaults::default_log_level(),
        }
    }
}

impl ReaderConfig {
    /// Reject a zero page size and replace an invalid title pattern with the
    /// default one.
    pub fn normalize(&mut self) {
        self.characters_per_page = checked_characters_per_page(self.characters_per_page);
        if let Err(err) = TitlePattern::new(&self.chapter_title_pattern) {
            warn!(
                pattern = %self.chapter_title_pattern,
                "Invalid chapter title pattern, using default: {err}"
            );
            self.chapter_title_pattern = crate::config::defaults::default_chapter_title_pattern();
        }
        if self.first_chapter_title.trim().is_empty() {
            self.first_chapter_title = crate::config::defaults::default_first_chapter_title();
        }
        if self.full_text_title.trim().is_empty() {
            self.full_text_title = crate::config::defaults::default_full_text_title();
        }
    }

    pub fn segmenter_options(&self) -> SegmenterOptions {
        let pattern = TitlePattern::new(&self.chapter_title_pattern).unwrap_or_else(|err| {
            warn!("Invalid chapter title pattern, using default: {err}");
            TitlePattern::default()
        });
        SegmenterOptions {
            pattern,
            first_title: self.first_chapter_title.clone(),
            full_text_title: self.full_text_title.clone(),
            min_chapter_bytes: self.min_chapter_bytes,
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Default, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
