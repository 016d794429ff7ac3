pub(crate) fn default_characters_per_page() -> usize {
    1000
}

pub(crate) fn default_font_size() -> u32 {
    18
}

pub(crate) fn default_line_spacing() -> f32 {
    8.0
}

pub(crate) fn default_paragraph_spacing() -> f32 {
    12.0
}

pub(crate) fn default_page_margin() -> u16 {
    20
}

pub(crate) fn default_chapter_title_pattern() -> String {
    crate::segmenter::DEFAULT_TITLE_PATTERN.to_string()
}

pub(crate) fn default_first_chapter_title() -> String {
    "Chapter 1".to_string()
}

pub(crate) fn default_full_text_title() -> String {
    "Full Text".to_string()
}

pub(crate) fn default_store_dir() -> String {
    ".cache".to_string()
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}
