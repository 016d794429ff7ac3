use super::defaults;
use super::models::{LogLevel, ReaderConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    reading: ReadingConfig,
    #[serde(default)]
    layout: LayoutConfig,
    #[serde(default)]
    segmentation: SegmentationConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for ReaderConfig {
    fn from(tables: ConfigTables) -> Self {
        ReaderConfig {
            characters_per_page: tables.reading.characters_per_page,
            resume_page_position: tables.reading.resume_page_position,
            previous_page_lands_on_last_page: tables.reading.previous_page_lands_on_last_page,
            font_size: tables.layout.font_size,
            line_spacing: tables.layout.line_spacing,
            paragraph_spacing: tables.layout.paragraph_spacing,
            page_margin: tables.layout.page_margin,
            chapter_title_pattern: tables.segmentation.chapter_title_pattern,
            first_chapter_title: tables.segmentation.first_chapter_title,
            full_text_title: tables.segmentation.full_text_title,
            min_chapter_bytes: tables.segmentation.min_chapter_bytes,
            store_dir: tables.storage.store_dir,
            log_level: tables.logging.log_level,
        }
    }
}

impl From<&ReaderConfig> for ConfigTables {
    fn from(config: &ReaderConfig) -> Self {
        ConfigTables {
            reading: ReadingConfig {
                characters_per_page: config.characters_per_page,
                resume_page_position: config.resume_page_position,
                previous_page_lands_on_last_page: config.previous_page_lands_on_last_page,
            },
            layout: LayoutConfig {
                font_size: config.font_size,
                line_spacing: config.line_spacing,
                paragraph_spacing: config.paragraph_spacing,
                page_margin: config.page_margin,
            },
            segmentation: SegmentationConfig {
                chapter_title_pattern: config.chapter_title_pattern.clone(),
                first_chapter_title: config.first_chapter_title.clone(),
                full_text_title: config.full_text_title.clone(),
                min_chapter_bytes: config.min_chapter_bytes,
            },
            storage: StorageConfig {
                store_dir: config.store_dir.clone(),
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ReadingConfig {
    #[serde(default = "defaults::default_characters_per_page")]
    characters_per_page: usize,
    #[serde(default)]
    resume_page_position: bool,
    #[serde(default)]
    previous_page_lands_on_last_page: bool,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        ReadingConfig {
            characters_per_page: defaults::default_characters_per_page(),
            resume_page_position: false,
            previous_page_lands_on_last_page: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LayoutConfig {
    #[serde(default = "defaults::default_font_size")]
    font_size: u32,
    #[serde(default = "defaults::default_line_spacing")]
    line_spacing: f32,
    #[serde(default = "defaults::default_paragraph_spacing")]
    paragraph_spacing: f32,
    #[serde(default = "defaults::default_page_margin")]
    page_margin: u16,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            font_size: defaults::default_font_size(),
            line_spacing: defaults::default_line_spacing(),
            paragraph_spacing: defaults::default_paragraph_spacing(),
            page_margin: defaults::default_page_margin(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct SegmentationConfig {
    #[serde(default = "defaults::default_chapter_title_pattern")]
    chapter_title_pattern: String,
    #[serde(default = "defaults::default_first_chapter_title")]
    first_chapter_title: String,
    #[serde(default = "defaults::default_full_text_title")]
    full_text_title: String,
    #[serde(default)]
    min_chapter_bytes: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        SegmentationConfig {
            chapter_title_pattern: defaults::default_chapter_title_pattern(),
            first_chapter_title: defaults::default_first_chapter_title(),
            full_text_title: defaults::default_full_text_title(),
            min_chapter_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct StorageConfig {
    #[serde(default = "defaults::default_store_dir")]
    store_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            store_dir: defaults::default_store_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
