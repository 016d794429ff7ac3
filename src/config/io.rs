use super::models::ReaderConfig;
use super::tables::ConfigTables;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from `path`, falling back to defaults when the file is
/// missing or does not parse. Values are normalized before returning.
pub fn load_config(path: &Path) -> ReaderConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return ReaderConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            ReaderConfig::default()
        }
    }
}

pub fn parse_config(contents: &str) -> Result<ReaderConfig, toml::de::Error> {
    let tables: ConfigTables = toml::from_str(contents)?;
    let mut config = ReaderConfig::from(tables);
    config.normalize();
    Ok(config)
}

pub fn serialize_config(config: &ReaderConfig) -> Result<String> {
    toml::to_string(&ConfigTables::from(config)).context("Failed to serialize config")
}

pub fn save_config(path: &Path, config: &ReaderConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = serialize_config(config)?;
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Saved config");
    Ok(())
}
