//! Configuration loading for the reader.
//!
//! All user-tunable settings are centralized here and loaded from
//! `conf/config.toml` if present. Missing or invalid entries fall back to
//! defaults so a book can always be opened.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, parse_config, save_config, serialize_config};
pub use models::{LogLevel, ReaderConfig};
