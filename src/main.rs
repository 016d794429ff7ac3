//! Command-line driver for the txt reader.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Open the book in a `ReadingSession`, apply the requested moves and print
//!   the resulting page and progress.

use anyhow::{Context, Result, anyhow};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};
use txt_reader::config::load_config;
use txt_reader::{ByteSource, FsByteSource, Navigation, Parser, ReadingSession, TomlStore};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage: txt-reader <path-to-book.txt> [next|prev|next-chapter|prev-chapter]...";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, Copy)]
enum Move {
    Next,
    Previous,
    NextChapter,
    PreviousChapter,
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let (book_path, moves) = parse_args()?;
    let config = load_config(Path::new("conf/config.toml"));
    set_log_level(reload_handle, config.log_level.as_filter_str());

    let source = Arc::new(FsByteSource);
    let size = source
        .file_size(&book_path)
        .with_context(|| format!("Failed to stat {}", book_path.display()))?;
    info!(
        path = %book_path.display(),
        bytes = size,
        characters_per_page = config.characters_per_page,
        "Starting txt reader"
    );

    let store = TomlStore::open(&config.store_dir).context("Failed to open the record store")?;
    let parser = Parser::txt(source, config.segmenter_options());
    let mut session = ReadingSession::new(parser, Arc::new(store), config);
    session
        .open_path(&book_path)
        .context("Failed to open the book")?;

    for step in moves {
        let outcome = match step {
            Move::Next => session.next_page(),
            Move::Previous => session.previous_page(),
            Move::NextChapter => session.next_chapter(),
            Move::PreviousChapter => session.previous_chapter(),
        }
        .with_context(|| format!("Failed to apply {step:?}"))?;
        if outcome == Navigation::AtBoundary {
            warn!(?step, "No further page in that direction");
        }
    }

    if let Some(page) = session.current_page() {
        println!("{page}");
    }
    if let Some(progress) = session.progress() {
        println!("{}", serde_json::to_string_pretty(&progress)?);
    }
    session.close().context("Failed to save reading progress")?;
    Ok(())
}

fn parse_args() -> Result<(PathBuf, Vec<Move>)> {
    let mut args = env::args().skip(1);
    let path = args.next().ok_or_else(|| anyhow!(USAGE))?;

    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.as_path().display()));
    }
    let moves = args
        .map(|arg| match arg.as_str() {
            "next" | "n" => Ok(Move::Next),
            "prev" | "p" => Ok(Move::Previous),
            "next-chapter" => Ok(Move::NextChapter),
            "prev-chapter" => Ok(Move::PreviousChapter),
            other => Err(anyhow!("Unknown move '{other}'. {USAGE}")),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((path, moves))
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    if env::var_os("RUST_LOG").is_some() {
        info!("RUST_LOG is set; ignoring config log level");
        return;
    }
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
