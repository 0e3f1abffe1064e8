use std::fmt;
use std::fs::{OpenOptions, create_dir_all, metadata, remove_file};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use eyre::Result;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::prelude::*;

/// Maximum log file size in bytes before rotation (50 MB)
const MAX_LOG_SIZE: u64 = 50 * 1024 * 1024;

/// Local wall-clock timestamps, matching what users see in their session.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "[{}]", Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Get log file path
pub fn log_path() -> PathBuf {
    let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    path.push("dimmer");
    if !path.exists() {
        let _ = create_dir_all(&path);
    }
    path.push("dimmer.log");
    path
}

/// Rotate the log if too big
fn rotate_log_if_needed(path: &Path) {
    if let Ok(meta) = metadata(path) {
        if meta.len() >= MAX_LOG_SIZE {
            // Simple rotation: delete old log
            let _ = remove_file(path);
        }
    }
}

/// Separate sessions with a blank line, only if the file has content
fn add_session_separator(path: &Path) {
    if let Ok(meta) = metadata(path) {
        if meta.len() > 0 {
            if let Ok(mut file) = OpenOptions::new().append(true).open(path) {
                let _ = writeln!(file);
            }
        }
    }
}

/// Install the global subscriber: cache-file layer always, stderr layer when verbose.
pub fn init_logging(verbose: bool) -> Result<()> {
    let path = log_path();
    rotate_log_if_needed(&path);
    add_session_separator(&path);

    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_timer(LocalTime)
        .with_filter(LevelFilter::INFO);

    let console_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_timer(LocalTime)
            .with_filter(LevelFilter::DEBUG)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    Ok(())
}
