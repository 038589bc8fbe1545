// ============================================================
// Layer 6 — Run Log
// ============================================================
// Sets up tracing for the whole process:
//
//   stdout  — always, filtered by RUST_LOG (default propara_tracker=info)
//   file    — optional, <log_dir>/<MM-DD.HH-MM>.log, no ANSI colours
//
// init() returns a RunLog handle that must stay alive for the
// whole run. Dropping it syncs the log file, so every way out of
// main (normal completion, early stopping, an error) leaves a
// complete log behind.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "propara_tracker=info";

/// Keeps the log file open; syncs it on drop.
pub struct RunLog {
    file: Option<(PathBuf, Arc<File>)>,
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if let Some((path, file)) = &self.file {
            if let Err(e) = file.sync_all() {
                eprintln!("failed to flush log '{}': {e}", path.display());
            }
        }
    }
}

/// Install the global subscriber.
pub fn init(log_dir: Option<&Path>) -> Result<RunLog> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file = log_dir.map(|dir| open_log_file(dir, Local::now())).transpose()?;
    let file_layer = file.as_ref().map(|(_, f)| {
        fmt::layer()
            .with_writer(f.clone())
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("cannot install logger: {e}"))?;

    if let Some((path, _)) = &file {
        tracing::info!("Logging to '{}'", path.display());
    }
    Ok(RunLog { file })
}

fn log_file_name(now: DateTime<Local>) -> String {
    format!("{}.log", now.format("%m-%d.%H-%M"))
}

fn open_log_file(dir: &Path, now: DateTime<Local>) -> Result<(PathBuf, Arc<File>)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create log directory '{}'", dir.display()))?;
    let path = dir.join(log_file_name(now));
    let file = File::create(&path)
        .with_context(|| format!("Cannot create log file '{}'", path.display()))?;
    Ok((path, Arc::new(file)))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn march_fifth() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap()
    }

    #[test]
    fn test_log_file_name_format() {
        assert_eq!(log_file_name(march_fifth()), "03-05.14-07.log");
    }

    #[test]
    fn test_open_log_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        let (path, _) = open_log_file(&nested, march_fifth()).unwrap();
        assert!(path.exists());
        assert_eq!(path.parent().unwrap(), nested.as_path());
    }
}
