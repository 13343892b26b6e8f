//! Logging configuration
//!
//! Shared by the application crate's subscriber setup. Only describes *what*
//! to log and where; installing the subscriber is the binary's job.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::level_filters::LevelFilter;

/// Log file name prefix
const LOG_FILE_PREFIX: &str = "beatlight";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Minimum level (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Number of log files kept in `log_dir`
    pub max_files: usize,
    /// Write to stderr
    pub console_output: bool,
    /// Write to a file in `log_dir`
    pub file_output: bool,
    #[serde(skip)]
    session_stamp: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            max_files: 10,
            console_output: true,
            file_output: false,
            session_stamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        }
    }
}

impl LogConfig {
    /// Parse the configured level, falling back to INFO.
    pub fn parse_level(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "trace" => LevelFilter::TRACE,
            "debug" => LevelFilter::DEBUG,
            "info" => LevelFilter::INFO,
            "warn" | "warning" => LevelFilter::WARN,
            "error" => LevelFilter::ERROR,
            "off" => LevelFilter::OFF,
            _ => LevelFilter::INFO,
        }
    }

    /// Create the log directory if file output is enabled.
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        if self.file_output {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Path of this session's log file
    pub fn current_log_path(&self) -> PathBuf {
        self.log_dir
            .join(format!("{}_{}.log", LOG_FILE_PREFIX, self.session_stamp))
    }

    /// Delete the oldest log files so that at most `max_files - 1` remain,
    /// leaving room for the file of the current session.
    ///
    /// Returns the number of deleted files.
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.log_dir.exists() {
            return Ok(0);
        }

        let mut logs: Vec<PathBuf> = fs::read_dir(&self.log_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "log")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX))
            })
            .collect();

        let keep = self.max_files.saturating_sub(1);
        if logs.len() <= keep {
            return Ok(0);
        }

        // Oldest first; names without a numeric stamp count as oldest
        logs.sort_by_key(|path| (log_stamp(path), path.clone()));
        let excess = logs.len() - keep;
        let mut removed = 0;
        for path in logs.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// Session stamp of a `beatlight_<stamp>.log` file
fn log_stamp(path: &Path) -> Option<u64> {
    path.file_stem()?
        .to_str()?
        .strip_prefix(LOG_FILE_PREFIX)?
        .strip_prefix('_')?
        .parse()
        .ok()
}
