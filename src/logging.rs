//! Per-component JSON-lines logs.
//!
//! Each component (`image-gen`, `catalog`, ...) appends to
//! `<log_dir>/<component>-<YYYY-MM-DD>.log`, one `{timestamp, level, message,
//! data?}` object per line. Loggers are handed out by a [`LogRegistry`] that
//! `main` builds once and passes to command handlers.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::ErgonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ErgonError> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ErgonError::invalid("log level", s, "debug, info, warn, error")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogDestination {
    #[default]
    File,
    Console,
    Both,
}

impl LogDestination {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogDestination::File => "file",
            LogDestination::Console => "console",
            LogDestination::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ErgonError> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(LogDestination::File),
            "console" => Ok(LogDestination::Console),
            "both" => Ok(LogDestination::Both),
            _ => Err(ErgonError::invalid("log destination", s, Self::variants().join(", "))),
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["file", "console", "both"]
    }

    fn to_file(self) -> bool {
        matches!(self, LogDestination::File | LogDestination::Both)
    }

    fn to_console(self) -> bool {
        matches!(self, LogDestination::Console | LogDestination::Both)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoggerConfig {
    pub destination: LogDestination,
    pub min_level: LogLevel,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            destination: LogDestination::File,
            min_level: LogLevel::Info,
        }
    }
}

/// One line of a log file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Process-wide set of named loggers
pub struct LogRegistry {
    log_dir: PathBuf,
    config: LoggerConfig,
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
}

impl LogRegistry {
    pub fn new(log_dir: impl Into<PathBuf>, config: LoggerConfig) -> Self {
        Self {
            log_dir: log_dir.into(),
            config,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Returns the logger for `name`, creating it on first use
    pub fn get(&self, name: &str) -> Arc<Logger> {
        let mut loggers = match self.loggers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loggers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Logger::new(name, &self.log_dir, self.config)))
            .clone()
    }
}

pub struct Logger {
    name: String,
    file_path: PathBuf,
    config: LoggerConfig,
}

impl Logger {
    fn new(name: &str, log_dir: &Path, config: LoggerConfig) -> Self {
        Self {
            name: name.to_string(),
            file_path: log_file_path(log_dir, name, Utc::now().date_naive()),
            config,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn debug(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Debug, message, data);
    }

    pub fn info(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Info, message, data);
    }

    pub fn warn(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Warn, message, data);
    }

    pub fn error(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Error, message, data);
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        if level < self.config.min_level {
            return;
        }

        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message: message.into(),
            data,
        };

        if self.config.destination.to_console() {
            eprintln!("{}", render_entry(&entry, Some(&self.name)));
        }

        if self.config.destination.to_file() {
            if let Err(e) = self.append(&entry) {
                eprintln!("{}: failed to write log {}: {}", "Warning".yellow().bold(), self.file_path.display(), e);
            }
        }
    }

    fn append(&self, entry: &LogEntry) -> std::io::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.file_path)?;
        file.write_all(line.as_bytes())
    }

    /// Reads the last `max_entries` entries at or above `min_level` from this logger's file
    pub fn entries(&self, min_level: LogLevel, max_entries: usize) -> std::io::Result<Vec<LogEntry>> {
        read_entries(&self.file_path, min_level, max_entries)
    }
}

pub fn log_file_path(log_dir: &Path, name: &str, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("{}-{}.log", name, date.format("%Y-%m-%d")))
}

/// Parses a log file, skipping malformed lines. A missing file yields no entries.
pub fn read_entries(path: &Path, min_level: LogLevel, max_entries: usize) -> std::io::Result<Vec<LogEntry>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut entries: Vec<LogEntry> = content
        .lines()
        .rev()
        .filter_map(|line| serde_json::from_str::<LogEntry>(line).ok())
        .filter(|entry| entry.level >= min_level)
        .take(max_entries)
        .collect();
    entries.reverse();
    Ok(entries)
}

/// `[2025-01-02 03:04:05] [component] LEVEL message {data}`
pub fn render_entry(entry: &LogEntry, component: Option<&str>) -> String {
    let timestamp = DateTime::parse_from_rfc3339(&entry.timestamp)
        .map(|t| t.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| entry.timestamp.clone());

    let level = match entry.level {
        LogLevel::Debug => entry.level.as_str().dimmed(),
        LogLevel::Info => entry.level.as_str().blue(),
        LogLevel::Warn => entry.level.as_str().yellow(),
        LogLevel::Error => entry.level.as_str().red(),
    };

    let mut line = match component {
        Some(name) => format!("[{}] [{}] {} {}", timestamp, name, level, entry.message),
        None => format!("[{}] {} {}", timestamp, level, entry.message),
    };
    if let Some(data) = &entry.data {
        line.push(' ');
        line.push_str(&data.to_string());
    }
    line
}
