use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for structured execution events.
///
/// Sinks never fail the caller: a log line that cannot be written is dropped.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, event: &str, message: &str, fields: &[(&str, Value)]);
}

pub fn build_log_payload(
    level: LogLevel,
    event: &str,
    message: &str,
    fields: &[(&str, Value)],
) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("timestamp".to_string(), Value::from(now_secs()));
    payload.insert("level".to_string(), Value::String(level.to_string()));
    payload.insert("event".to_string(), Value::String(event.to_string()));
    payload.insert("message".to_string(), Value::String(message.to_string()));
    for (key, value) in fields {
        payload.insert((*key).to_string(), value.clone());
    }
    payload
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    path: PathBuf,
}

impl FileLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn log(&self, level: LogLevel, event: &str, message: &str, fields: &[(&str, Value)]) {
        let payload = build_log_payload(level, event, message, fields);
        let Ok(line) = serde_json::to_string(&payload) else {
            return;
        };

        if let Some(parent) = self.path.parent() {
            if fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let Ok(mut file) = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        else {
            return;
        };
        let _ = writeln!(file, "{line}");
    }
}

/// Keeps events in memory; used for in-process inspection and tests.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    entries: Mutex<Vec<Map<String, Value>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Map<String, Value>> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn events(&self) -> Vec<String> {
        self.entries()
            .iter()
            .filter_map(|entry| entry.get("event").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, event: &str, message: &str, fields: &[(&str, Value)]) {
        let payload = build_log_payload(level, event, message, fields);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(payload);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn log(&self, _level: LogLevel, _event: &str, _message: &str, _fields: &[(&str, Value)]) {}
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}
