use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of activity lines kept by a [`LogBuffer`]
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Maximum line length before truncation
const MAX_LINE_LENGTH: usize = 2048;

/// Default tracing filter when neither `RUST_LOG` nor settings provide one
pub const DEFAULT_FILTER: &str = "sshdeck=info,warn";

/// Sensitive patterns to redact
static SENSITIVE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // SSH private key blocks
        Regex::new(r"(?s)-----BEGIN[^-]*PRIVATE KEY-----.*?-----END[^-]*PRIVATE KEY-----").unwrap(),
        // Authorization headers
        Regex::new(r"(?i)authorization\s*:\s*(bearer|basic)\s+[^\s]+").unwrap(),
        // Proxy credentials inlined in templates
        Regex::new(r"(?i)(proxy[_-]?password|proxy[_-]?pass)\s*[:=]\s*[^\s]+").unwrap(),
        // Generic secrets by key name (key=value patterns)
        Regex::new(r#"(?i)(password|passwd|pwd|secret|token|passphrase)\s*[:=]\s*["']?[^\s"']+["']?"#).unwrap(),
        // netrc bodies
        Regex::new(r#"(?m)^\s*password\s+"[^"\n]*""#).unwrap(),
    ]
});

/// Sanitize a string by removing sensitive information
pub fn sanitize(input: &str) -> String {
    let mut result = input.to_string();

    for pattern in SENSITIVE_PATTERNS.iter() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }

    if result.len() > MAX_LINE_LENGTH {
        let mut cut = MAX_LINE_LENGTH;
        while !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result = format!("{}... [truncated]", &result[..cut]);
    }

    result
}

/// Sanitize an argument vector for debug logging, replacing a known secret verbatim.
pub fn sanitize_args(args: &[String], secret: Option<&str>) -> String {
    let joined = args.join(" ");
    let joined = match secret {
        Some(secret) if !secret.is_empty() => joined.replace(secret, "[REDACTED]"),
        _ => joined,
    };
    sanitize(&joined)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `filter`.
pub fn init_tracing(filter: &str) {
    let fallback = if filter.trim().is_empty() {
        DEFAULT_FILTER.to_string()
    } else {
        filter.to_string()
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A single activity log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: sanitize(&message.into()),
        }
    }

    /// `[HH:MM:SS] message`
    pub fn display(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Bounded activity log; oldest lines are dropped first.
pub struct LogBuffer {
    lines: RwLock<VecDeque<LogLine>>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Append a line and mirror it to tracing.
    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        let line = LogLine::new(level, message);
        match level {
            LogLevel::Info => tracing::info!(target: "sshdeck::files", "{}", line.message),
            LogLevel::Warn => tracing::warn!(target: "sshdeck::files", "{}", line.message),
            LogLevel::Error => tracing::error!(target: "sshdeck::files", "{}", line.message),
        }

        let mut lines = self.lines.write();
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    /// Rendered lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines.read().iter().map(LogLine::display).collect()
    }

    pub fn entries(&self) -> Vec<LogLine> {
        self.lines.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }

    pub fn clear(&self) {
        self.lines.write().clear();
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
