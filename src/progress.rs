//! Batch ingest progress reporting.
//!
//! `homedocs ingest` can take many files at once. Progress goes to
//! **stderr** so stdout stays parseable for scripts.

use std::io::Write;

/// A single progress event for a batch ingest.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent {
    /// File `n` of `total` is about to be ingested.
    Started { file: String, n: u64, total: u64 },
    /// File `n` of `total` was stored under `key`.
    Stored {
        file: String,
        key: u64,
        n: u64,
        total: u64,
    },
    /// File `n` of `total` failed.
    Failed {
        file: String,
        error: String,
        n: u64,
        total: u64,
    },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  3 / 12  scan.jpg  stored as 41".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Started { file, n, total } => {
                format!("ingest  {} / {}  {}\n", format_number(*n), format_number(*total), file)
            }
            IngestProgressEvent::Stored {
                file,
                key,
                n,
                total,
            } => format!(
                "ingest  {} / {}  {}  stored as {}\n",
                format_number(*n),
                format_number(*total),
                file,
                key
            ),
            IngestProgressEvent::Failed {
                file,
                error,
                n,
                total,
            } => format!(
                "ingest  {} / {}  {}  FAILED: {}\n",
                format_number(*n),
                format_number(*total),
                file,
                error
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Started { file, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "started",
                "file": file,
                "n": n,
                "total": total
            }),
            IngestProgressEvent::Stored {
                file,
                key,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "stored",
                "file": file,
                "key": key,
                "n": n,
                "total": total
            }),
            IngestProgressEvent::Failed {
                file,
                error,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "failed",
                "file": file,
                "error": error,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Parses `auto`, `human`, `json`, or `off`.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "auto" => Ok(Self::default_for_tty()),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            "off" => Ok(ProgressMode::Off),
            other => Err(format!(
                "invalid progress mode '{}': expected auto, human, json, or off",
                other
            )),
        }
    }

    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
