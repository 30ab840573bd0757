//! User-visible output for the bootstrap.
//!
//! The bootstrap narrates what it is doing ("Looking for update",
//! "Renamed successfully.") through a [`LogSink`] rather than printing
//! directly. Two things depend on that seam:
//!
//! - the fatal report replays everything printed so far, so the console
//!   sink keeps a transcript alongside mirroring lines to stdout
//! - tests assert on exact wording without capturing stdout
//!
//! Ambient diagnostics (`tracing`) are separate and never go through the
//! sink; the sink carries only the lines a user is meant to read.

use std::sync::Mutex;

/// Receiver for the bootstrap's user-visible progress lines.
///
/// Implementations must be callable from both the control task and the
/// background download task, so the trait requires `Send + Sync` and
/// takes `&self`.
pub trait LogSink: Send + Sync {
    /// Record one line of progress output.
    fn write_line(&self, line: &str);
}

/// The production sink: mirrors each line to stdout and accumulates a
/// transcript for the fatal report.
#[derive(Default)]
pub struct ConsoleSink {
    buffer: Mutex<String>,
}

impl ConsoleSink {
    /// Create an empty console sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, one line per `write_line` call.
    ///
    /// Used by the fatal report to show the run's full output in bug
    /// reports.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.buffer.lock().map(|buffer| buffer.clone()).unwrap_or_default()
    }
}

impl LogSink for ConsoleSink {
    fn write_line(&self, line: &str) {
        println!("{line}");
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push_str(line);
            buffer.push('\n');
        }
    }
}

/// Test sink that records lines without touching stdout.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines recorded so far, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    /// Whether any recorded line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
