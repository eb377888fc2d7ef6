//! Line-oriented output sinks.
//!
//! Progress messages from the deployment lifecycle and streamed tool output
//! are written through [`OutputSink`] so callers decide where they go: a
//! terminal, a log file, or a buffer in tests.

use std::io::Write;

/// A "write line" capability.
pub trait OutputSink: Send {
  fn write_line(&mut self, line: &str);
}

/// Collects lines in memory.
impl OutputSink for Vec<String> {
  fn write_line(&mut self, line: &str) {
    self.push(line.to_string());
  }
}

/// Writes each line to the process's stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
  fn write_line(&mut self, line: &str) {
    let mut out = std::io::stdout().lock();
    // A closed stdout is not worth failing a deployment over.
    let _ = writeln!(out, "{}", line);
  }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl OutputSink for NullSink {
  fn write_line(&mut self, _line: &str) {}
}
