//! CLI output formatting.
//!
//! Colored status lines, the terminal [`OutputSink`] handed to deployments,
//! and JSON output for `--output json`.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use byoa_lib::sink::OutputSink;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Rounds to whole seconds before formatting, e.g. `2m 5s`.
pub fn format_elapsed(elapsed: Duration) -> String {
  humantime::format_duration(Duration::from_secs(elapsed.as_secs().max(1))).to_string()
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

/// Like [`print_info`] but on stderr, so it never mixes with JSON output.
pub fn print_note(message: &str) {
  eprintln!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stderr, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// Deployment progress and tool output on the terminal.
///
/// Progress goes to stderr when stdout is reserved for JSON.
pub struct TerminalSink {
  json: bool,
}

impl TerminalSink {
  pub fn new(format: OutputFormat) -> Self {
    Self { json: format.is_json() }
  }
}

impl OutputSink for TerminalSink {
  fn write_line(&mut self, line: &str) {
    let arrow = symbols::ARROW;
    if self.json {
      let mut err = std::io::stderr().lock();
      let _ = writeln!(err, "{} {}", arrow, line);
    } else {
      let mut out = std::io::stdout().lock();
      let _ = writeln!(
        out,
        "{} {}",
        arrow.if_supports_color(Stream::Stdout, |s| s.cyan()),
        line
      );
    }
  }
}
