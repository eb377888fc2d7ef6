//! [`ProcessRunner`] backed by real subprocesses.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};
use tokio::process::{Child, Command};
use tracing::debug;

use super::{CommandSpec, ExitCode, ProcessError, ProcessOutput, ProcessRunner};
use crate::sink::OutputSink;

/// Spawns programs found on `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
  Stdout,
  Stderr,
}

impl SystemRunner {
  pub fn new() -> Self {
    Self
  }

  fn spawn(&self, spec: &CommandSpec) -> Result<Child, ProcessError> {
    let program = which::which(&spec.program).map_err(|_| ProcessError::NotFound {
      program: spec.program.clone(),
    })?;

    let mut command = Command::new(program);
    command
      .args(&spec.args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
      command.current_dir(cwd);
    }
    for (key, value) in &spec.env {
      command.env(key, value);
    }

    debug!(command = %spec, cwd = ?spec.cwd, "spawning process");

    command.spawn().map_err(|source| {
      if source.kind() == io::ErrorKind::NotFound {
        ProcessError::NotFound {
          program: spec.program.clone(),
        }
      } else {
        ProcessError::Io {
          program: spec.program.clone(),
          source,
        }
      }
    })
  }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
  async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
    let child = self.spawn(spec)?;

    let mut stdout = String::new();
    let mut combined = String::new();
    let exit = pump(spec, child, |stream, line| {
      if stream == Stream::Stdout {
        stdout.push_str(line);
        stdout.push('\n');
      }
      combined.push_str(line);
      combined.push('\n');
    })
    .await?;

    debug!(command = %spec, %exit, "process finished");
    Ok(ProcessOutput { exit, stdout, combined })
  }

  async fn run_streaming(&self, spec: &CommandSpec, sink: &mut dyn OutputSink) -> Result<ExitCode, ProcessError> {
    let child = self.spawn(spec)?;
    let exit = pump(spec, child, |_, line| sink.write_line(line)).await?;
    debug!(command = %spec, %exit, "process finished");
    Ok(exit)
  }
}

/// Forwards both pipes line by line until they close, then reaps the child.
async fn pump<F>(spec: &CommandSpec, mut child: Child, mut on_line: F) -> Result<ExitCode, ProcessError>
where
  F: FnMut(Stream, &str),
{
  let io_err = |source: io::Error| ProcessError::Io {
    program: spec.program.clone(),
    source,
  };

  let mut out = child.stdout.take().map(|s| BufReader::new(s).split(b'\n'));
  let mut err = child.stderr.take().map(|s| BufReader::new(s).split(b'\n'));
  let mut out_open = out.is_some();
  let mut err_open = err.is_some();

  while out_open || err_open {
    tokio::select! {
      line = next_line(&mut out), if out_open => match line.map_err(io_err)? {
        Some(line) => on_line(Stream::Stdout, &line),
        None => out_open = false,
      },
      line = next_line(&mut err), if err_open => match line.map_err(io_err)? {
        Some(line) => on_line(Stream::Stderr, &line),
        None => err_open = false,
      },
    }
  }

  let status = child.wait().await.map_err(io_err)?;
  Ok(ExitCode(status.code()))
}

async fn next_line<R>(lines: &mut Option<Split<R>>) -> io::Result<Option<String>>
where
  R: AsyncBufRead + Unpin,
{
  let Some(lines) = lines else {
    return Ok(None);
  };
  Ok(lines.next_segment().await?.map(|bytes| {
    let line = String::from_utf8_lossy(&bytes);
    let line: &str = &line;
    line.strip_suffix('\r').unwrap_or(line).to_string()
  }))
}
