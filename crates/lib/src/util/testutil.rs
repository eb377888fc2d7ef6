//! Test helpers shared across modules.
//!
//! [`RecordingRunner`] stands in for the real process runner: it records
//! every invocation and answers from scripted replies, so the driver, the
//! bootstrapper and the orchestrator can be exercised without `terraform`
//! or `aws` installed.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::identity::{CallerIdentity, IdentityError, IdentityProvider};
use crate::manifest::Manifest;
use crate::process::{CommandSpec, ExitCode, ProcessError, ProcessOutput, ProcessRunner};
use crate::records::{DeploymentRecords, RecordError, RecordStore};
use crate::sink::OutputSink;

/// A command that runs `script` through the platform shell.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> CommandSpec {
  CommandSpec::new("/bin/sh").args(["-c", script])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> CommandSpec {
  CommandSpec::new("cmd.exe").args(["/C", script])
}

/// A scripted process result.
#[derive(Debug, Clone, Default)]
pub struct Reply {
  pub code: i32,
  pub stdout: String,
  pub stderr: String,
}

impl Reply {
  pub fn ok(stdout: &str) -> Self {
    Self {
      code: 0,
      stdout: stdout.to_string(),
      stderr: String::new(),
    }
  }

  pub fn fail(code: i32, stderr: &str) -> Self {
    Self {
      code,
      stdout: String::new(),
      stderr: stderr.to_string(),
    }
  }

  pub fn with_stdout(mut self, stdout: &str) -> Self {
    self.stdout = stdout.to_string();
    self
  }

  fn lines(&self) -> impl Iterator<Item = &str> {
    self.stdout.lines().chain(self.stderr.lines())
  }
}

struct Rule {
  program: String,
  prefix: Vec<String>,
  replies: VecDeque<Reply>,
}

impl Rule {
  fn matches(&self, spec: &CommandSpec) -> bool {
    self.program == spec.program && spec.args.starts_with(&self.prefix)
  }

  /// Queued replies are consumed in order; the last one repeats.
  fn next(&mut self) -> Reply {
    if self.replies.len() > 1 {
      self.replies.pop_front().unwrap_or_default()
    } else {
      self.replies.front().cloned().unwrap_or_default()
    }
  }
}

/// Fake [`ProcessRunner`] answering from rules keyed by program and
/// argument prefix. The longest matching prefix wins; unmatched commands
/// succeed with no output.
#[derive(Default)]
pub struct RecordingRunner {
  rules: Mutex<Vec<Rule>>,
  calls: Mutex<Vec<CommandSpec>>,
  missing: HashSet<String>,
}

impl RecordingRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Makes `program` behave as if it were not on `PATH`.
  pub fn missing(mut self, program: &str) -> Self {
    self.missing.insert(program.to_string());
    self
  }

  /// Queues `reply` for commands of `program` whose args start with `prefix`.
  pub fn reply(&self, program: &str, prefix: &[&str], reply: Reply) {
    let prefix: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
    let mut rules = self.rules.lock().unwrap();
    if let Some(rule) = rules.iter_mut().find(|r| r.program == program && r.prefix == prefix) {
      rule.replies.push_back(reply);
      return;
    }
    rules.push(Rule {
      program: program.to_string(),
      prefix,
      replies: VecDeque::from([reply]),
    });
  }

  /// Drops any replies queued for `program`/`prefix` and queues `reply`.
  pub fn replace(&self, program: &str, prefix: &[&str], reply: Reply) {
    let prefix_owned: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
    self
      .rules
      .lock()
      .unwrap()
      .retain(|r| !(r.program == program && r.prefix == prefix_owned));
    self.reply(program, prefix, reply);
  }

  pub fn calls(&self) -> Vec<CommandSpec> {
    self.calls.lock().unwrap().clone()
  }

  pub fn calls_matching(&self, program: &str, prefix: &[&str]) -> Vec<CommandSpec> {
    self
      .calls()
      .into_iter()
      .filter(|c| c.program == program && c.args.iter().map(String::as_str).take(prefix.len()).eq(prefix.iter().copied()))
      .collect()
  }

  /// The first argument of every call to `program`, in order.
  pub fn subcommands(&self, program: &str) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter(|c| c.program == program)
      .filter_map(|c| c.args.first().cloned())
      .collect()
  }

  fn answer(&self, spec: &CommandSpec) -> Result<Reply, ProcessError> {
    self.calls.lock().unwrap().push(spec.clone());
    if self.missing.contains(&spec.program) {
      return Err(ProcessError::NotFound {
        program: spec.program.clone(),
      });
    }
    let mut rules = self.rules.lock().unwrap();
    let reply = rules
      .iter_mut()
      .filter(|r| r.matches(spec))
      .max_by_key(|r| r.prefix.len())
      .map(Rule::next)
      .unwrap_or_else(|| Reply::ok(""));
    Ok(reply)
  }
}

#[async_trait]
impl ProcessRunner for RecordingRunner {
  async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
    let reply = self.answer(spec)?;
    Ok(ProcessOutput {
      exit: ExitCode(Some(reply.code)),
      combined: reply.lines().collect::<Vec<_>>().join("\n"),
      stdout: reply.stdout,
    })
  }

  async fn run_streaming(&self, spec: &CommandSpec, sink: &mut dyn OutputSink) -> Result<ExitCode, ProcessError> {
    let reply = self.answer(spec)?;
    for line in reply.lines() {
      sink.write_line(line);
    }
    Ok(ExitCode(Some(reply.code)))
  }
}

/// Identity provider with fixed answers.
pub struct StaticIdentity {
  pub identity: CallerIdentity,
  pub region: String,
}

impl StaticIdentity {
  pub fn new(account_id: &str, region: &str) -> Self {
    Self {
      identity: CallerIdentity {
        account_id: account_id.to_string(),
        arn: format!("arn:aws:iam::{}:user/tester", account_id),
        user_id: "AIDATESTER".to_string(),
      },
      region: region.to_string(),
    }
  }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
  async fn current_identity(&self) -> Result<CallerIdentity, IdentityError> {
    Ok(self.identity.clone())
  }

  async fn default_region(&self) -> Result<String, IdentityError> {
    Ok(self.region.clone())
  }
}

/// In-memory record store.
#[derive(Default)]
pub struct MemoryRecordStore {
  records: Mutex<DeploymentRecords>,
}

impl MemoryRecordStore {
  pub fn snapshot(&self) -> DeploymentRecords {
    self.records.lock().unwrap().clone()
  }
}

impl RecordStore for MemoryRecordStore {
  fn load(&self) -> Result<DeploymentRecords, RecordError> {
    Ok(self.snapshot())
  }

  fn save(&self, records: &DeploymentRecords) -> Result<(), RecordError> {
    *self.records.lock().unwrap() = records.clone();
    Ok(())
  }
}

/// Record store whose writes always fail.
pub struct FailingRecordStore;

impl RecordStore for FailingRecordStore {
  fn load(&self) -> Result<DeploymentRecords, RecordError> {
    Ok(DeploymentRecords::new())
  }

  fn save(&self, _records: &DeploymentRecords) -> Result<(), RecordError> {
    Err(RecordError::Write {
      path: "/read-only/deployments.json".into(),
      source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only file system"),
    })
  }
}

/// A valid manifest for an HTTP service named `name`.
pub fn sample_manifest(name: &str) -> Manifest {
  serde_yaml::from_str(&format!(
    r#"
name: {name}
runtime: python3.11
start_command: uvicorn main:app --host 0.0.0.0
port: 8080
endpoints:
  - GET /orders
env:
  required: [DATABASE_URL]
  optional:
    LOG_LEVEL: info
"#
  ))
  .unwrap()
}

/// Sink whose lines stay readable after it is moved into a deployment.
#[derive(Clone, Default)]
pub struct SharedSink(std::sync::Arc<Mutex<Vec<String>>>);

impl SharedSink {
  pub fn lines(&self) -> Vec<String> {
    self.0.lock().unwrap().clone()
  }

  pub fn contains(&self, needle: &str) -> bool {
    self.lines().iter().any(|l| l.contains(needle))
  }
}

impl OutputSink for SharedSink {
  fn write_line(&mut self, line: &str) {
    self.0.lock().unwrap().push(line.to_string());
  }
}
