//! External command execution with an exit-code allow-list and retries.
//!
//! Each attempt re-runs the command from scratch; output from failed attempts
//! is discarded. Every attempt is timed into the command's counter bucket.

use crate::counters::RunCounters;
use log::{debug, warn};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A command to run, identical on every attempt.
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
    /// Exit codes that count as success; some tools exit non-zero when they find issues.
    pub allowed_exit_codes: Vec<i32>,
    /// Counter bucket for timing, e.g. `git` or `lint`.
    pub bucket: String,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            allowed_exit_codes: vec![0],
            bucket: bucket.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn allow_exit_codes(mut self, codes: &[i32]) -> Self {
        self.allowed_exit_codes = codes.to_vec();
        self
    }

    fn display(&self) -> String {
        let mut s = self.program.clone();
        for a in &self.args {
            s.push(' ');
            s.push_str(a);
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{command}` failed after {attempts} attempt(s): {last}")]
/// The retry budget ran out without an allow-listed exit code.
pub struct ProcessFailure {
    pub command: String,
    pub attempts: u32,
    pub last: String,
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Extra attempts after the first.
    pub retries: u32,
    /// Sleep before retry N is `backoff * N`.
    pub backoff: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl ProcessRunner {
    pub fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    /// Run `spec` until it exits with an allow-listed code or the budget is spent.
    pub fn run(
        &self,
        counters: &mut RunCounters,
        spec: &CommandSpec,
    ) -> Result<CommandOutput, ProcessFailure> {
        let attempts = self.retries + 1;
        let mut last = String::from("not attempted");
        for attempt in 1..=attempts {
            if attempt > 1 {
                counters.bump("process.retries");
                warn!(
                    "retrying `{}` (attempt {}/{}): {}",
                    spec.display(),
                    attempt,
                    attempts,
                    last
                );
                std::thread::sleep(self.backoff * (attempt - 1));
            }
            debug!("exec `{}` (attempt {})", spec.display(), attempt);
            let started = Instant::now();
            let result = execute(spec);
            counters.record_duration(&spec.bucket, started.elapsed());
            match result {
                Ok(out) if spec.allowed_exit_codes.contains(&out.exit_code) => return Ok(out),
                Ok(out) => {
                    last = format!("exit code {}: {}", out.exit_code, out.stderr.trim());
                }
                Err(e) => {
                    last = format!("spawn error: {}", e);
                }
            }
        }
        counters.bump("process.failures");
        Err(ProcessFailure {
            command: spec.display(),
            attempts,
            last,
        })
    }
}

fn execute(spec: &CommandSpec) -> std::io::Result<CommandOutput> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    // Keep git from honoring an inherited repository over the explicit -C path.
    if spec.program == "git" {
        cmd.env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
    }
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }
    cmd.stdin(if spec.stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    let mut child = cmd.spawn()?;
    // Feed stdin from a helper thread so a chatty child cannot fill stdout and stall.
    let feeder = match (spec.stdin.clone(), child.stdin.take()) {
        (Some(input), Some(mut pipe)) => Some(std::thread::spawn(move || {
            // A tool may exit without reading stdin; a broken pipe is not our failure.
            let _ = pipe.write_all(input.as_bytes());
        })),
        _ => None,
    };
    let output = child.wait_with_output()?;
    if let Some(handle) = feeder {
        let _ = handle.join();
    }
    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        // Killed by a signal: no code, never allow-listed.
        exit_code: output.status.code().unwrap_or(-1),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", "test").args(["-c", script])
    }

    fn runner() -> ProcessRunner {
        ProcessRunner::new(2, Duration::ZERO)
    }

    #[test]
    fn test_allow_listed_nonzero_is_success() {
        let mut counters = RunCounters::new();
        let spec = sh("echo found; exit 1").allow_exit_codes(&[0, 1, 2]);
        let out = runner().run(&mut counters, &spec).unwrap();
        assert_eq!(out.exit_code, 1);
        assert_eq!(out.stdout.trim(), "found");
        assert_eq!(counters.get("process.retries"), 0);
    }

    #[test]
    fn test_exhausted_retries_fail() {
        let mut counters = RunCounters::new();
        let spec = sh("echo nope >&2; exit 3").allow_exit_codes(&[0, 1, 2]);
        let err = runner().run(&mut counters, &spec).unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(err.last.contains("exit code 3"));
        assert!(err.last.contains("nope"));
        assert_eq!(counters.get("process.retries"), 2);
        assert_eq!(counters.get("process.failures"), 1);
        // Failed attempts are timed too.
        assert!(counters.dump().contains_key("time.test_ms"));
    }

    #[test]
    fn test_retry_recovers_from_transient_failure() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("seen");
        let script = format!(
            "if [ -f '{0}' ]; then echo ok; else touch '{0}'; exit 7; fi",
            marker.display()
        );
        let mut counters = RunCounters::new();
        let out = runner().run(&mut counters, &sh(&script)).unwrap();
        assert_eq!(out.stdout.trim(), "ok");
        assert_eq!(counters.get("process.retries"), 1);
    }

    #[test]
    fn test_spawn_error_is_a_failure() {
        let mut counters = RunCounters::new();
        let spec = CommandSpec::new("prlint-no-such-binary-xyz", "test");
        let err = ProcessRunner::new(0, Duration::ZERO)
            .run(&mut counters, &spec)
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(err.last.starts_with("spawn error"));
    }

    #[test]
    fn test_stdin_and_timing_bucket() {
        let mut counters = RunCounters::new();
        let spec = sh("cat").stdin("hello");
        let out = runner().run(&mut counters, &spec).unwrap();
        assert_eq!(out.stdout, "hello");
        assert!(counters.dump().contains_key("time.test_ms"));
    }
}
