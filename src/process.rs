//! Subprocess execution
//!
//! Every external tool (carthage, swift) is started through the
//! [`ProcessExecutor`] trait so the cache engine and command runner can be
//! exercised with a fake in tests.

use crate::error::{StepError, StepResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Max number of output lines kept in command error messages.
const ERROR_TAIL_LINES: usize = 50;

/// A fully assembled subprocess invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Executable name or path
    pub program: String,

    /// Arguments, passed verbatim
    pub args: Vec<String>,

    /// Extra environment entries for the child only
    pub envs: Vec<(String, String)>,

    /// Echo output lines to stdout while the process runs
    pub echo: bool,
}

impl Invocation {
    /// Create an invocation with no extra environment
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            envs: Vec::new(),
            echo: false,
        }
    }

    /// Add an environment entry
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Stream output lines while running
    pub fn echoed(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Shell-quoted command line for logs (environment entries are never included)
    pub fn command_line(&self) -> String {
        let parts: Vec<&str> = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect();
        shlex::try_join(parts.iter().copied()).unwrap_or_else(|_| parts.join(" "))
    }
}

/// Result of a finished subprocess
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,

    /// Combined stdout and stderr, in arrival order
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into a `CommandExecution` error
    pub fn into_result(self, invocation: &Invocation) -> StepResult<String> {
        if self.success() {
            Ok(self.output)
        } else {
            Err(StepError::CommandExecution {
                command: invocation.command_line(),
                code: self.code,
                output: error_tail(&self.output),
            })
        }
    }
}

/// Keep the last `ERROR_TAIL_LINES` lines of output for diagnostics.
pub(crate) fn error_tail(output: &str) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Narrow interface for running external tools
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run to completion and return exit status plus combined output.
    ///
    /// A non-zero exit is not an error at this layer; only a failure to
    /// start the process is.
    async fn execute(&self, invocation: &Invocation) -> StepResult<ProcessOutput>;
}

/// Executor backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessExecutor for SystemExecutor {
    async fn execute(&self, invocation: &Invocation) -> StepResult<ProcessOutput> {
        debug!("Executing: {}", invocation.command_line());

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| StepError::command_failed(invocation.command_line(), e))?;

        let echo = invocation.echo;
        let lines = stream_child_output(&mut child, &|line: String| {
            if echo {
                println!("{}", line);
            }
        })
        .await?;

        let status = child
            .wait()
            .await
            .map_err(|e| StepError::command_failed(invocation.command_line(), e))?;

        Ok(ProcessOutput {
            code: status.code(),
            output: lines.join("\n"),
        })
    }
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Lines are split on raw `\n` bytes and decoded lossily, so invalid UTF-8
/// never stops the pipes from draining. Returns all collected lines in the
/// order they arrived.
async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> StepResult<Vec<String>> {
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(StepError::Internal(
            "child process output was not piped".to_string(),
        ));
    };

    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_reader = BufReader::new(stderr);
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();

    let mut all_output = Vec::new();
    let mut stdout_done = false;
    let mut stderr_done = false;

    // read_until keeps partial bytes in the buffer when the other branch wins
    while !stdout_done || !stderr_done {
        tokio::select! {
            read = stdout_reader.read_until(b'\n', &mut stdout_buf), if !stdout_done => {
                match read.map_err(|e| StepError::io("reading child stdout", e))? {
                    0 => stdout_done = true,
                    _ => {
                        let line = take_line(&mut stdout_buf);
                        on_output(line.clone());
                        all_output.push(line);
                    }
                }
            }
            read = stderr_reader.read_until(b'\n', &mut stderr_buf), if !stderr_done => {
                match read.map_err(|e| StepError::io("reading child stderr", e))? {
                    0 => stderr_done = true,
                    _ => {
                        let line = take_line(&mut stderr_buf);
                        on_output(line.clone());
                        all_output.push(line);
                    }
                }
            }
        }
    }

    Ok(all_output)
}

/// Decode and clear one buffered line, dropping its terminator
fn take_line(buf: &mut Vec<u8>) -> String {
    let mut end = buf.len();
    if buf[..end].ends_with(b"\n") {
        end -= 1;
    }
    if buf[..end].ends_with(b"\r") {
        end -= 1;
    }
    let line = String::from_utf8_lossy(&buf[..end]).into_owned();
    buf.clear();
    line
}
