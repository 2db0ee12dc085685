//! External process execution.
//!
//! [`ProcessRunner`] has two modes: [`run`](ProcessRunner::run) waits for a
//! tool and yields only its exit status, silencing output unless debug mode
//! echoes everything through; [`run_captured`](ProcessRunner::run_captured)
//! collects stdout/stderr bytes into a [`RunResult`] for the oracle and the
//! phase classifier. Invocation blocks the calling thread until the tool
//! exits; timeout supervision, if any, is the caller's harness's job.

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::errors::{Error, Result};

/// A fully constructed external-tool command line. Built only by the typed
/// per-tool adapters in [`crate::pipeline`]; stage logic never assembles raw
/// argument vectors inline.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
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

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Short name of the tool, for error messages.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, "  {}", arg)?;
        }
        Ok(())
    }
}

/// Outcome of one captured invocation. Transient: produced per invocation
/// and discarded after the verdict or classification.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Set by external supervisors only; the runner itself never times out.
    pub timed_out: bool,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Blocking executor for external tools.
#[derive(Debug, Clone, Copy)]
pub struct ProcessRunner {
    debug: bool,
}

impl ProcessRunner {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Run to completion and return the exit code. Output is discarded
    /// unless debug mode passes it through to the console.
    pub fn run(&self, tool: &ToolCommand) -> Result<i32> {
        let mut cmd = tool.command();
        if self.debug {
            println!("> {}", tool);
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let status = cmd.status().map_err(|source| Error::Spawn {
            tool: tool.tool_name(),
            source,
        })?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Run to completion capturing stdout and stderr.
    pub fn run_captured(&self, tool: &ToolCommand) -> Result<RunResult> {
        if self.debug {
            println!("> {}", tool);
        }
        let output = tool
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| Error::Spawn {
                tool: tool.tool_name(),
                source,
            })?;
        Ok(RunResult {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
            timed_out: false,
        })
    }
}
