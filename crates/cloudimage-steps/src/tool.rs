//! External tool runner
//!
//! Runs a command line tool as a child process, feeding every line it
//! writes on stdout and stderr to a handler as soon as it appears. The two
//! streams are drained concurrently; lines keep their order within a stream.

use cloudimage_core::{Result, StepError};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Stream a line of tool output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// A located executable plus the environment it runs with
#[derive(Debug, Clone)]
pub struct ToolRunner {
    name: String,
    program: PathBuf,
    leading_args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl ToolRunner {
    /// Use `program` as is, without checking that it exists.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self {
            name,
            program,
            leading_args: Vec::new(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    /// Resolve an executable once, up front.
    ///
    /// A bare name is looked up on PATH with `which`; anything containing a
    /// path separator must point at an existing file.
    pub async fn locate(program: impl AsRef<Path>) -> Result<Self> {
        let program = program.as_ref();
        let requested = program.display().to_string();

        if program.components().count() > 1 {
            if tokio::fs::try_exists(program).await? {
                return Ok(Self::new(program));
            }
            return Err(StepError::ToolNotFound(requested));
        }

        let which = Command::new("which")
            .arg(program)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await?;

        if !which.status.success() {
            return Err(StepError::ToolNotFound(requested));
        }

        let resolved = String::from_utf8_lossy(&which.stdout).trim().to_string();
        if resolved.is_empty() {
            return Err(StepError::ToolNotFound(requested));
        }

        tracing::debug!("Using {} from '{}'", requested, resolved);
        let mut runner = Self::new(resolved);
        runner.name = requested;
        Ok(runner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Argument passed before the ones given to [`run`](Self::run).
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Run the tool to completion.
    ///
    /// The child is killed as soon as `cancel` fires. A non-zero exit status
    /// is reported as [`StepError::ProcessFailed`].
    pub async fn run<S, F>(&self, args: &[S], cancel: &CancellationToken, mut on_line: F) -> Result<()>
    where
        S: AsRef<OsStr>,
        F: FnMut(OutputStream, &str) + Send,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args);
        cmd.args(args);
        cmd.envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(
            "Running: {} {}",
            self.program.display(),
            args.iter()
                .map(|a| a.as_ref().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut child = cmd.spawn().map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => StepError::ToolNotFound(self.name.clone()),
            _ => StepError::Io(err),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StepError::Io(std::io::Error::other("stdout was not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StepError::Io(std::io::Error::other("stderr was not captured")))?;

        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Killing {} (cancelled)", self.name);
                    child.kill().await?;
                    return Err(StepError::Cancelled);
                }
                line = stdout.next_line(), if stdout_open => match line? {
                    Some(line) => on_line(OutputStream::Stdout, &line),
                    None => stdout_open = false,
                },
                line = stderr.next_line(), if stderr_open => match line? {
                    Some(line) => on_line(OutputStream::Stderr, &line),
                    None => stderr_open = false,
                },
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                child.kill().await?;
                return Err(StepError::Cancelled);
            }
            status = child.wait() => status?,
        };

        if !status.success() {
            return Err(StepError::ProcessFailed {
                tool: self.name.clone(),
                code: status.code(),
            });
        }
        Ok(())
    }
}
