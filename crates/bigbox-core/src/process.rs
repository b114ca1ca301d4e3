//! External tool execution with streamed output.
//!
//! Every line a tool writes is forwarded to the [`Notifier`] as it arrives.
//! Standard output and standard error are drained by two independent tasks so
//! a tool that fills one pipe while nobody reads it cannot stall; the runner
//! returns only after both streams hit end-of-file and the process exited.
//!
//! On Unix each tool leads its own process group, so a timeout kills the
//! whole tree and no orphan keeps writing into the notifier.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::notify::{Notifier, Stream};

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdin_line: Option<String>,
}

impl Invocation {
    /// Program followed by its arguments.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            stdin_line: None,
        }
    }

    /// Run in `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Line written to standard input right after launch.
    pub fn stdin_line(mut self, line: Option<String>) -> Self {
        self.stdin_line = line;
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn stdin(&self) -> Option<&str> {
        self.stdin_line.as_deref()
    }

    /// Program name, empty for an empty command line.
    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    /// Space-joined command line, as shown to the user.
    pub fn command_line(&self) -> String {
        self.args.join(" ")
    }
}

/// Outcome of a finished tool.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout_lines: usize,
    pub stderr_lines: usize,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Runs external tools and streams their output to a notifier.
#[derive(Clone)]
pub struct ProcessRunner {
    notifier: Arc<dyn Notifier>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            timeout: None,
        }
    }

    /// Kill tools still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run `invocation` to completion.
    ///
    /// The exit status is returned, not judged; callers decide what a failed
    /// tool means for them.
    pub async fn run(&self, invocation: &Invocation) -> Result<ProcessOutput> {
        let tool = invocation.program().to_string();
        if tool.is_empty() {
            return Err(Error::ToolExec {
                tool,
                message: "empty command line".to_string(),
            });
        }
        let program = resolve_program(invocation)?;

        let mut command = Command::new(&program);
        command
            .args(&invocation.args[1..])
            .stdin(if invocation.stdin_line.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        tracing::debug!("Running: {}", invocation.command_line());
        let mut child = command.spawn().map_err(|e| Error::ToolExec {
            tool: tool.clone(),
            message: e.to_string(),
        })?;

        if let Some(line) = &invocation.stdin_line {
            if let Some(mut stdin) = child.stdin.take() {
                // Dropping stdin afterwards closes the pipe.
                if let Err(e) = stdin.write_all(format!("{}\n", line).as_bytes()).await {
                    tracing::warn!("Failed to write stdin of {}: {}", tool, e);
                }
            }
        }

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(Error::ToolExec {
                tool,
                message: "output pipes unavailable".to_string(),
            });
        };
        let pid = child.id();
        let mut stdout_task =
            tokio::spawn(forward_lines(stdout, Stream::Stdout, self.notifier.clone()));
        let mut stderr_task =
            tokio::spawn(forward_lines(stderr, Stream::Stderr, self.notifier.clone()));

        let finished = match self.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(
                    limit,
                    drain(&mut child, &mut stdout_task, &mut stderr_task),
                )
                .await;
                match waited {
                    Ok(finished) => finished,
                    Err(_) => {
                        kill_tree(&tool, pid, &mut child).await;
                        // Nothing may reach the notifier once the timeout is reported.
                        stdout_task.abort();
                        stderr_task.abort();
                        let _ = tokio::join!(stdout_task, stderr_task);
                        self.notifier.logline(
                            Stream::Stderr,
                            &format!("{} timed out after {:?} and was killed", tool, limit),
                        );
                        return Err(Error::Timeout { tool, after: limit });
                    }
                }
            }
            None => drain(&mut child, &mut stdout_task, &mut stderr_task).await,
        };

        let output = finished.map_err(|message| Error::ToolExec { tool: tool.clone(), message })?;
        tracing::debug!("{} exited with {}", tool, output.status);
        Ok(output)
    }
}

/// Locate the program, relative paths resolving against the tool's own
/// working directory.
fn resolve_program(invocation: &Invocation) -> Result<PathBuf> {
    let tool = invocation.program();
    let cwd = match &invocation.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| Error::ToolExec {
            tool: tool.to_string(),
            message: e.to_string(),
        })?,
    };
    which::which_in(tool, std::env::var_os("PATH"), cwd).map_err(|_| Error::ToolNotFound {
        tool: tool.to_string(),
    })
}

/// Kill the tool's process group, then the tool itself.
async fn kill_tree(tool: &str, pid: Option<u32>, child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // SIGKILL the whole group led by the tool
            let rc = unsafe { libc::kill(-(pid as libc::pid_t), libc::SIGKILL) };
            if rc != 0 {
                tracing::warn!(
                    "Failed to kill process group of {}: {}",
                    tool,
                    std::io::Error::last_os_error()
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill {}: {}", tool, e);
    }
}

/// Join both readers, then reap the process.
async fn drain(
    child: &mut Child,
    stdout_task: &mut JoinHandle<usize>,
    stderr_task: &mut JoinHandle<usize>,
) -> std::result::Result<ProcessOutput, String> {
    let (stdout_lines, stderr_lines) = tokio::join!(stdout_task, stderr_task);
    let status = child.wait().await.map_err(|e| e.to_string())?;

    Ok(ProcessOutput {
        status,
        stdout_lines: stdout_lines.map_err(|e| e.to_string())?,
        stderr_lines: stderr_lines.map_err(|e| e.to_string())?,
    })
}

/// Forward every line of `reader` until end-of-file. Returns the line count.
async fn forward_lines<R>(reader: R, stream: Stream, notifier: Arc<dyn Notifier>) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                notifier.logline(stream, line.trim_end_matches(['\n', '\r']));
                count += 1;
            }
            Err(e) => {
                tracing::warn!("Stopped reading {:?}: {}", stream, e);
                break;
            }
        }
    }
    count
}
