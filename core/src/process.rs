//! Spawning external tools and reading their stdout line by line.

use crate::ReconError;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// Program plus arguments for one external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Pass the tool's stderr through instead of discarding it.
    pub inherit_stderr: bool,
}

impl ToolCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ToolCommand { program: program.into(), args: args.into_iter().map(Into::into).collect(), inherit_stderr: false }
    }

    pub fn arg(mut self, a: impl Into<String>) -> Self {
        self.args.push(a.into());
        self
    }

    pub fn extend_args<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(extra.into_iter().map(Into::into));
        self
    }

    pub fn inherit_stderr(mut self, yes: bool) -> Self {
        self.inherit_stderr = yes;
        self
    }

    /// Short name for logs: the file name of `program`.
    pub fn name(&self) -> &str {
        self.program.rsplit(['/', '\\']).next().unwrap_or(&self.program)
    }

    /// stdin closed, stdout piped, killed if the handle is dropped.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if self.inherit_stderr { Stdio::inherit() } else { Stdio::null() })
            .kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> ReconError {
        ReconError::Spawn { tool: self.name().to_string(), source }
    }
}

/// Lazily read stdout lines of one running process.
///
/// A non-zero exit is logged, never returned: a failing tool only means fewer lines.
#[derive(Debug)]
pub struct LineSource {
    name: String,
    child: Child,
    reader: BufReader<ChildStdout>,
}

impl LineSource {
    pub fn spawn(tool: &ToolCommand) -> Result<Self, ReconError> {
        let child = tool.to_command().spawn().map_err(|e| tool.spawn_error(e))?;
        debug!(tool = tool.name(), args = ?tool.args, "spawned");
        Self::from_child(tool.name(), child)
    }

    /// Spawn with a writable stdin; the caller owns the returned handle and closes it by dropping.
    pub fn spawn_with_stdin(tool: &ToolCommand) -> Result<(ChildStdin, Self), ReconError> {
        let mut cmd = tool.to_command();
        cmd.stdin(Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| tool.spawn_error(e))?;
        debug!(tool = tool.name(), args = ?tool.args, "spawned with stdin");
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReconError::Pipe { tool: tool.name().to_string(), stream: "stdin" })?;
        Ok((stdin, Self::from_child(tool.name(), child)?))
    }

    fn from_child(name: &str, mut child: Child) -> Result<Self, ReconError> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReconError::Pipe { tool: name.to_string(), stream: "stdout" })?;
        Ok(LineSource { name: name.to_string(), child, reader: BufReader::new(stdout) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next line without its terminator, or `None` at end of stream.
    /// Read errors end the stream.
    pub async fn next_line(&mut self) -> Option<Vec<u8>> {
        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf).await {
            Ok(0) => None,
            Ok(_) => {
                if buf.last() == Some(&b'\n') { buf.pop(); }
                if buf.last() == Some(&b'\r') { buf.pop(); }
                Some(buf)
            }
            Err(e) => {
                warn!(tool = %self.name, error = %e, "read failed; treating as end of output");
                None
            }
        }
    }

    /// Reap the process after its output is drained.
    pub async fn finish(mut self) -> Option<ExitStatus> {
        match self.child.wait().await {
            Ok(status) => {
                if status.success() {
                    debug!(tool = %self.name, "exited");
                } else {
                    warn!(tool = %self.name, %status, "exited with failure");
                }
                Some(status)
            }
            Err(e) => {
                warn!(tool = %self.name, error = %e, "wait failed");
                None
            }
        }
    }

    pub async fn terminate(mut self) {
        if let Err(e) = self.child.kill().await {
            debug!(tool = %self.name, error = %e, "kill failed");
        } else {
            debug!(tool = %self.name, "killed");
        }
    }
}
