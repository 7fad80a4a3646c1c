//! Subprocess execution behind the [`CommandExecutor`] seam.
//!
//! The runner only needs "run this shell command with these env vars, give
//! me stdout, enforce a timeout and an output cap, surface the exit code".
//! [`LocalExecutor`] implements that over `sh -c`; tests substitute scripted
//! executors.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::error::ExecError;

/// Resource limits applied to one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    /// Wall-clock budget; the process is killed when exceeded.
    pub timeout: Duration,
    /// Per-stream output cap in bytes; the process is killed when exceeded.
    pub max_output_bytes: usize,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            max_output_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Capability seam for running agent commands.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` through a shell and return its stdout.
    ///
    /// A non-zero exit fails with [`ExecError::NonZeroExit`], which still
    /// carries whatever partial stdout the process produced.
    async fn exec_shell(
        &self,
        command: &str,
        env: &[(String, String)],
        limits: &ExecLimits,
    ) -> Result<String, ExecError>;
}

/// Executor spawning `sh -c` on the local host.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    /// Shell binary used for `-c` invocation.
    pub shell: String,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self { shell: "sh".into() }
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn exec_shell(
        &self,
        command: &str,
        env: &[(String, String)],
        limits: &ExecLimits,
    ) -> Result<String, ExecError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Caller cancellation aborts in-flight futures; make sure dropped
        // futures do not leak running children.
        cmd.kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ExecError::Spawn(format!("{}: {e}", self.shell)))?;
        let stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::Spawn("stdout pipe unavailable".into()))?;
        let stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::Spawn("stderr pipe unavailable".into()))?;

        let io = async {
            let (stdout, stderr) = tokio::try_join!(
                read_capped(stdout_pipe, limits.max_output_bytes),
                read_capped(stderr_pipe, limits.max_output_bytes),
            )?;
            let status = child.wait().await.map_err(ReadError::Io)?;
            Ok::<_, ReadError>((stdout, stderr, status))
        };

        // Bind before matching: the timeout future borrows `child`, and the
        // kill paths below need it back.
        let timed = timeout(limits.timeout, io).await;
        let outcome = match timed {
            Ok(result) => result,
            Err(_) => {
                reap(&mut child).await;
                return Err(ExecError::Timeout {
                    limit: limits.timeout,
                });
            }
        };

        let (stdout, stderr, status) = match outcome {
            Ok(streams) => streams,
            Err(ReadError::Overflow) => {
                reap(&mut child).await;
                return Err(ExecError::Overflow {
                    limit_bytes: limits.max_output_bytes,
                });
            }
            Err(ReadError::Io(e)) => {
                reap(&mut child).await;
                return Err(ExecError::Spawn(format!("{}: {e}", self.shell)));
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).to_string();
        match status.code() {
            Some(0) => Ok(stdout),
            code => Err(ExecError::NonZeroExit {
                code: code.unwrap_or(-1),
                stdout,
                stderr: String::from_utf8_lossy(&stderr).to_string(),
            }),
        }
    }
}

enum ReadError {
    Io(std::io::Error),
    Overflow,
}

/// Drain a pipe into memory, failing once the cap is crossed. The caller
/// kills the child on failure so the write side cannot block forever.
async fn read_capped(
    mut stream: impl AsyncReadExt + Unpin,
    cap: usize,
) -> Result<Vec<u8>, ReadError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = stream.read(&mut chunk).await.map_err(ReadError::Io)?;
        if n == 0 {
            return Ok(buf);
        }
        if buf.len() + n > cap {
            return Err(ReadError::Overflow);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Kill and reap a child we are abandoning.
async fn reap(child: &mut tokio::process::Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}
