//! Unified error types for the bridge.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ExecError
// ---------------------------------------------------------------------------

/// Errors from subprocess execution.
///
/// `NonZeroExit` deliberately carries the partial stdout/stderr the process
/// produced before failing: the runner inspects it to decide whether a failed
/// invocation still yielded a usable reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The process could not be spawned or its pipes could not be read.
    Spawn(String),
    /// The process exceeded the allotted wall-clock time and was killed.
    Timeout { limit: Duration },
    /// The process produced more output than the configured cap and was killed.
    Overflow { limit_bytes: usize },
    /// The process ran to completion with a non-zero exit code.
    NonZeroExit {
        code: i32,
        stdout: String,
        stderr: String,
    },
}

impl ExecError {
    /// Partial stdout captured before the failure, when any exists.
    pub fn partial_stdout(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stdout, .. } if !stdout.is_empty() => Some(stdout),
            _ => None,
        }
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(msg) => write!(f, "spawn failed: {msg}"),
            Self::Timeout { limit } => {
                write!(f, "timed out after {}", format_duration(*limit))
            }
            Self::Overflow { limit_bytes } => {
                write!(f, "output exceeded {limit_bytes} byte cap")
            }
            Self::NonZeroExit { code, stderr, .. } => {
                let detail = stderr.trim();
                if detail.is_empty() {
                    write!(f, "exited with code {code}")
                } else {
                    write!(f, "exited with code {code}: {detail}")
                }
            }
        }
    }
}

impl std::error::Error for ExecError {}

/// Human-oriented duration formatting used in error messages.
pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs == 0 {
        return format!("{millis}ms");
    }
    if millis == 0 {
        if secs % 3600 == 0 {
            return format!("{}h", secs / 3600);
        }
        if secs % 60 == 0 {
            return format!("{}m", secs / 60);
        }
        return format!("{secs}s");
    }
    format!("{secs}.{millis:03}s")
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// RunnerError — top-level
// ---------------------------------------------------------------------------

/// Top-level error type for a single conversational turn.
///
/// A failed turn produces exactly one of these for its own caller; queued
/// work for the same or other conversations is never affected.
#[derive(Debug)]
pub enum RunnerError {
    /// The requested agent id is not in the registry. Not retried.
    UnknownAgent(String),
    /// The subprocess failed without producing usable output. Not retried.
    Exec(ExecError),
    /// A context collaborator (bootstrap/memory) failed hard.
    Context(String),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAgent(id) => write!(f, "unknown agent: {id}"),
            Self::Exec(e) => write!(f, "agent execution failed: {e}"),
            Self::Context(msg) => write!(f, "context retrieval failed: {msg}"),
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<ExecError> for RunnerError {
    fn from(e: ExecError) -> Self {
        Self::Exec(e)
    }
}
