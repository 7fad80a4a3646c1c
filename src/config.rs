//! Runtime configuration.
//!
//! Loaded from TOML with buddy-for-the-chat precedence: an explicit path
//! wins, then `./courier.toml`, then `~/.config/courier/courier.toml`,
//! then built-in defaults. Agent ids named in the file are checked against
//! the registry at load time so a typo fails at startup, not mid-turn.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::AgentRegistry;
use crate::error::ConfigError;
use crate::exec::ExecLimits;

/// Config file name probed in the working directory and the user dir.
const CONFIG_FILE_NAME: &str = "courier.toml";

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub agent: AgentConfig,
    pub prompt: PromptConfig,
    pub exec: ExecConfig,
}

/// Agent selection settings.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Global default agent id.
    pub default: String,
    /// Per-conversation-scope agent overrides.
    pub overrides: BTreeMap<String, String>,
    /// Default model per agent id.
    pub models: BTreeMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default: "codex".into(),
            overrides: BTreeMap::new(),
            models: BTreeMap::new(),
        }
    }
}

/// Prompt assembly settings.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// Re-inject file-handling instructions every Nth turn (and always on
    /// the first turn of a session).
    pub file_instruction_cadence: u64,
    /// Prefix prompts with the wall-clock time.
    pub timestamp: bool,
    /// Maximum memory entries requested per retrieval.
    pub memory_limit: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            file_instruction_cadence: 10,
            timestamp: true,
            memory_limit: 6,
        }
    }
}

/// Subprocess execution settings.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Wall-clock budget per agent invocation.
    pub timeout: Duration,
    /// Output cap per stream, in bytes.
    pub max_output_bytes: usize,
    /// Shell used for `-c` invocation.
    pub shell: String,
}

impl Default for ExecConfig {
    fn default() -> Self {
        let defaults = ExecLimits::default();
        Self {
            timeout: defaults.timeout,
            max_output_bytes: defaults.max_output_bytes,
            shell: "sh".into(),
        }
    }
}

impl ExecConfig {
    /// Limits handed to the executor.
    pub fn limits(&self) -> ExecLimits {
        ExecLimits {
            timeout: self.timeout,
            max_output_bytes: self.max_output_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// File shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    agent: AgentSection,
    #[serde(default)]
    prompt: PromptSection,
    #[serde(default)]
    exec: ExecSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentSection {
    default: Option<String>,
    #[serde(default)]
    overrides: BTreeMap<String, String>,
    #[serde(default)]
    models: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PromptSection {
    file_instruction_cadence: Option<u64>,
    timestamp: Option<bool>,
    memory_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecSection {
    timeout_secs: Option<u64>,
    max_output_mb: Option<usize>,
    shell: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load configuration with standard precedence and validate agent ids
/// against the registry.
pub fn load_config(
    explicit: Option<&Path>,
    registry: &AgentRegistry,
) -> Result<Config, ConfigError> {
    let raw = match locate(explicit)? {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            toml::from_str::<ConfigFile>(&text)?
        }
        None => ConfigFile::default(),
    };
    let config = resolve(raw)?;
    validate_agents(&config, registry)?;
    Ok(config)
}

fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::Invalid(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = Path::new(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(Some(local.to_path_buf()));
    }

    if let Some(user_dir) = dirs::config_dir() {
        let user = user_dir.join("courier").join(CONFIG_FILE_NAME);
        if user.exists() {
            return Ok(Some(user));
        }
    }
    Ok(None)
}

fn resolve(raw: ConfigFile) -> Result<Config, ConfigError> {
    let defaults = Config::default();

    let cadence = raw
        .prompt
        .file_instruction_cadence
        .unwrap_or(defaults.prompt.file_instruction_cadence);
    if cadence == 0 {
        return Err(ConfigError::Invalid(
            "prompt.file_instruction_cadence must be at least 1".into(),
        ));
    }

    Ok(Config {
        agent: AgentConfig {
            default: raw.agent.default.unwrap_or(defaults.agent.default),
            overrides: raw.agent.overrides,
            models: raw.agent.models,
        },
        prompt: PromptConfig {
            file_instruction_cadence: cadence,
            timestamp: raw.prompt.timestamp.unwrap_or(defaults.prompt.timestamp),
            memory_limit: raw
                .prompt
                .memory_limit
                .unwrap_or(defaults.prompt.memory_limit),
        },
        exec: ExecConfig {
            timeout: raw
                .exec
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.exec.timeout),
            max_output_bytes: raw
                .exec
                .max_output_mb
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(defaults.exec.max_output_bytes),
            shell: raw.exec.shell.unwrap_or(defaults.exec.shell),
        },
    })
}

fn validate_agents(config: &Config, registry: &AgentRegistry) -> Result<(), ConfigError> {
    let mut named = vec![("agent.default", config.agent.default.as_str())];
    for (scope, agent_id) in &config.agent.overrides {
        named.push(("agent.overrides", agent_id.as_str()));
        if scope.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "agent.overrides scope cannot be empty".into(),
            ));
        }
    }
    for agent_id in config.agent.models.keys() {
        named.push(("agent.models", agent_id.as_str()));
    }

    for (section, agent_id) in named {
        if !registry.contains(agent_id) {
            return Err(ConfigError::Invalid(format!(
                "{section} names unknown agent: {agent_id}"
            )));
        }
    }
    Ok(())
}
