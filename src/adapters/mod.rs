//! Agent adapters: one module per supported CLI variant.
//!
//! Every agent speaks its own invocation syntax and output format. An adapter
//! normalizes both behind [`AgentAdapter`]: two mandatory operations
//! (`build_command`, `parse_output`) plus optional capability slots for
//! session and model listing. The [`AgentRegistry`] maps agent ids to their
//! adapter and is fixed at construction time.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::RunnerError;

mod claude;
mod codex;
mod gemini;
mod opencode;

pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub use gemini::GeminiAdapter;
pub use opencode::OpencodeAdapter;

// ---------------------------------------------------------------------------
// Shared adapter types
// ---------------------------------------------------------------------------

/// Immutable facts about one supported agent CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentDescriptor {
    /// Stable registry id (`codex`, `claude`, ...).
    pub id: &'static str,
    /// Human-facing label shown in listings.
    pub label: &'static str,
    /// The CLI misbehaves without a pseudo-terminal. Advisory for embedders;
    /// the bundled local executor does not allocate ptys.
    pub needs_pty: bool,
    /// The CLI logs to stderr; fold it into stdout before parsing.
    pub merge_stderr: bool,
    /// Model used when neither the request nor config names one.
    pub default_model: Option<&'static str>,
}

/// One logical invocation, before it becomes an agent-specific command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRequest<'a> {
    /// The fully assembled prompt text.
    pub prompt: &'a str,
    /// Shell expression substituted verbatim for the prompt literal, e.g.
    /// `"$COURIER_PROMPT"`. Lets the prompt travel through the environment
    /// instead of the argument list, which has OS length limits.
    pub prompt_expression: Option<&'a str>,
    /// Agent-native session id to resume, when one is known.
    pub session_id: Option<&'a str>,
    /// Model override.
    pub model: Option<&'a str>,
    /// Reasoning-effort / thinking level, for agents that support it.
    pub thinking_level: Option<&'a str>,
}

/// Normalized result of one agent invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    /// Extracted reply text; empty when nothing message-like was found.
    pub text: String,
    /// Session/thread id the agent announced, if any.
    pub session_id: Option<String>,
    /// True iff at least one line/document parsed as this variant's
    /// structured format. Distinguishes "agent produced a real record" from
    /// pure noise when deciding whether a non-zero exit is still usable.
    pub saw_structured_output: bool,
}

// ---------------------------------------------------------------------------
// AgentAdapter
// ---------------------------------------------------------------------------

/// Protocol adapter for one agent CLI variant.
///
/// `build_command` and `parse_output` are mandatory; the listing operations
/// are optional capabilities and callers must check for `Some` before use.
pub trait AgentAdapter: Send + Sync + std::fmt::Debug {
    /// Static facts about this agent.
    fn descriptor(&self) -> &AgentDescriptor;

    /// Compose the shell command line for one invocation.
    ///
    /// Every value that originates from user or stored data (prompt, session
    /// id, model) must pass through [`shell_quote`]. A `prompt_expression`
    /// is used verbatim in place of the quoted prompt literal.
    fn build_command(&self, req: &CommandRequest<'_>) -> String;

    /// Extract the reply and session id from raw process stdout.
    ///
    /// Never fails: malformed content degrades to best-effort extraction.
    fn parse_output(&self, raw: &str) -> ParsedOutput;

    /// Command that lists this agent's stored sessions, newest first.
    fn list_sessions_command(&self) -> Option<String> {
        None
    }

    /// Recover the most recent session id from `list_sessions_command` output.
    fn parse_session_list(&self, _raw: &str) -> Option<String> {
        None
    }

    /// Command that lists the models this agent can run.
    fn list_models_command(&self) -> Option<String> {
        None
    }

    /// Parse `list_models_command` output into model names.
    fn parse_model_list(&self, _raw: &str) -> Option<Vec<String>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Fixed mapping from agent id to adapter implementation.
pub struct AgentRegistry {
    agents: BTreeMap<&'static str, Arc<dyn AgentAdapter>>,
}

impl AgentRegistry {
    /// Registry with all built-in adapters.
    pub fn builtin() -> Self {
        let adapters: [Arc<dyn AgentAdapter>; 4] = [
            Arc::new(CodexAdapter),
            Arc::new(ClaudeAdapter),
            Arc::new(GeminiAdapter),
            Arc::new(OpencodeAdapter),
        ];
        let mut agents = BTreeMap::new();
        for adapter in adapters {
            agents.insert(adapter.descriptor().id, adapter);
        }
        Self { agents }
    }

    /// Look up an adapter, failing fast on ids outside the registry.
    pub fn get(&self, id: &str) -> Result<Arc<dyn AgentAdapter>, RunnerError> {
        self.agents
            .get(id)
            .cloned()
            .ok_or_else(|| RunnerError::UnknownAgent(id.to_string()))
    }

    /// True when `id` names a registered agent.
    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    /// All registered descriptors, ordered by id.
    pub fn descriptors(&self) -> Vec<&AgentDescriptor> {
        self.agents.values().map(|a| a.descriptor()).collect()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Shell-safe single-quote escaping.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".into()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

/// Strip trailing quote/escape artifacts observed on session ids emitted by
/// some CLIs (a lone `\` or `"` glued to the id).
pub(crate) fn sanitize_session_id(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_end_matches(['\\', '"']);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// The prompt operand for a command line: the expression verbatim when one
/// is supplied, otherwise the quoted literal.
pub(crate) fn prompt_operand(req: &CommandRequest<'_>) -> String {
    match req.prompt_expression {
        Some(expr) => expr.to_string(),
        None => shell_quote(req.prompt),
    }
}
