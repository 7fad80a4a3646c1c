//! One conversational turn, end to end.
//!
//! The runner resolves the agent and its stored session, assembles the
//! prompt, invokes the agent CLI through the per-conversation queue, parses
//! the output, recovers the session id through the adapter's listing
//! capability when the run did not announce one, and persists state
//! fire-and-forget. Two prompts for the same conversation are processed in
//! order, and the second sees the session id the first negotiated.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::adapters::{AgentAdapter, AgentRegistry, CommandRequest};
use crate::config::Config;
use crate::context::{ContextSource, MemoryQuery};
use crate::error::RunnerError;
use crate::exec::CommandExecutor;
use crate::prompt::{assemble_prompt, Attachment, PromptParts};
use crate::queue::KeyedQueue;
use crate::session;
use crate::store::{StateSnapshot, StateStore};

/// Environment variable carrying the assembled prompt to the agent command.
pub const PROMPT_ENV_VAR: &str = "COURIER_PROMPT";
/// Shell expression the command line uses in place of the prompt literal.
/// Keeps arbitrarily long/untrusted prompt text out of the argument list.
const PROMPT_EXPRESSION: &str = "\"$COURIER_PROMPT\"";

/// One queued prompt for one conversation.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// Front-end conversation scope (e.g. chat id, or chat+topic).
    pub scope: String,
    /// The user's message.
    pub prompt: String,
    /// Explicit agent override; beats config overrides and the default.
    pub agent: Option<String>,
    /// Model override for this turn.
    pub model: Option<String>,
    /// Reasoning-effort override for this turn.
    pub thinking_level: Option<String>,
    /// Files the front-end already downloaded for this turn.
    pub attachments: Vec<Attachment>,
    /// Pre-formatted auxiliary context, e.g. script output to inject.
    pub script_context: Option<String>,
}

impl TurnRequest {
    pub fn new(scope: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

/// In-memory bridge state; single source of truth while the process runs.
struct RunnerState {
    threads: session::ThreadMap,
    turns: session::TurnCounters,
}

/// Orchestrates turns across all conversations.
pub struct AgentRunner {
    config: Config,
    registry: AgentRegistry,
    executor: Arc<dyn CommandExecutor>,
    context: Arc<dyn ContextSource>,
    store: Arc<dyn StateStore>,
    state: Mutex<RunnerState>,
    queue: KeyedQueue,
}

impl AgentRunner {
    pub fn new(
        config: Config,
        registry: AgentRegistry,
        executor: Arc<dyn CommandExecutor>,
        context: Arc<dyn ContextSource>,
        store: Arc<dyn StateStore>,
        initial_state: StateSnapshot,
    ) -> Self {
        Self {
            config,
            registry,
            executor,
            context,
            store,
            state: Mutex::new(RunnerState {
                threads: initial_state.threads,
                turns: initial_state.turns,
            }),
            queue: KeyedQueue::new(),
        }
    }

    /// Registered agents, for listing surfaces.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Run one turn. Turns for the same conversation+agent serialize in
    /// submission order; other conversations proceed concurrently.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<String, RunnerError> {
        let agent_id = self.effective_agent_id(&request);
        // Fail fast on unknown agents, before claiming a queue slot.
        let adapter = self.registry.get(&agent_id)?;
        let key = session::conversation_key(&request.scope, &agent_id);
        let turn = self.run_turn_serialized(request, agent_id, adapter);
        self.queue.run(&key, turn).await
    }

    /// Forget the stored session (and turn count) for a conversation.
    /// Returns whether anything was stored.
    pub async fn clear_session(
        &self,
        scope: &str,
        agent: Option<&str>,
    ) -> Result<bool, RunnerError> {
        let agent_id = match agent {
            Some(id) => id.to_string(),
            None => self.effective_agent_id(&TurnRequest::new(scope, "")),
        };
        self.registry.get(&agent_id)?;

        let removed = {
            let mut state = self.state.lock().await;
            let removed = session::clear(&mut state.threads, scope, &agent_id);
            state
                .turns
                .remove(&session::conversation_key(scope, &agent_id));
            removed
        };
        self.submit_persistence().await;
        Ok(removed)
    }

    /// Models available for an agent, when the adapter supports listing.
    pub async fn list_models(
        &self,
        agent: Option<&str>,
    ) -> Result<Option<Vec<String>>, RunnerError> {
        let agent_id = agent
            .map(str::to_string)
            .unwrap_or_else(|| self.config.agent.default.clone());
        let adapter = self.registry.get(&agent_id)?;
        let Some(command) = adapter.list_models_command() else {
            return Ok(None);
        };
        let stdout = self
            .executor
            .exec_shell(&command, &[], &self.config.exec.limits())
            .await?;
        Ok(adapter.parse_model_list(&stdout))
    }

    /// Agent id precedence: explicit request override, then per-scope config
    /// override, then the global default.
    fn effective_agent_id(&self, request: &TurnRequest) -> String {
        request
            .agent
            .clone()
            .or_else(|| self.config.agent.overrides.get(&request.scope).cloned())
            .unwrap_or_else(|| self.config.agent.default.clone())
    }

    async fn run_turn_serialized(
        &self,
        request: TurnRequest,
        agent_id: String,
        adapter: Arc<dyn AgentAdapter>,
    ) -> Result<String, RunnerError> {
        // Resolve session and count the turn in one critical section. The
        // queue guarantees nobody else is mid-turn under this key.
        let (key, session_id, turn, migrated) = {
            let mut state = self.state.lock().await;
            let resolution = session::resolve(&mut state.threads, &request.scope, &agent_id);
            let turn = session::bump_turn(&mut state.turns, &resolution.key);
            (
                resolution.key,
                resolution.session_id,
                turn,
                resolution.migrated,
            )
        };
        if migrated {
            tracing::debug!(key = %key, "migrated legacy thread entry");
            self.submit_persistence().await;
        }

        let cadence = self.config.prompt.file_instruction_cadence;
        let file_instructions = session_id.is_none() || turn % cadence == 0;

        let bootstrap = match &session_id {
            // Bootstrap only when starting a fresh agent session.
            None => Some(
                self.context
                    .bootstrap_context(&key)
                    .await
                    .map_err(RunnerError::Context)?,
            ),
            Some(_) => None,
        };
        let memory = self
            .context
            .memory_context(&MemoryQuery {
                query: &request.prompt,
                scope: &request.scope,
                agent_id: &agent_id,
                limit: self.config.prompt.memory_limit,
            })
            .await
            .map_err(RunnerError::Context)?;

        let prompt_text = assemble_prompt(&PromptParts {
            timestamp: self.config.prompt.timestamp.then(Utc::now),
            bootstrap: bootstrap.as_deref(),
            memory: Some(memory.as_str()),
            script_context: request.script_context.as_deref(),
            file_instructions,
            attachments: &request.attachments,
            user_prompt: &request.prompt,
        });

        let model = request
            .model
            .clone()
            .or_else(|| self.config.agent.models.get(&agent_id).cloned())
            .or_else(|| adapter.descriptor().default_model.map(str::to_string));

        let mut command = adapter.build_command(&CommandRequest {
            prompt: &prompt_text,
            prompt_expression: Some(PROMPT_EXPRESSION),
            session_id: session_id.as_deref(),
            model: model.as_deref(),
            thinking_level: request.thinking_level.as_deref(),
        });
        if adapter.descriptor().merge_stderr {
            command.push_str(" 2>&1");
        }
        let env = vec![(PROMPT_ENV_VAR.to_string(), prompt_text.clone())];

        tracing::debug!(agent = %agent_id, key = %key, turn, "dispatching agent command");
        let limits = self.config.exec.limits();
        let stdout = match self.executor.exec_shell(&command, &env, &limits).await {
            Ok(stdout) => stdout,
            Err(error) => {
                // A non-zero exit that still produced structured output (or
                // extractable text) is a soft failure: answer from what we got.
                let salvaged = error.partial_stdout().and_then(|partial| {
                    let parsed = adapter.parse_output(partial);
                    (parsed.saw_structured_output || !parsed.text.is_empty())
                        .then(|| partial.to_string())
                });
                match salvaged {
                    Some(partial) => {
                        tracing::warn!(agent = %agent_id, error = %error,
                            "agent exited non-zero with usable output");
                        partial
                    }
                    None => return Err(error.into()),
                }
            }
        };

        let parsed = adapter.parse_output(&stdout);
        let session_for_persist = match &parsed.session_id {
            Some(id) => Some(id.clone()),
            None => self.recover_session_id(adapter.as_ref()).await,
        };

        if let Some(id) = &session_for_persist {
            let mut state = self.state.lock().await;
            state.threads.insert(key.clone(), id.clone());
        }
        self.submit_persistence().await;

        if !parsed.text.is_empty() {
            Ok(parsed.text)
        } else {
            // Nothing message-like was extracted: raw output beats silence.
            Ok(stdout)
        }
    }

    /// Fallback for agents that did not announce a session id: ask the CLI
    /// for its stored sessions and take the most recent. Failures are logged
    /// and swallowed; the turn still succeeds without a persisted session.
    async fn recover_session_id(&self, adapter: &dyn AgentAdapter) -> Option<String> {
        let command = adapter.list_sessions_command()?;
        match self
            .executor
            .exec_shell(&command, &[], &self.config.exec.limits())
            .await
        {
            Ok(stdout) => adapter.parse_session_list(&stdout),
            Err(error) => {
                tracing::warn!(agent = adapter.descriptor().id, error = %error,
                    "session id recovery failed");
                None
            }
        }
    }

    /// Submit the current state for persistence without blocking the reply.
    /// Persistence failures are logged, never propagated.
    async fn submit_persistence(&self) {
        let snapshot = {
            let state = self.state.lock().await;
            StateSnapshot {
                threads: state.threads.clone(),
                turns: state.turns.clone(),
                ..StateSnapshot::default()
            }
        };
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(error) = store.persist(snapshot).await {
                tracing::warn!(error = %error, "state persistence failed");
            }
        });
    }
}
