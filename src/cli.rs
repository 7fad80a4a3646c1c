//! CLI argument parsing via clap.

use clap::Parser;

/// Bridge a prompt to a command-line AI agent, resuming the conversation's
/// stored session when one exists.
#[derive(Debug, Parser)]
#[command(name = "courier", version)]
pub struct Args {
    /// Prompt to send. Required unless a management flag is used.
    pub prompt: Option<String>,

    /// Agent to talk to (default: config `agent.default`).
    #[arg(short = 'a', long = "agent")]
    pub agent: Option<String>,

    /// Conversation scope identifying the thread.
    #[arg(short = 's', long = "scope", default_value = "cli")]
    pub scope: String,

    /// Override model name.
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Reasoning-effort level, for agents that support one.
    #[arg(long = "thinking")]
    pub thinking: Option<String>,

    /// Path to config file (default: ./courier.toml or
    /// ~/.config/courier/courier.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Attach an already-downloaded image file (repeatable).
    #[arg(long = "image", value_name = "PATH")]
    pub images: Vec<String>,

    /// Attach an already-downloaded document file (repeatable).
    #[arg(long = "document", value_name = "PATH")]
    pub documents: Vec<String>,

    /// Inject pre-formatted script output as prompt context.
    #[arg(long = "script-context")]
    pub script_context: Option<String>,

    /// List registered agents and exit.
    #[arg(long = "list-agents")]
    pub list_agents: bool,

    /// List models for the selected agent and exit.
    #[arg(long = "list-models")]
    pub list_models: bool,

    /// Forget the stored session for this scope and exit.
    #[arg(long = "clear-session")]
    pub clear_session: bool,
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;

    #[test]
    fn prompt_with_agent_and_scope() {
        let args = Args::parse_from(["courier", "-a", "claude", "-s", "chat-7", "hello"]);
        assert_eq!(args.prompt.as_deref(), Some("hello"));
        assert_eq!(args.agent.as_deref(), Some("claude"));
        assert_eq!(args.scope, "chat-7");
    }

    #[test]
    fn scope_defaults_to_cli() {
        let args = Args::parse_from(["courier", "hi"]);
        assert_eq!(args.scope, "cli");
    }

    #[test]
    fn attachments_are_repeatable() {
        let args = Args::parse_from([
            "courier",
            "--image",
            "/tmp/a.png",
            "--image",
            "/tmp/b.png",
            "--document",
            "/tmp/c.pdf",
            "look",
        ]);
        assert_eq!(args.images.len(), 2);
        assert_eq!(args.documents, vec!["/tmp/c.pdf"]);
    }

    #[test]
    fn management_flags_need_no_prompt() {
        let args = Args::parse_from(["courier", "--clear-session"]);
        assert!(args.clear_session);
        assert!(args.prompt.is_none());
    }
}
