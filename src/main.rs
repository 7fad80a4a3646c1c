//! CLI entry point for courier.

mod cli;

use std::path::Path;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use courier::adapters::AgentRegistry;
use courier::config::load_config;
use courier::context::FileContextSource;
use courier::exec::LocalExecutor;
use courier::prompt::{Attachment, AttachmentKind};
use courier::runner::{AgentRunner, TurnRequest};
use courier::store::JsonStateStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout is reserved for the agent's reply.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("courier=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let registry = AgentRegistry::builtin();
    let config = match load_config(args.config.as_deref().map(Path::new), &registry) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            exit(1);
        }
    };

    if args.list_agents {
        for descriptor in registry.descriptors() {
            println!("{:<10} {}", descriptor.id, descriptor.label);
        }
        return;
    }

    let store = match JsonStateStore::open_default() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("error: {e}");
            exit(1);
        }
    };
    let state = match store.load() {
        Ok(state) => state,
        Err(e) => {
            eprintln!("error: {e}");
            exit(1);
        }
    };

    // Bootstrap preamble lives next to the user-level config when present.
    let context = match dirs::config_dir() {
        Some(dir) => FileContextSource::new(dir.join("courier")),
        None => FileContextSource::disabled(),
    };
    let executor = LocalExecutor {
        shell: config.exec.shell.clone(),
    };

    let runner = AgentRunner::new(
        config,
        registry,
        Arc::new(executor),
        Arc::new(context),
        store,
        state,
    );

    if args.clear_session {
        match runner.clear_session(&args.scope, args.agent.as_deref()).await {
            Ok(true) => println!("session cleared for scope {}", args.scope),
            Ok(false) => println!("no stored session for scope {}", args.scope),
            Err(e) => {
                eprintln!("error: {e}");
                exit(1);
            }
        }
        return;
    }

    if args.list_models {
        match runner.list_models(args.agent.as_deref()).await {
            Ok(Some(models)) => {
                for model in models {
                    println!("{model}");
                }
            }
            Ok(None) => println!("model listing is not supported by this agent"),
            Err(e) => {
                eprintln!("error: {e}");
                exit(1);
            }
        }
        return;
    }

    let Some(prompt) = args.prompt else {
        eprintln!("error: a prompt is required (or one of --list-agents, --list-models, --clear-session)");
        exit(2);
    };

    let mut request = TurnRequest::new(args.scope, prompt);
    request.agent = args.agent;
    request.model = args.model;
    request.thinking_level = args.thinking;
    request.script_context = args.script_context;
    request.attachments = args
        .images
        .into_iter()
        .map(|path| Attachment {
            kind: AttachmentKind::Image,
            path,
        })
        .chain(args.documents.into_iter().map(|path| Attachment {
            kind: AttachmentKind::Document,
            path,
        }))
        .collect();

    match runner.run_turn(request).await {
        Ok(reply) => println!("{reply}"),
        Err(e) => {
            eprintln!("error: {e}");
            exit(1);
        }
    }
}
