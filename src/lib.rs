//! Courier — a bridge between chat front-ends and command-line AI agents.
//!
//! This crate normalizes conversations across interchangeable agent CLIs
//! (codex-like, claude-like, gemini-like, opencode-like): it builds each
//! agent's invocation, parses its structured output, maps conversations to
//! durable agent-native session ids, and serializes turns per conversation
//! so concurrent prompts never interleave within one thread.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use courier::adapters::AgentRegistry;
//! use courier::config::Config;
//! use courier::context::FileContextSource;
//! use courier::exec::LocalExecutor;
//! use courier::runner::{AgentRunner, TurnRequest};
//! use courier::store::JsonStateStore;
//!
//! # async fn example() {
//! let store = Arc::new(JsonStateStore::open_default().unwrap());
//! let state = store.load().unwrap_or_default();
//! let runner = AgentRunner::new(
//!     Config::default(),
//!     AgentRegistry::builtin(),
//!     Arc::new(LocalExecutor::default()),
//!     Arc::new(FileContextSource::disabled()),
//!     store,
//!     state,
//! );
//! let reply = runner
//!     .run_turn(TurnRequest::new("cli", "Hello!"))
//!     .await
//!     .unwrap();
//! println!("{reply}");
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod prompt;
pub mod queue;
pub mod runner;
pub mod session;
pub mod store;
