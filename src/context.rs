//! Bootstrap and memory context collaborators.
//!
//! The runner treats context retrieval as an external capability: a
//! bootstrap preamble for the first turn of a new agent session, and a
//! memory block retrieved per prompt. [`FileContextSource`] is the bundled
//! embedding (preamble from a file next to the config, no memory backend);
//! chat front-ends supply their own implementation.

use std::path::PathBuf;

use async_trait::async_trait;

/// Inputs for a memory retrieval.
#[derive(Debug, Clone, Copy)]
pub struct MemoryQuery<'a> {
    /// The raw user prompt, used as the retrieval query.
    pub query: &'a str,
    /// Conversation scope the memory belongs to.
    pub scope: &'a str,
    /// Agent the conversation is bound to.
    pub agent_id: &'a str,
    /// Maximum number of memory entries to render.
    pub limit: usize,
}

/// External collaborator producing prompt context blocks.
///
/// Empty strings mean "nothing to inject" and are skipped during prompt
/// assembly; errors are hard failures for the turn.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// One-time preamble (persona/tools/memory summary) for a thread's
    /// first turn.
    async fn bootstrap_context(&self, thread_key: &str) -> Result<String, String>;

    /// Memory block retrieved for this prompt.
    async fn memory_context(&self, query: &MemoryQuery<'_>) -> Result<String, String>;
}

/// File-backed context: the bootstrap preamble is read from `bootstrap.md`
/// under the configured directory; there is no memory backend.
pub struct FileContextSource {
    /// Directory holding `bootstrap.md`; `None` disables bootstrap entirely.
    root: Option<PathBuf>,
}

/// Preamble file name under the context root.
const BOOTSTRAP_FILE: &str = "bootstrap.md";

impl FileContextSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    /// Source that injects nothing.
    pub fn disabled() -> Self {
        Self { root: None }
    }
}

#[async_trait]
impl ContextSource for FileContextSource {
    async fn bootstrap_context(&self, _thread_key: &str) -> Result<String, String> {
        let Some(root) = &self.root else {
            return Ok(String::new());
        };
        let path = root.join(BOOTSTRAP_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            // A missing preamble file is "no bootstrap", not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(format!("{}: {e}", path.display())),
        }
    }

    async fn memory_context(&self, _query: &MemoryQuery<'_>) -> Result<String, String> {
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> MemoryQuery<'static> {
        MemoryQuery {
            query: "q",
            scope: "s",
            agent_id: "codex",
            limit: 5,
        }
    }

    #[tokio::test]
    async fn disabled_source_injects_nothing() {
        let source = FileContextSource::disabled();
        assert_eq!(source.bootstrap_context("k").await.unwrap(), "");
        assert_eq!(source.memory_context(&query()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn reads_bootstrap_file_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BOOTSTRAP_FILE), "You are courier.").unwrap();
        let source = FileContextSource::new(dir.path());
        assert_eq!(
            source.bootstrap_context("k").await.unwrap(),
            "You are courier."
        );
    }

    // Ensures a missing preamble file degrades to an empty block.
    #[tokio::test]
    async fn missing_bootstrap_file_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileContextSource::new(dir.path());
        assert_eq!(source.bootstrap_context("k").await.unwrap(), "");
    }
}
