//! Adapter for the claude CLI.
//!
//! Claude prints a single JSON document (`result` + `session_id`) rather
//! than a record stream. Resume ids are UUIDs; anything else stored under a
//! conversation is stale state from another agent and must not be passed to
//! `--resume`, which hard-fails on malformed ids.

use serde_json::Value;
use uuid::Uuid;

use super::{
    prompt_operand, sanitize_session_id, shell_quote, AgentAdapter, AgentDescriptor,
    CommandRequest, ParsedOutput,
};

/// Descriptor for the claude CLI.
const DESCRIPTOR: AgentDescriptor = AgentDescriptor {
    id: "claude",
    label: "Claude",
    needs_pty: false,
    merge_stderr: false,
    default_model: None,
};

#[derive(Debug)]
pub struct ClaudeAdapter;

impl AgentAdapter for ClaudeAdapter {
    fn descriptor(&self) -> &AgentDescriptor {
        &DESCRIPTOR
    }

    fn build_command(&self, req: &CommandRequest<'_>) -> String {
        let mut command = String::from("claude -p ");
        command.push_str(&prompt_operand(req));
        command.push_str(" --output-format json --dangerously-skip-permissions");
        if let Some(model) = req.model {
            command.push_str(" --model ");
            command.push_str(&shell_quote(model));
        }
        // Resume only with a syntactically valid UUID; claude rejects
        // anything else outright.
        if let Some(session_id) = req.session_id.filter(|id| is_uuid(id)) {
            command.push_str(" --resume ");
            command.push_str(&shell_quote(session_id));
        }
        command
    }

    fn parse_output(&self, raw: &str) -> ParsedOutput {
        // Preferred shape: the whole stdout is one JSON document.
        if let Ok(doc) = serde_json::from_str::<Value>(raw.trim()) {
            if doc.is_object() {
                return parse_result_document(&doc);
            }
        }

        // Fallback: log noise around the document; scan line by line and
        // keep the last parseable object.
        let mut parsed = ParsedOutput::default();
        for line in raw.lines() {
            let Ok(doc) = serde_json::from_str::<Value>(line.trim()) else {
                continue;
            };
            if doc.is_object() {
                parsed = parse_result_document(&doc);
            }
        }
        parsed
    }
}

fn parse_result_document(doc: &Value) -> ParsedOutput {
    ParsedOutput {
        text: doc
            .get("result")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        session_id: doc
            .get("session_id")
            .and_then(Value::as_str)
            .and_then(sanitize_session_id),
        saw_structured_output: true,
    }
}

/// True when `id` parses as a UUID.
fn is_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}
