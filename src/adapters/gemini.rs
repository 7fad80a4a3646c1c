//! Adapter for the gemini CLI.
//!
//! Gemini answers with a single `response`-keyed JSON document and logs
//! liberally to stderr, so stderr is merged into the parsed stream.

use serde_json::Value;

use super::{
    prompt_operand, sanitize_session_id, shell_quote, AgentAdapter, AgentDescriptor,
    CommandRequest, ParsedOutput,
};

/// Descriptor for the gemini CLI.
const DESCRIPTOR: AgentDescriptor = AgentDescriptor {
    id: "gemini",
    label: "Gemini",
    needs_pty: false,
    merge_stderr: true,
    default_model: None,
};

#[derive(Debug)]
pub struct GeminiAdapter;

impl AgentAdapter for GeminiAdapter {
    fn descriptor(&self) -> &AgentDescriptor {
        &DESCRIPTOR
    }

    fn build_command(&self, req: &CommandRequest<'_>) -> String {
        let mut command = String::from("gemini -p ");
        command.push_str(&prompt_operand(req));
        command.push_str(" --output-format json --yolo");
        if let Some(model) = req.model {
            command.push_str(" --model ");
            command.push_str(&shell_quote(model));
        }
        if let Some(session_id) = req.session_id {
            command.push_str(" --resume ");
            command.push_str(&shell_quote(session_id));
        }
        command
    }

    fn parse_output(&self, raw: &str) -> ParsedOutput {
        // The document usually arrives intact, but merged stderr noise can
        // surround it; fall back to scanning lines for the last object that
        // carries a `response`.
        if let Ok(doc) = serde_json::from_str::<Value>(raw.trim()) {
            if doc.is_object() {
                return parse_response_document(&doc);
            }
        }

        let mut parsed = ParsedOutput::default();
        for line in raw.lines() {
            let Ok(doc) = serde_json::from_str::<Value>(line.trim()) else {
                continue;
            };
            if doc.get("response").is_some() {
                parsed = parse_response_document(&doc);
            }
        }
        parsed
    }
}

fn parse_response_document(doc: &Value) -> ParsedOutput {
    ParsedOutput {
        text: doc
            .get("response")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        session_id: doc
            .get("sessionId")
            .or_else(|| doc.get("session_id"))
            .and_then(Value::as_str)
            .and_then(sanitize_session_id),
        saw_structured_output: true,
    }
}
