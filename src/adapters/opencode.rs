//! Adapter for the opencode CLI.
//!
//! Opencode streams ndjson `text` fragments that must be concatenated into
//! the reply, each tagged with the owning `sessionID`. Runs are granted
//! blanket permissions via the `OPENCODE_PERMISSION` environment prefix and
//! stdin is closed so the CLI never waits for interactive input.
//!
//! This is the one built-in adapter exercising the optional listing
//! capabilities: session listing backs the runner's session-id recovery
//! fallback, model listing backs `--list-models`.

use serde_json::Value;

use super::{
    prompt_operand, sanitize_session_id, shell_quote, AgentAdapter, AgentDescriptor,
    CommandRequest, ParsedOutput,
};

/// Descriptor for the opencode CLI.
const DESCRIPTOR: AgentDescriptor = AgentDescriptor {
    id: "opencode",
    label: "OpenCode",
    needs_pty: false,
    merge_stderr: true,
    default_model: None,
};

#[derive(Debug)]
pub struct OpencodeAdapter;

impl AgentAdapter for OpencodeAdapter {
    fn descriptor(&self) -> &AgentDescriptor {
        &DESCRIPTOR
    }

    fn build_command(&self, req: &CommandRequest<'_>) -> String {
        let mut command =
            String::from(r#"OPENCODE_PERMISSION='{"*": "allow"}' opencode run --format json"#);
        if let Some(model) = req.model {
            command.push_str(" --model ");
            command.push_str(&shell_quote(model));
        }
        if let Some(session_id) = req.session_id {
            command.push_str(" --continue --session ");
            command.push_str(&shell_quote(session_id));
        }
        command.push(' ');
        command.push_str(&prompt_operand(req));
        command.push_str(" < /dev/null");
        command
    }

    fn parse_output(&self, raw: &str) -> ParsedOutput {
        let mut text = String::new();
        let mut session_id = None;
        let mut saw_structured_output = false;

        for line in raw.lines() {
            let Ok(record) = serde_json::from_str::<Value>(line.trim()) else {
                continue;
            };
            let Some(kind) = record.get("type").and_then(Value::as_str) else {
                continue;
            };
            saw_structured_output = true;

            if let Some(id) = record.get("sessionID").and_then(Value::as_str) {
                session_id = sanitize_session_id(id).or(session_id);
            }
            if kind == "text" {
                if let Some(fragment) = record.get("text").and_then(Value::as_str) {
                    text.push_str(fragment);
                }
            }
        }

        ParsedOutput {
            text,
            session_id,
            saw_structured_output,
        }
    }

    fn list_sessions_command(&self) -> Option<String> {
        Some("opencode session list --format json".to_string())
    }

    fn parse_session_list(&self, raw: &str) -> Option<String> {
        // Accept either one JSON array document or ndjson session records.
        let records: Vec<Value> = match serde_json::from_str::<Value>(raw.trim()) {
            Ok(Value::Array(items)) => items,
            _ => raw
                .lines()
                .filter_map(|line| serde_json::from_str(line.trim()).ok())
                .collect(),
        };

        records
            .iter()
            .filter_map(|record| {
                let id = record.get("id").and_then(Value::as_str)?;
                Some((session_updated_millis(record), id))
            })
            .max_by_key(|(updated, _)| *updated)
            .and_then(|(_, id)| sanitize_session_id(id))
    }

    fn list_models_command(&self) -> Option<String> {
        Some("opencode models".to_string())
    }

    fn parse_model_list(&self, raw: &str) -> Option<Vec<String>> {
        let models: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        (!models.is_empty()).then_some(models)
    }
}

/// Last-update ordering key for a session record. Opencode has shipped both
/// a flat `updated` field and a nested `time.updated`.
fn session_updated_millis(record: &Value) -> u64 {
    record
        .get("time")
        .and_then(|time| time.get("updated"))
        .or_else(|| record.get("updated"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::super::testsupport::shell_words;
    use super::*;

    #[test]
    fn fresh_session_command_shape() {
        let command = OpencodeAdapter.build_command(&CommandRequest {
            prompt: "hello",
            ..Default::default()
        });
        assert_eq!(
            command,
            r#"OPENCODE_PERMISSION='{"*": "allow"}' opencode run --format json 'hello' < /dev/null"#
        );
    }

    #[test]
    fn resume_uses_continue_and_session_flags() {
        let command = OpencodeAdapter.build_command(&CommandRequest {
            prompt: "p",
            session_id: Some("ses_42"),
            model: Some("anthropic/claude-sonnet"),
            ..Default::default()
        });
        assert!(command.contains("--model 'anthropic/claude-sonnet'"));
        assert!(command.contains("--continue --session 'ses_42'"));
        assert!(command.ends_with("'p' < /dev/null"));
    }

    #[test]
    fn prompt_round_trips_shell_splitting() {
        let prompt = "don't break";
        let command = OpencodeAdapter.build_command(&CommandRequest {
            prompt,
            ..Default::default()
        });
        let words = shell_words(&command);
        // Last two words are the stdin redirect.
        assert_eq!(words[words.len() - 3], prompt);
    }

    // Ensures text fragments concatenate in stream order.
    #[test]
    fn text_fragments_are_concatenated() {
        let raw = concat!(
            r#"{"type":"step_start","sessionID":"ses_1"}"#,
            "\n",
            r#"{"type":"text","text":"Hello, ","sessionID":"ses_1"}"#,
            "\n",
            r#"{"type":"text","text":"world.","sessionID":"ses_1"}"#,
        );
        let parsed = OpencodeAdapter.parse_output(raw);
        assert_eq!(parsed.text, "Hello, world.");
        assert_eq!(parsed.session_id.as_deref(), Some("ses_1"));
        assert!(parsed.saw_structured_output);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let raw = "booting\n{\"type\":\"text\",\"text\":\"ok\"}\nnot json";
        let parsed = OpencodeAdapter.parse_output(raw);
        assert_eq!(parsed.text, "ok");
        assert_eq!(parsed.session_id, None);
    }

    #[test]
    fn empty_stdout_parses_to_empty_output() {
        assert_eq!(OpencodeAdapter.parse_output(""), ParsedOutput::default());
    }

    // Ensures session recovery picks the most recently updated session.
    #[test]
    fn session_list_returns_most_recent_id() {
        let raw = r#"[
            {"id":"ses_old","time":{"updated":100}},
            {"id":"ses_new","time":{"updated":300}},
            {"id":"ses_mid","updated":200}
        ]"#;
        assert_eq!(
            OpencodeAdapter.parse_session_list(raw).as_deref(),
            Some("ses_new")
        );
    }

    #[test]
    fn session_list_accepts_ndjson_records() {
        let raw = concat!(
            r#"{"id":"ses_a","updated":5}"#,
            "\n",
            r#"{"id":"ses_b","updated":9}"#,
        );
        assert_eq!(
            OpencodeAdapter.parse_session_list(raw).as_deref(),
            Some("ses_b")
        );
    }

    #[test]
    fn session_list_with_no_records_is_none() {
        assert_eq!(OpencodeAdapter.parse_session_list("no sessions"), None);
    }

    #[test]
    fn model_list_parses_plain_lines() {
        let models = OpencodeAdapter
            .parse_model_list("anthropic/claude-sonnet\n\nopenai/gpt-5\n")
            .unwrap();
        assert_eq!(models, vec!["anthropic/claude-sonnet", "openai/gpt-5"]);
        assert_eq!(OpencodeAdapter.parse_model_list("  \n"), None);
    }
}
