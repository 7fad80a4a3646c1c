//! Adapter for the codex CLI.
//!
//! Codex emits newline-delimited JSON records interleaved with log noise.
//! The records we care about: `thread.started` (carries `thread_id`) and
//! `item.completed` (carries a message item with the reply text, optionally
//! tagged with a `"final"` channel).

use serde_json::Value;

use super::{
    prompt_operand, sanitize_session_id, shell_quote, AgentAdapter, AgentDescriptor,
    CommandRequest, ParsedOutput,
};

/// Descriptor for the codex CLI.
const DESCRIPTOR: AgentDescriptor = AgentDescriptor {
    id: "codex",
    label: "Codex",
    needs_pty: false,
    merge_stderr: false,
    default_model: None,
};

#[derive(Debug)]
pub struct CodexAdapter;

impl AgentAdapter for CodexAdapter {
    fn descriptor(&self) -> &AgentDescriptor {
        &DESCRIPTOR
    }

    fn build_command(&self, req: &CommandRequest<'_>) -> String {
        let mut command = String::from("codex exec");
        if let Some(session_id) = req.session_id {
            command.push_str(" resume ");
            command.push_str(&shell_quote(session_id));
        }
        command.push_str(" --json --skip-git-repo-check");
        if let Some(model) = req.model {
            command.push_str(" --model ");
            command.push_str(&shell_quote(model));
        }
        if let Some(level) = req.thinking_level {
            command.push_str(" --config ");
            command.push_str(&shell_quote(&format!("model_reasoning_effort=\"{level}\"")));
        }
        command.push(' ');
        command.push_str(&prompt_operand(req));
        command
    }

    fn parse_output(&self, raw: &str) -> ParsedOutput {
        let mut session_id = None;
        let mut last_text: Option<String> = None;
        let mut final_text: Option<String> = None;
        let mut saw_structured_output = false;

        for line in raw.lines() {
            let Ok(record) = serde_json::from_str::<Value>(line.trim()) else {
                continue;
            };
            let Some(kind) = record.get("type").and_then(Value::as_str) else {
                continue;
            };
            saw_structured_output = true;

            match kind {
                "thread.started" => {
                    if let Some(id) = record.get("thread_id").and_then(Value::as_str) {
                        session_id = sanitize_session_id(id);
                    }
                }
                "item.completed" => {
                    let Some(item) = record.get("item") else {
                        continue;
                    };
                    let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default();
                    if !item_type.contains("message") {
                        continue;
                    }
                    let Some(text) = item.get("text").and_then(Value::as_str) else {
                        continue;
                    };
                    if message_channel(&record, item) == Some("final") {
                        final_text = Some(text.to_string());
                    } else {
                        last_text = Some(text.to_string());
                    }
                }
                _ => {}
            }
        }

        ParsedOutput {
            // A "final" channel record beats chronologically later
            // non-final records.
            text: final_text.or(last_text).unwrap_or_default(),
            session_id,
            saw_structured_output,
        }
    }
}

/// Channel marker for a message record. Checked at both the record and item
/// level; the upstream CLI does not document which one carries it.
fn message_channel<'a>(record: &'a Value, item: &'a Value) -> Option<&'a str> {
    item.get("channel")
        .and_then(Value::as_str)
        .or_else(|| record.get("channel").and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use super::super::testsupport::shell_words;
    use super::*;

    fn request(prompt: &str) -> CommandRequest<'_> {
        CommandRequest {
            prompt,
            ..Default::default()
        }
    }

    #[test]
    fn fresh_session_command_has_no_resume_clause() {
        let command = CodexAdapter.build_command(&request("hello"));
        assert_eq!(
            command,
            "codex exec --json --skip-git-repo-check 'hello'"
        );
    }

    #[test]
    fn resume_command_quotes_session_id() {
        let command = CodexAdapter.build_command(&CommandRequest {
            prompt: "again",
            session_id: Some("t1"),
            ..Default::default()
        });
        assert_eq!(
            command,
            "codex exec resume 't1' --json --skip-git-repo-check 'again'"
        );
    }

    #[test]
    fn model_and_thinking_flags_are_appended_when_present() {
        let command = CodexAdapter.build_command(&CommandRequest {
            prompt: "p",
            model: Some("gpt-5"),
            thinking_level: Some("high"),
            ..Default::default()
        });
        assert_eq!(
            command,
            "codex exec --json --skip-git-repo-check --model 'gpt-5' \
             --config 'model_reasoning_effort=\"high\"' 'p'"
        );
    }

    // Ensures the prompt survives shell word splitting as one argument even
    // with embedded quotes.
    #[test]
    fn prompt_round_trips_shell_splitting() {
        let prompt = r#"it's "quoted" \ and spaced"#;
        let command = CodexAdapter.build_command(&request(prompt));
        let words = shell_words(&command);
        assert_eq!(words.last().map(String::as_str), Some(prompt));
    }

    #[test]
    fn parses_thread_start_and_message() {
        let raw = concat!(
            r#"{"type":"thread.started","thread_id":"t1"}"#,
            "\n",
            r#"{"type":"item.completed","item":{"type":"message","text":"hi"}}"#,
        );
        let parsed = CodexAdapter.parse_output(raw);
        assert_eq!(parsed.text, "hi");
        assert_eq!(parsed.session_id.as_deref(), Some("t1"));
        assert!(parsed.saw_structured_output);
    }

    // Ensures a final-channel message wins regardless of record order.
    #[test]
    fn final_channel_beats_later_commentary() {
        let raw = concat!(
            r#"{"type":"item.completed","item":{"type":"message","text":"answer","channel":"final"}}"#,
            "\n",
            r#"{"type":"item.completed","item":{"type":"message","text":"thinking aloud","channel":"commentary"}}"#,
        );
        let parsed = CodexAdapter.parse_output(raw);
        assert_eq!(parsed.text, "answer");
    }

    #[test]
    fn without_channel_markers_last_message_wins() {
        let raw = concat!(
            r#"{"type":"item.completed","item":{"type":"message","text":"first"}}"#,
            "\n",
            r#"{"type":"item.completed","item":{"type":"message","text":"second"}}"#,
        );
        let parsed = CodexAdapter.parse_output(raw);
        assert_eq!(parsed.text, "second");
    }

    #[test]
    fn malformed_lines_are_skipped_silently() {
        let raw = concat!(
            "starting up...\n",
            "{not json\n",
            r#"{"type":"item.completed","item":{"type":"agent_message","text":"ok"}}"#,
            "\n",
            "bye\n",
        );
        let parsed = CodexAdapter.parse_output(raw);
        assert_eq!(parsed.text, "ok");
        assert!(parsed.saw_structured_output);
    }

    #[test]
    fn session_id_artifacts_are_sanitized() {
        let raw = r#"{"type":"thread.started","thread_id":"t9\""}"#;
        let parsed = CodexAdapter.parse_output(raw);
        assert_eq!(parsed.session_id.as_deref(), Some("t9"));
    }

    #[test]
    fn empty_stdout_parses_to_empty_output() {
        let parsed = CodexAdapter.parse_output("");
        assert_eq!(parsed, ParsedOutput::default());
    }

    #[test]
    fn pure_noise_does_not_count_as_structured() {
        let parsed = CodexAdapter.parse_output("warning: something\nnot json at all\n");
        assert!(!parsed.saw_structured_output);
        assert!(parsed.text.is_empty());
    }
}
