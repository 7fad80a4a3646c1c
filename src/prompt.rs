//! Prompt assembly for one conversational turn.
//!
//! The final prompt stacks optional context blocks around the user's text:
//! wall-clock timestamp, first-turn bootstrap preamble, retrieved memory,
//! script/tool output, periodic file-handling instructions, and references
//! to attached files. The file-handling text lives in one template file.

use chrono::{DateTime, Utc};

/// Instructions re-injected on a cadence so long sessions keep returning
/// files the way the front-end expects.
const FILE_INSTRUCTIONS: &str = include_str!("templates/file_instructions.template");

/// Kind of file attached to a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Image,
    Document,
}

impl AttachmentKind {
    fn noun(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
        }
    }
}

/// A file already downloaded by the front-end, referenced by local path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub path: String,
}

/// Inputs for one assembled prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptParts<'a> {
    /// Wall-clock stamp for agents whose protocol carries no time signal.
    pub timestamp: Option<DateTime<Utc>>,
    /// First-turn preamble (persona/tools/memory summary).
    pub bootstrap: Option<&'a str>,
    /// Retrieved memory context for this prompt.
    pub memory: Option<&'a str>,
    /// Pre-formatted auxiliary context, e.g. script output to inject.
    pub script_context: Option<&'a str>,
    /// Inject the file-handling instruction block this turn.
    pub file_instructions: bool,
    /// Files attached to this turn.
    pub attachments: &'a [Attachment],
    /// The user's message.
    pub user_prompt: &'a str,
}

/// Stack the context blocks into the final prompt text.
pub fn assemble_prompt(parts: &PromptParts<'_>) -> String {
    let mut blocks = Vec::<String>::new();

    if let Some(timestamp) = parts.timestamp {
        blocks.push(format!(
            "Current time: {}",
            timestamp.format("%Y-%m-%d %H:%M %Z")
        ));
    }
    push_block(&mut blocks, parts.bootstrap);
    push_block(&mut blocks, parts.memory);
    push_block(&mut blocks, parts.script_context);
    if parts.file_instructions {
        blocks.push(FILE_INSTRUCTIONS.trim().to_string());
    }
    blocks.push(parts.user_prompt.trim().to_string());
    for attachment in parts.attachments {
        blocks.push(format!(
            "Attached {} file: {} (read it from disk before answering).",
            attachment.kind.noun(),
            attachment.path
        ));
    }

    normalize_blank_lines(&blocks.join("\n\n"))
}

fn push_block(blocks: &mut Vec<String>, block: Option<&str>) {
    if let Some(text) = block.map(str::trim).filter(|text| !text.is_empty()) {
        blocks.push(text.to_string());
    }
}

/// Collapse runs of blank lines left behind by empty optional blocks.
fn normalize_blank_lines(text: &str) -> String {
    let mut out = String::new();
    let mut previous_blank = false;

    for line in text.lines() {
        let is_blank = line.trim().is_empty();
        if is_blank && previous_blank {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line.trim_end());
        previous_blank = is_blank;
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bare_prompt_passes_through() {
        let parts = PromptParts {
            user_prompt: "hello",
            ..Default::default()
        };
        assert_eq!(assemble_prompt(&parts), "hello");
    }

    // Ensures block order: timestamp, bootstrap, memory, script context,
    // file instructions, user prompt, attachments.
    #[test]
    fn blocks_stack_in_protocol_order() {
        let attachments = [Attachment {
            kind: AttachmentKind::Image,
            path: "/tmp/cat.png".into(),
        }];
        let parts = PromptParts {
            timestamp: Some(Utc.with_ymd_and_hms(2026, 8, 7, 12, 30, 0).unwrap()),
            bootstrap: Some("You are the house assistant."),
            memory: Some("Remembered: user prefers short replies."),
            script_context: Some("uptime: 3 days"),
            file_instructions: true,
            attachments: &attachments,
            user_prompt: "what is in the picture?",
        };
        let prompt = assemble_prompt(&parts);

        let order = [
            "Current time: 2026-08-07 12:30 UTC",
            "house assistant",
            "short replies",
            "uptime: 3 days",
            "FILE: <path>",
            "what is in the picture?",
            "Attached image file: /tmp/cat.png",
        ];
        let mut last = 0;
        for needle in order {
            let at = prompt[last..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing or out of order: {needle}\n{prompt}"));
            last += at;
        }
    }

    #[test]
    fn empty_optional_blocks_leave_no_gaps() {
        let parts = PromptParts {
            bootstrap: Some("   "),
            memory: Some(""),
            user_prompt: "hi",
            ..Default::default()
        };
        assert_eq!(assemble_prompt(&parts), "hi");
    }

    #[test]
    fn file_instructions_only_when_requested() {
        let without = assemble_prompt(&PromptParts {
            user_prompt: "hi",
            ..Default::default()
        });
        assert!(!without.contains("FILE:"));

        let with = assemble_prompt(&PromptParts {
            user_prompt: "hi",
            file_instructions: true,
            ..Default::default()
        });
        assert!(with.contains("FILE: <path>"));
    }

    #[test]
    fn document_attachments_are_labelled() {
        let attachments = [Attachment {
            kind: AttachmentKind::Document,
            path: "/tmp/report.pdf".into(),
        }];
        let prompt = assemble_prompt(&PromptParts {
            user_prompt: "summarize",
            attachments: &attachments,
            ..Default::default()
        });
        assert!(prompt.contains("Attached document file: /tmp/report.pdf"));
    }
}
