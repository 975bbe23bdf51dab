//! Transcript fixtures
//!
//! Builds transcripts in both record shapes the parser accepts, plus
//! malformed lines, and writes them as JSON Lines.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Builder for JSONL transcripts
///
/// # Example
///
/// ```rust,ignore
/// let transcript = TranscriptBuilder::new()
///     .session("s-1")
///     .user("Why is the login test flaky?")
///     .assistant("Fixed the flaky login test because the session write raced the assert.")
///     .garbage("{broken");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TranscriptBuilder {
    session_id: Option<String>,
    lines: Vec<String>,
}

impl TranscriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session id carried by records added after this call
    pub fn session(mut self, id: &str) -> Self {
        self.session_id = Some(id.to_string());
        self
    }

    /// Direct-shape user record
    pub fn user(self, text: &str) -> Self {
        self.direct("user", text)
    }

    /// Direct-shape assistant record
    pub fn assistant(self, text: &str) -> Self {
        self.direct("assistant", text)
    }

    /// Wrapped-shape assistant record with text blocks and a timestamp
    pub fn assistant_at(self, text: &str, timestamp: DateTime<Utc>) -> Self {
        let record = json!({
            "type": "assistant",
            "timestamp": timestamp.to_rfc3339(),
            "message": {
                "role": "assistant",
                "content": [{"type": "text", "text": text}],
            },
        });
        self.push(record)
    }

    /// Wrapped-shape assistant record reporting token usage
    pub fn assistant_with_usage(self, text: &str, input_tokens: u64) -> Self {
        let record = json!({
            "type": "assistant",
            "message": {
                "role": "assistant",
                "content": [
                    {"type": "text", "text": text},
                    {"type": "tool_use", "name": "read_file", "input": {}},
                ],
                "usage": {"input_tokens": input_tokens, "output_tokens": 120},
            },
        });
        self.push(record)
    }

    /// A line that is not a valid record
    pub fn garbage(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    fn direct(self, role: &str, text: &str) -> Self {
        self.push(json!({"role": role, "content": text}))
    }

    fn push(mut self, mut record: Value) -> Self {
        if let (Some(id), Some(obj)) = (&self.session_id, record.as_object_mut()) {
            obj.insert("sessionId".to_string(), Value::String(id.clone()));
        }
        self.lines.push(record.to_string());
        self
    }

    pub fn to_jsonl(&self) -> String {
        self.lines.join("\n")
    }

    pub fn write_jsonl(&self, path: &Path) {
        std::fs::write(path, self.to_jsonl()).expect("Failed to write transcript fixture");
    }
}

/// A note of exactly `chars` ASCII characters that passes the chunk filter
///
/// Content differs per `topic`, so notes never deduplicate against each other.
pub fn sized_note(topic: &str, chars: usize) -> String {
    let mut note = format!("Decided to keep the {topic} change because it simplifies the build.");
    assert!(note.len() + 1 < chars, "note prefix too long for {chars} chars");
    note.push(' ');
    note.push_str(&"z".repeat(chars - note.len()));
    note
}
