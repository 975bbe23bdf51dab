//! Transcript parsing
//!
//! Records come in two shapes: *direct* (`role` + `content` at the top level)
//! and *wrapped* (`type` + a nested `message`). Each line is classified by
//! [`detect_shape`] first and only then deserialized into the matching typed
//! record. Lines that are not JSON, or match neither shape, are skipped.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::usage::TokenUsage;
use super::TranscriptError;

// ============================================================================
// TURNS
// ============================================================================

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
    Other,
}

impl Role {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "user" | "human" => Role::User,
            "assistant" | "ai" => Role::Assistant,
            _ => Role::Other,
        }
    }
}

/// One parsed conversational turn
#[derive(Debug, Clone)]
pub struct Turn {
    /// Author
    pub role: Role,
    /// Text blocks concatenated in order, separated by blank lines
    pub text: String,
    /// Record timestamp, when present
    pub timestamp: Option<DateTime<Utc>>,
    /// Token usage reported with the turn, when present
    pub usage: Option<TokenUsage>,
}

/// A parsed transcript
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    /// Session id carried by the records, if any
    pub session_id: Option<String>,
    /// Turns in file order
    pub turns: Vec<Turn>,
    /// Lines skipped as malformed or unrecognized
    pub skipped_lines: usize,
}

impl Transcript {
    /// Assistant-authored turns, the only archival candidates
    pub fn assistant_turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.role == Role::Assistant)
    }
}

// ============================================================================
// RECORD SHAPES
// ============================================================================

/// Which record layout a JSON value uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// `{ "role", "content", "timestamp"? }`
    Direct,
    /// `{ "type", "message": { "role"?, "content", "usage"? }, ... }`
    Wrapped,
}

/// Classify a record; `None` for records that carry no turn
pub fn detect_shape(value: &Value) -> Option<RecordShape> {
    let obj = value.as_object()?;
    if obj.get("message").is_some_and(Value::is_object) && obj.contains_key("type") {
        return Some(RecordShape::Wrapped);
    }
    if obj.get("role").is_some_and(Value::is_string) {
        return Some(RecordShape::Direct);
    }
    None
}

#[derive(Debug, Deserialize)]
struct DirectRecord {
    role: String,
    #[serde(default)]
    content: MessageContent,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default, rename = "sessionId", alias = "session_id")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WrappedRecord {
    #[serde(rename = "type")]
    kind: String,
    message: WrappedMessage,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default, rename = "sessionId", alias = "session_id")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WrappedMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: MessageContent,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Unsupported(Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentBlock {
    Typed(TypedBlock),
    Unsupported(Value),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TypedBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Blocks(blocks) => blocks
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Typed(TypedBlock::Text { text }) => Some(text),
                    _ => None,
                })
                .filter(|text| !text.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n\n"),
            MessageContent::Unsupported(_) => String::new(),
        }
    }
}

fn parse_timestamp(value: Option<Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Parsed record: a turn plus the session id it carried
type ParsedRecord = (Turn, Option<String>);

fn parse_record(value: Value) -> Option<ParsedRecord> {
    match detect_shape(&value)? {
        RecordShape::Direct => {
            let record: DirectRecord = serde_json::from_value(value).ok()?;
            let turn = Turn {
                role: Role::parse(&record.role),
                text: record.content.into_text(),
                timestamp: parse_timestamp(record.timestamp),
                usage: None,
            };
            Some((turn, record.session_id))
        }
        RecordShape::Wrapped => {
            let record: WrappedRecord = serde_json::from_value(value).ok()?;
            let role = record
                .message
                .role
                .as_deref()
                .map(Role::parse)
                .unwrap_or_else(|| Role::parse(&record.kind));
            let turn = Turn {
                role,
                text: record.message.content.into_text(),
                timestamp: parse_timestamp(record.timestamp),
                usage: record.message.usage,
            };
            Some((turn, record.session_id))
        }
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Parse transcript text (JSON Lines, or a single JSON array of records)
///
/// Never fails: malformed lines and unrecognized records are counted in
/// `skipped_lines` and parsing continues.
pub fn parse_transcript_str(raw: &str) -> Transcript {
    parse_transcript_bytes(raw.as_bytes())
}

/// [`parse_transcript_str`] over raw file bytes
///
/// A line that is not valid UTF-8 is skipped like any other malformed line.
pub fn parse_transcript_bytes(raw: &[u8]) -> Transcript {
    let mut transcript = Transcript::default();

    let records: Vec<Option<Value>> = if raw.trim_ascii_start().starts_with(b"[") {
        match serde_json::from_slice::<Vec<Value>>(raw) {
            Ok(values) => values.into_iter().map(Some).collect(),
            Err(_) => parse_lines(raw),
        }
    } else {
        parse_lines(raw)
    };

    for record in records {
        match record.and_then(parse_record) {
            Some((turn, session_id)) => {
                if transcript.session_id.is_none() {
                    transcript.session_id = session_id;
                }
                transcript.turns.push(turn);
            }
            None => transcript.skipped_lines += 1,
        }
    }

    if transcript.skipped_lines > 0 {
        tracing::debug!(
            skipped = transcript.skipped_lines,
            turns = transcript.turns.len(),
            "Skipped unrecognized transcript records"
        );
    }

    transcript
}

fn parse_lines(raw: &[u8]) -> Vec<Option<Value>> {
    raw.split(|byte| *byte == b'\n')
        .filter(|line| !line.trim_ascii().is_empty())
        .map(|line| {
            std::str::from_utf8(line)
                .ok()
                .and_then(|line| serde_json::from_str::<Value>(line).ok())
        })
        .collect()
}

/// Read and parse a transcript file
///
/// The session id falls back to the file stem when no record carries one.
pub fn parse_transcript(path: &Path) -> Result<Transcript, TranscriptError> {
    let raw = std::fs::read(path).map_err(|source| TranscriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut transcript = parse_transcript_bytes(&raw);
    if transcript.session_id.is_none() {
        transcript.session_id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
    }
    Ok(transcript)
}
