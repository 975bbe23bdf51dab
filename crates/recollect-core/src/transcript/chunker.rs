//! Paragraph and sentence chunking

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::Transcript;
use crate::config::ChunkingConfig;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n").expect("paragraph regex is valid"));

/// A candidate fragment cut from an assistant turn
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Trimmed chunk text
    pub text: String,
    /// Timestamp of the turn the chunk came from
    pub timestamp: Option<DateTime<Utc>>,
}

/// Cut every assistant turn of a transcript into chunks, in order
pub fn chunk_transcript(transcript: &Transcript, config: &ChunkingConfig) -> Vec<Chunk> {
    transcript
        .assistant_turns()
        .flat_map(|turn| {
            chunk_text(&turn.text, config)
                .into_iter()
                .map(move |text| Chunk {
                    text,
                    timestamp: turn.timestamp,
                })
        })
        .collect()
}

/// Split text into paragraph chunks, re-splitting oversized paragraphs
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();

    for paragraph in PARAGRAPH_BREAK.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if char_len(paragraph) <= config.paragraph_ceiling {
            chunks.push(paragraph.to_string());
        } else {
            chunks.extend(accumulate_sentences(paragraph, config.soft_cap));
        }
    }

    chunks
}

/// Greedily pack sentences into chunks of at most `soft_cap` characters
///
/// A single sentence longer than the cap becomes its own chunk.
fn accumulate_sentences(paragraph: &str, soft_cap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(paragraph) {
        let len = char_len(sentence);
        if !current.is_empty() && current_len + 1 + len > soft_cap {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(sentence);
        current_len += len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split at `.`, `!` or `?` followed by whitespace; punctuation stays with
/// its sentence
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && let Some(&(_, next)) = chars.peek()
            && next.is_whitespace()
        {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
