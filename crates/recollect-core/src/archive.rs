//! Transcript archival
//!
//! parse → chunk → filter → dedup pre-check → embed (all batches) → insert.
//! Every surviving chunk is embedded before the first insert, so an
//! embedding failure leaves the store untouched.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::embeddings::{Embedder, EmbeddingError, EmbeddingRole, BATCH_SIZE};
use crate::error::Result;
use crate::memory::{fingerprint, FragmentDraft};
use crate::storage::Storage;
use crate::transcript::{extract_candidates, parse_transcript, Chunk, DiscardCounts, Transcript};

/// Progress of a running archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveProgress {
    /// `done` of `total` new chunks embedded
    Embedding { done: usize, total: usize },
    /// `done` of `total` embedded chunks written
    Storing { done: usize, total: usize },
}

/// Where archived fragments are filed
#[derive(Debug, Clone, Default)]
pub struct ArchiveTarget {
    /// Project key (`None` = global)
    pub project: Option<String>,
    /// Overrides the session id found in the transcript
    pub session_id: Option<String>,
}

/// Outcome of archiving one transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveReport {
    /// New fragments written
    pub archived: usize,
    /// Chunks dropped by the filter
    pub skipped: usize,
    /// Chunks whose content was already stored (or repeated in the transcript)
    pub duplicates: usize,
    /// Filter breakdown of `skipped`
    pub discarded: DiscardCounts,
    /// Transcript records that were malformed or unrecognized
    pub malformed_records: usize,
    /// Session the fragments were attributed to
    pub session_id: Option<String>,
    /// Ids of the new fragments, in transcript order
    pub fragment_ids: Vec<String>,
}

/// Read a transcript file and archive it
pub fn archive_transcript<E: Embedder + ?Sized>(
    storage: &Storage,
    embedder: &E,
    config: &Config,
    path: &Path,
    target: &ArchiveTarget,
    progress: &mut dyn FnMut(ArchiveProgress),
) -> Result<ArchiveReport> {
    let transcript = parse_transcript(path)?;
    let report = archive_parsed(storage, embedder, config, &transcript, target, progress)?;

    tracing::info!(
        path = %path.display(),
        archived = report.archived,
        skipped = report.skipped,
        duplicates = report.duplicates,
        "Archived transcript"
    );
    Ok(report)
}

/// Archive an already parsed transcript
pub fn archive_parsed<E: Embedder + ?Sized>(
    storage: &Storage,
    embedder: &E,
    config: &Config,
    transcript: &Transcript,
    target: &ArchiveTarget,
    progress: &mut dyn FnMut(ArchiveProgress),
) -> Result<ArchiveReport> {
    let session_id = target
        .session_id
        .clone()
        .or_else(|| transcript.session_id.clone());

    let outcome = extract_candidates(transcript, config);
    let mut report = ArchiveReport {
        skipped: outcome.discarded.total(),
        discarded: outcome.discarded,
        malformed_records: transcript.skipped_lines,
        session_id: session_id.clone(),
        ..Default::default()
    };

    let mut seen = HashSet::new();
    let mut fresh: Vec<Chunk> = Vec::new();
    for chunk in outcome.kept {
        let key = fingerprint(&chunk.text);
        if !seen.insert(key) || storage.exists(&chunk.text)? {
            report.duplicates += 1;
        } else {
            fresh.push(chunk);
        }
    }

    if fresh.is_empty() {
        return Ok(report);
    }

    let embeddings = embed_all(embedder, &fresh, progress)?;

    let total = fresh.len();
    for (done, (chunk, embedding)) in fresh.into_iter().zip(embeddings).enumerate() {
        let inserted = storage.insert_or_detect_duplicate(FragmentDraft {
            content: chunk.text,
            embedding,
            project: target.project.clone(),
            source_session: session_id.clone(),
            timestamp: chunk.timestamp,
        })?;

        if inserted.is_duplicate {
            report.duplicates += 1;
        } else {
            report.archived += 1;
            report.fragment_ids.push(inserted.id);
        }
        progress(ArchiveProgress::Storing {
            done: done + 1,
            total,
        });
    }

    Ok(report)
}

/// Embed chunks as passages in sequential batches, one vector per chunk
fn embed_all<E: Embedder + ?Sized>(
    embedder: &E,
    chunks: &[Chunk],
    progress: &mut dyn FnMut(ArchiveProgress),
) -> Result<Vec<Vec<f32>>> {
    let total = chunks.len();
    let mut embeddings = Vec::with_capacity(total);

    for batch in chunks.chunks(BATCH_SIZE) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts, EmbeddingRole::Passage)?;
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            }
            .into());
        }
        embeddings.extend(vectors);
        progress(ArchiveProgress::Embedding {
            done: embeddings.len(),
            total,
        });
    }

    Ok(embeddings)
}
