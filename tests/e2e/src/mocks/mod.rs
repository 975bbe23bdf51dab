//! Test doubles and data factories

mod embedder;
mod fixtures;

pub use embedder::{QueryFailingEmbedder, TopicEmbedder};
pub use fixtures::{sized_note, TranscriptBuilder};
