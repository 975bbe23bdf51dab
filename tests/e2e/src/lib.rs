//! Recollect end-to-end test support
//!
//! - [`harness`]: isolated memory contexts on temporary data directories
//! - [`mocks`]: a deterministic embedder and transcript fixtures

pub mod harness;
pub mod mocks;

pub use harness::TestContext;
pub use mocks::{QueryFailingEmbedder, TopicEmbedder, TranscriptBuilder};
