//! Isolated memory contexts
//!
//! Every [`TestContext`] owns a temporary data directory holding the
//! database, the auto-save state file and any transcripts a test writes.
//! The directory is removed when the context is dropped.

use std::path::{Path, PathBuf};

use recollect_core::{Config, Embedder, MemoryContext};
use tempfile::TempDir;

use crate::mocks::{TopicEmbedder, TranscriptBuilder};

/// A memory context on a throwaway data directory
///
/// # Example
///
/// ```rust,ignore
/// let mut test = TestContext::new();
/// let path = test.write_transcript("s1", &TranscriptBuilder::new().assistant("..."));
/// let report = test.ctx().archive(&path, &ArchiveTarget::default(), &mut |_| {})?;
/// test.commit();
/// ```
pub struct TestContext {
    ctx: Option<MemoryContext<TopicEmbedder>>,
    config: Config,
    dir: TempDir,
}

impl TestContext {
    /// Default configuration on a fresh directory
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Fresh directory with configuration tweaks applied
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = Config {
            data_dir: Some(dir.path().join("data")),
            ..Config::default()
        };
        tweak(&mut config);
        config.validate().expect("Test config must be valid");

        let ctx = MemoryContext::open(config.clone(), TopicEmbedder::new())
            .expect("Failed to open test memory context");

        Self {
            ctx: Some(ctx),
            config,
            dir,
        }
    }

    /// The open context
    pub fn ctx(&self) -> &MemoryContext<TopicEmbedder> {
        self.ctx.as_ref().expect("context is open")
    }

    /// Commit and reopen, as a new invocation would
    pub fn commit(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            ctx.close().expect("Failed to commit");
        }
        self.reopen();
    }

    /// Drop without committing and reopen
    pub fn rollback(&mut self) {
        self.ctx.take();
        self.reopen();
    }

    /// Discard the open context and open one with another embedder
    ///
    /// The harness context stays closed until [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback); drop the returned context first.
    pub fn open_with<E: Embedder>(&mut self, embedder: E) -> MemoryContext<E> {
        self.ctx.take();
        MemoryContext::open(self.config.clone(), embedder)
            .expect("Failed to open memory context with custom embedder")
    }

    fn reopen(&mut self) {
        let ctx = MemoryContext::open(self.config.clone(), TopicEmbedder::new())
            .expect("Failed to reopen test memory context");
        self.ctx = Some(ctx);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Root of the temporary directory
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a transcript as JSONL under the temp directory
    pub fn write_transcript(&self, name: &str, transcript: &TranscriptBuilder) -> PathBuf {
        let path = self.dir.path().join(format!("{name}.jsonl"));
        transcript.write_jsonl(&path);
        path
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
