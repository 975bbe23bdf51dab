//! Invocation context
//!
//! [`MemoryContext`] owns everything one invocation works with: the store
//! (and its open transaction), the embedder and the configuration snapshot.
//! Core operations borrow it; nothing is global. [`MemoryContext::close`]
//! commits, dropping the context rolls back.
//!
//! Auto-save guard changes are staged in memory and written to the state
//! file only after the store has committed, so the guard never claims work
//! that was rolled back.

use std::cell::RefCell;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::archive::{archive_transcript, ArchiveProgress, ArchiveReport, ArchiveTarget};
use crate::automation::{
    build_restoration_context, run_automation, AutoSaveState, AutomationReport,
    AutomationRequest, RestorationContext, StateStore,
};
use crate::config::Config;
use crate::embeddings::{Embedder, EmbeddingRole, QueryCache};
use crate::error::Result;
use crate::memory::{RankedFragment, Scope};
use crate::search::HybridRetriever;
use crate::storage::Storage;

#[cfg(feature = "embeddings")]
use crate::embeddings::LocalEmbedder;

/// Store, embedder and configuration of one invocation
pub struct MemoryContext<E: Embedder> {
    storage: Storage,
    embedder: QueryCache<E>,
    config: Config,
    state: StateStore,
    pending_state: RefCell<Option<AutoSaveState>>,
}

#[cfg(feature = "embeddings")]
impl MemoryContext<LocalEmbedder> {
    /// Open with the local fastembed model
    pub fn open_default(config: Config) -> Result<Self> {
        let embedder = LocalEmbedder::new(None)?;
        Self::open(config, embedder)
    }
}

impl<E: Embedder> MemoryContext<E> {
    /// Open the store under the configured data directory
    pub fn open(config: Config, embedder: E) -> Result<Self> {
        let storage = Storage::open(&config.database_path()?)?
            .with_keyword_index(config.keyword_index)
            .with_fallback_step(config.retrieval.keyword_fallback_step);
        let state = StateStore::new(config.state_path()?);

        tracing::debug!(
            db = %storage.path().display(),
            model = embedder.model_name(),
            "Memory context opened"
        );

        Ok(Self {
            storage,
            embedder: QueryCache::new(embedder),
            config,
            state,
            pending_state: RefCell::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn embedder(&self) -> &QueryCache<E> {
        &self.embedder
    }

    pub fn state_store(&self) -> &StateStore {
        &self.state
    }

    /// Auto-save guard as this invocation sees it: staged, else persisted
    pub fn auto_save_state(&self) -> AutoSaveState {
        self.pending_state
            .borrow()
            .clone()
            .unwrap_or_else(|| self.state.load())
    }

    /// Stage a guard update, written by [`close`](Self::close) after commit
    pub fn stage_auto_save_state(&self, state: AutoSaveState) {
        *self.pending_state.borrow_mut() = Some(state);
    }

    /// New conversation session: re-arm the auto-save guard
    pub fn reset_session(&self) -> AutoSaveState {
        let state = self.auto_save_state().for_new_session();
        self.stage_auto_save_state(state.clone());
        tracing::info!("Auto-save session flag reset");
        state
    }

    /// Hybrid retriever over this context's store
    pub fn retriever(&self) -> HybridRetriever<'_, QueryCache<E>> {
        HybridRetriever::new(&self.storage, &self.embedder, &self.config.retrieval)
    }

    /// Ranked fragments for a query
    pub fn search(&self, query: &str, scope: &Scope, limit: usize) -> Result<Vec<RankedFragment>> {
        self.search_at(query, scope, limit, Utc::now())
    }

    /// [`search`](Self::search) with an explicit clock
    pub fn search_at(
        &self,
        query: &str,
        scope: &Scope,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedFragment>> {
        self.retriever().search(query, scope, limit, now)
    }

    /// Archive a transcript file
    pub fn archive(
        &self,
        transcript: &Path,
        target: &ArchiveTarget,
        progress: &mut dyn FnMut(ArchiveProgress),
    ) -> Result<ArchiveReport> {
        archive_transcript(
            &self.storage,
            &self.embedder,
            &self.config,
            transcript,
            target,
            progress,
        )
    }

    /// Replace a fragment's content, re-embedding it
    pub fn update_fragment(&self, id: &str, content: &str) -> Result<bool> {
        let embedding = self.embedder.embed(content, EmbeddingRole::Passage)?;
        Ok(self.storage.update(id, content, &embedding)?)
    }

    /// Budgeted restoration context for a scope
    pub fn restore(
        &self,
        scope: &Scope,
        message_count: usize,
        token_budget: usize,
    ) -> Result<RestorationContext> {
        self.restore_at(scope, message_count, token_budget, Utc::now())
    }

    /// [`restore`](Self::restore) with an explicit clock
    pub fn restore_at(
        &self,
        scope: &Scope,
        message_count: usize,
        token_budget: usize,
        now: DateTime<Utc>,
    ) -> Result<RestorationContext> {
        build_restoration_context(&self.retriever(), scope, message_count, token_budget, now)
    }

    /// One automation step for the running conversation
    pub fn automate(&self, request: &AutomationRequest) -> Result<AutomationReport> {
        run_automation(self, request, Utc::now())
    }

    /// Commit all changes made through this context, then persist the
    /// staged auto-save guard
    pub fn close(self) -> Result<()> {
        self.storage.close()?;
        if let Some(state) = self.pending_state.into_inner() {
            self.state.save(&state)?;
        }
        Ok(())
    }
}
