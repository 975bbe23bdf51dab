//! Memory module - Core types and data structures
//!
//! - Fragments: the stored unit of archived memory
//! - Scopes: project partitioning for retrieval and statistics
//! - Ranked results with fusion provenance
//! - Content fingerprints for deduplication

mod fingerprint;

pub use fingerprint::{fingerprint, FINGERPRINT_HEX_LEN};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// FRAGMENT
// ============================================================================

/// A stored unit of archived memory text plus its embedding and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    /// Unique identifier (UUID v4), stable for the fragment's lifetime
    pub id: String,
    /// Trimmed text body
    pub content: String,
    /// Deduplication key derived from the trimmed content
    pub fingerprint: String,
    /// Passage-role embedding vector
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// Project grouping key (`None` = global)
    pub project: Option<String>,
    /// Ingestion session / transcript that produced the fragment
    pub source_session: Option<String>,
    /// Logical creation time (back-dated from transcript metadata when known)
    pub timestamp: DateTime<Utc>,
    /// When the row was written
    pub created_at: DateTime<Utc>,
}

impl Fragment {
    /// Project label for display
    pub fn project_label(&self) -> &str {
        self.project.as_deref().unwrap_or(GLOBAL_PROJECT)
    }
}

/// Input for inserting a fragment
#[derive(Debug, Clone, Default)]
pub struct FragmentDraft {
    /// Raw content (trimmed before fingerprinting and storage)
    pub content: String,
    /// Passage-role embedding of the content
    pub embedding: Vec<f32>,
    /// Project grouping key
    pub project: Option<String>,
    /// Ingestion session id
    pub source_session: Option<String>,
    /// Logical timestamp; defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

/// Result of `insert_or_detect_duplicate`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    /// Id of the new fragment, or of the existing one on a duplicate
    pub id: String,
    /// True when the fingerprint already existed and nothing was written
    pub is_duplicate: bool,
}

// ============================================================================
// SCOPE
// ============================================================================

/// Label used for fragments with no project
pub const GLOBAL_PROJECT: &str = "global";

/// Partition selector for listing, statistics and retrieval
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "name")]
pub enum Scope {
    /// Every fragment regardless of project
    #[default]
    All,
    /// Fragments stored without a project
    Global,
    /// Fragments belonging to one project
    Project(String),
}

impl Scope {
    /// Build a scope from an optional CLI-style project name
    ///
    /// `None` selects everything, `"global"` selects project-less fragments.
    pub fn from_project(project: Option<&str>) -> Self {
        match project.map(str::trim) {
            None | Some("") => Scope::All,
            Some(p) if p.eq_ignore_ascii_case(GLOBAL_PROJECT) => Scope::Global,
            Some(p) => Scope::Project(p.to_string()),
        }
    }

    /// The project key fragments written under this scope should carry
    pub fn write_project(&self) -> Option<String> {
        match self {
            Scope::Project(p) => Some(p.clone()),
            Scope::All | Scope::Global => None,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::All => write!(f, "all projects"),
            Scope::Global => write!(f, "{}", GLOBAL_PROJECT),
            Scope::Project(p) => write!(f, "{}", p),
        }
    }
}

// ============================================================================
// RANKING
// ============================================================================

/// Which candidate list(s) a fused result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Vector (embedding) list only
    Vector,
    /// Keyword list only
    Keyword,
    /// Both lists
    Hybrid,
}

impl Provenance {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Vector => "vector",
            Provenance::Keyword => "keyword",
            Provenance::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A candidate id with the score its source list assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    /// Fragment id
    pub id: String,
    /// Source-specific score (cosine similarity, BM25, or synthetic)
    pub score: f64,
}

impl ScoredId {
    /// Create a new scored id
    pub fn new(id: impl Into<String>, score: f64) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// A fragment in a final ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedFragment {
    /// The fragment
    pub fragment: Fragment,
    /// Score after recency decay
    pub score: f64,
    /// RRF score before decay
    pub fused_score: f64,
    /// Which lists contributed
    pub provenance: Provenance,
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Aggregate statistics over a scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Number of fragments
    pub fragment_count: i64,
    /// Distinct ingestion sessions
    pub session_count: i64,
    /// Oldest fragment timestamp
    pub oldest: Option<DateTime<Utc>>,
    /// Newest fragment timestamp
    pub newest: Option<DateTime<Utc>>,
    /// Content bytes plus embedding bytes
    pub size_bytes: i64,
}
