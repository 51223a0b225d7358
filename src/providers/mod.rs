//! Provider adapter contract (SPEC_FULL.md §4.2).
//!
//! Generalizes the capability-contract idiom this codebase already uses for
//! its source providers (`SourceProvider`): a narrow async trait plus a
//! capability set, rather than a class hierarchy (SPEC_FULL.md §9).

pub mod arxiv;
pub mod crossref;
pub mod openalex;
pub mod semantic_scholar;

use crate::intent::SearchIntent;
use crate::model::ScholarlyDocument;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// A capability a provider may or may not support. The orchestrator consults
/// this set before dispatching an intent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCapability {
    TextSearch,
    YearFilter,
    TypeFilter,
    VenueFilter,
    ConceptFilter,
    Abstracts,
    References,
    Citations,
    Tldr,
    ConceptTags,
    CitationCounts,
    PdfUrls,
    Pagination,
    Statistics,
}

/// Per-year publication/citation counts, used by the probe's trend analysis.
pub type YearHistogram = std::collections::BTreeMap<i32, u64>;

/// Aggregated provider statistics for a single intent, without materializing documents.
#[derive(Debug, Clone, Default)]
pub struct ProviderStats {
    pub total_count: u64,
    pub year_histogram: YearHistogram,
    pub top_concepts: Vec<(String, f64)>,
    pub estimated_wall_time: Duration,
}

/// Causes classified per SPEC_FULL.md §4.2 / §7.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transient(String),

    #[error("rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("permanent error: {status} {message}")]
    Permanent { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),
}

impl ProviderError {
    #[must_use]
    pub fn retry_permitted(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::RateLimited { .. })
    }

    /// Attaches the originating provider id, producing the crate-wide `Error`
    /// the orchestrator's retry policy and circuit breakers operate on.
    #[must_use]
    pub fn into_error(self, provider: &str) -> crate::Error {
        match self {
            ProviderError::Transient(message) => {
                crate::Error::ServiceUnavailable { provider: provider.to_string(), message }
            }
            ProviderError::RateLimited { retry_after_ms } => crate::Error::RateLimited {
                provider: provider.to_string(),
                retry_after: retry_after_ms.map(Duration::from_millis),
            },
            ProviderError::Permanent { status, message } => {
                crate::Error::Permanent { provider: provider.to_string(), status, message }
            }
            ProviderError::Malformed(message) => {
                crate::Error::Malformed { provider: provider.to_string(), message }
            }
            ProviderError::CapabilityMismatch(reason) => {
                crate::Error::CapabilityMismatch { provider: provider.to_string(), reason }
            }
        }
    }
}

/// One page of results, or a terminal error, from a provider's search stream.
#[derive(Debug, Clone)]
pub enum ProviderResult {
    Success {
        documents: Vec<ScholarlyDocument>,
        total_available: Option<u64>,
        has_more: bool,
    },
    Error {
        provider: String,
        cause: ProviderError,
    },
}

/// The four-operation provider contract (SPEC_FULL.md §4.2).
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Stable identifier, e.g. `"openalex"`.
    fn id(&self) -> &'static str;

    fn capabilities(&self) -> &'static [ProviderCapability];

    fn supports(&self, capability: ProviderCapability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Execute a search, returning pages until exhausted or an error terminates the stream.
    async fn search(&self, intent: &SearchIntent) -> Vec<ProviderResult>;

    /// Fetch a single fully-hydrated document by this provider's native or DOI identifier.
    async fn fetch_details(&self, id: &str) -> Result<Option<ScholarlyDocument>, ProviderError>;

    /// Aggregate statistics for an intent without materializing documents.
    async fn get_stats(&self, intent: &SearchIntent) -> Result<ProviderStats, ProviderError>;

    /// Human-readable description of the wire request this intent would produce.
    fn debug_query_translation(&self, intent: &SearchIntent) -> String;
}

/// Extra per-adapter request parameters not covered by `SearchIntent`,
/// mirroring the teacher's `SearchQuery::params` escape hatch.
pub type ExtraParams = HashMap<String, String>;
