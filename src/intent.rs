//! Search intent and filters (SPEC_FULL.md §3).

use serde::{Deserialize, Serialize};

/// Which document layer a search should populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Identity and headline fields only.
    Discovery,
    /// Discovery fields plus abstract, references, citations, concepts, TLDR.
    Enrichment,
}

/// Document type, used by `SearchFilters::document_types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    Article,
    Preprint,
    BookChapter,
    Dataset,
    Review,
    Other,
}

/// Predicate set applied on top of a query string. An empty filter set
/// matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub pdf_only: bool,
    pub document_types: Vec<DocumentType>,
    pub venue_whitelist: Vec<String>,
    pub concept_whitelist: Vec<String>,
    pub open_access_only: bool,
}

impl SearchFilters {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.year_from.is_none()
            && self.year_to.is_none()
            && !self.pdf_only
            && self.document_types.is_empty()
            && self.venue_whitelist.is_empty()
            && self.concept_whitelist.is_empty()
            && !self.open_access_only
    }

    #[must_use]
    pub fn needs_year_filter(&self) -> bool {
        self.year_from.is_some() || self.year_to.is_some()
    }
}

/// A structured request handed to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIntent {
    pub query: String,
    pub filters: SearchFilters,
    pub mode: SearchMode,
    pub domain_hint: Option<String>,
    pub per_provider_limit: u32,
    pub offset: u32,
}

impl SearchIntent {
    #[must_use]
    pub fn discovery(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            filters: SearchFilters::default(),
            mode: SearchMode::Discovery,
            domain_hint: None,
            per_provider_limit: 25,
            offset: 0,
        }
    }

    #[must_use]
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.per_provider_limit = limit;
        self
    }
}
