//! Legacy bridge (SPEC_FULL.md §4.7).
//!
//! Generalizes the teacher's `MultiProviderAdapter` — a narrower port trait
//! wrapping the richer client, swallowing errors into empty/degraded results
//! while still reporting timing — from its provider-status/health-report
//! surface to a paged, bounded search contract for downstream stages that
//! predate the orchestrator's streaming interface.

use crate::intent::{SearchFilters, SearchIntent, SearchMode};
use crate::model::ScholarlyDocument;
use crate::orchestrator::Orchestrator;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// A single page of the legacy bridge's bounded search contract.
#[derive(Debug, Clone)]
pub struct LegacyPage {
    pub documents: Vec<ScholarlyDocument>,
    pub has_more: bool,
    pub elapsed: Duration,
}

/// Presents the orchestrator as a single paged provider for legacy callers.
pub struct LegacyBridge<'a> {
    orchestrator: &'a Orchestrator,
}

impl<'a> LegacyBridge<'a> {
    #[must_use]
    pub fn new(orchestrator: &'a Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Paged, bounded search. Never returns an error: any underlying
    /// failure degrades to an empty page with the elapsed time preserved
    /// (SPEC_FULL.md §4.7).
    pub async fn search(&self, query: &str, limit: u32, offset: u32, filters: &HashMap<String, String>) -> LegacyPage {
        let start = Instant::now();
        let intent = SearchIntent {
            query: query.to_string(),
            filters: translate_filters(filters),
            mode: SearchMode::Discovery,
            domain_hint: None,
            per_provider_limit: limit,
            offset,
        };

        let result = self.orchestrator.search(&intent).await;
        let failed: Vec<&str> = result.outcomes.iter().filter(|o| o.error.is_some()).map(|o| o.provider.as_str()).collect();
        if !failed.is_empty() {
            warn!("legacy search: providers degraded: {:?}", failed);
        }
        info!("legacy search '{}': {} documents in {:?}", query, result.documents.len(), start.elapsed());

        let has_more = result.documents.len() as u32 >= limit;
        LegacyPage { documents: result.documents, has_more, elapsed: start.elapsed() }
    }
}

/// Recognizes the legacy string-keyed filter map (`from_year`, `to_year`,
/// `has_pdf`, `open_access`) and converts it into structured predicates.
/// Unrecognized keys are ignored; malformed values are ignored rather than
/// causing the whole translation to fail.
fn translate_filters(raw: &HashMap<String, String>) -> SearchFilters {
    let mut filters = SearchFilters::default();
    if let Some(v) = raw.get("from_year").and_then(|s| s.parse().ok()) {
        filters.year_from = Some(v);
    }
    if let Some(v) = raw.get("to_year").and_then(|s| s.parse().ok()) {
        filters.year_to = Some(v);
    }
    if let Some(v) = raw.get("has_pdf").and_then(|s| s.parse().ok()) {
        filters.pdf_only = v;
    }
    if let Some(v) = raw.get("open_access").and_then(|s| s.parse().ok()) {
        filters.open_access_only = v;
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_recognized_keys() {
        let mut raw = HashMap::new();
        raw.insert("from_year".to_string(), "2018".to_string());
        raw.insert("to_year".to_string(), "2022".to_string());
        raw.insert("has_pdf".to_string(), "true".to_string());
        raw.insert("open_access".to_string(), "false".to_string());

        let filters = translate_filters(&raw);
        assert_eq!(filters.year_from, Some(2018));
        assert_eq!(filters.year_to, Some(2022));
        assert!(filters.pdf_only);
        assert!(!filters.open_access_only);
    }

    #[test]
    fn ignores_unrecognized_and_malformed_keys() {
        let mut raw = HashMap::new();
        raw.insert("unknown".to_string(), "whatever".to_string());
        raw.insert("from_year".to_string(), "not-a-year".to_string());

        let filters = translate_filters(&raw);
        assert!(filters.is_empty());
    }
}
