//! Core facade surface (SPEC_FULL.md §6): the single entry point downstream
//! callers construct, wiring configuration into the provider registry,
//! governor, orchestrator, probe, and legacy bridge.

use crate::config::Config;
use crate::governor::{BucketConfig, Governor};
use crate::intent::{SearchFilters, SearchIntent, SearchMode};
use crate::legacy::{LegacyBridge, LegacyPage};
use crate::model::ScholarlyDocument;
use crate::orchestrator::{OrchestratedSearch, Orchestrator, OrchestratorConfig};
use crate::probe::{Probe, SignalMetrics};
use crate::providers::arxiv::ArxivProvider;
use crate::providers::crossref::CrossrefProvider;
use crate::providers::openalex::OpenAlexProvider;
use crate::providers::semantic_scholar::SemanticScholarProvider;
use crate::providers::{SourceProvider, YearHistogram};
use std::collections::HashMap;
use std::sync::Arc;

/// Federated scholarly search surface. Owns the orchestrator and exposes the
/// search/enrich/probe operations callers reach for (SPEC_FULL.md §6).
pub struct ScholarFed {
    orchestrator: Orchestrator,
}

impl ScholarFed {
    /// Builds the provider registry and governor from `config`, instantiating
    /// every adapter this crate ships (SPEC_FULL.md §9: a registry holds
    /// adapters by identifier, the orchestrator iterates the registry).
    pub fn new(config: &Config) -> crate::Result<Self> {
        let mut providers: Vec<Arc<dyn SourceProvider>> = Vec::new();
        providers.push(Arc::new(OpenAlexProvider::new(config.credentials.openalex_mailto.clone()).map_err(|e| e.into_error("openalex"))?));
        providers.push(Arc::new(CrossrefProvider::new(config.credentials.crossref_mailto.clone()).map_err(|e| e.into_error("crossref"))?));
        providers.push(Arc::new(
            SemanticScholarProvider::new(config.credentials.semantic_scholar_api_key.clone()).map_err(|e| e.into_error("semanticscholar"))?,
        ));
        providers.push(Arc::new(ArxivProvider::new().map_err(|e| e.into_error("arxiv"))?));

        let governor = Arc::new(Governor::new(Self::bucket_defaults(config, &providers)));
        let orchestrator_config = OrchestratorConfig {
            max_parallel_providers: config.max_parallel_providers,
            fuzzy_title_jaccard_threshold: config.fuzzy_title_jaccard_threshold,
            ..OrchestratorConfig::default()
        };
        Ok(Self { orchestrator: Orchestrator::with_config(providers, governor, orchestrator_config) })
    }

    fn bucket_defaults(config: &Config, providers: &[Arc<dyn SourceProvider>]) -> HashMap<String, BucketConfig> {
        providers
            .iter()
            .map(|p| {
                let id = p.id().to_string();
                let spec_default = Governor::spec_default_for(&id);
                (id.clone(), config.bucket_for(&id, spec_default))
            })
            .collect()
    }

    /// Discovery-mode search over a bare query string (SPEC_FULL.md §6:
    /// `search(query, filters?, maxResults?)`).
    pub async fn search(&self, query: &str, filters: SearchFilters, max_results: u32) -> OrchestratedSearch {
        let intent = SearchIntent {
            query: query.to_string(),
            filters,
            mode: SearchMode::Discovery,
            domain_hint: None,
            per_provider_limit: max_results,
            offset: 0,
        };
        self.orchestrator.search(&intent).await
    }

    /// Full-control search (SPEC_FULL.md §6: `searchWithIntent(intent)`).
    pub async fn search_with_intent(&self, intent: &SearchIntent) -> OrchestratedSearch {
        self.orchestrator.search(intent).await
    }

    /// Hydrates `document` via its originating or a DOI-matching provider
    /// (SPEC_FULL.md §6: `enrich(document)`).
    pub async fn enrich(&self, document: &ScholarlyDocument) -> Option<ScholarlyDocument> {
        self.orchestrator.enrich(document).await
    }

    /// Scope probe over a bare query string (SPEC_FULL.md §6: `getStats(query, filters?)`).
    pub async fn get_stats(&self, query: &str, filters: SearchFilters) -> crate::providers::ProviderStats {
        let intent = SearchIntent { query: query.to_string(), filters, mode: SearchMode::Discovery, domain_hint: None, per_provider_limit: 0, offset: 0 };
        self.orchestrator.get_stats(&intent).await
    }

    /// Feasibility and trend signal for a bare query (SPEC_FULL.md §6:
    /// `probeSignalStrength(query)`).
    pub async fn probe_signal_strength(&self, query: &str) -> SignalMetrics {
        Probe::new(&self.orchestrator).signal_strength(&SearchIntent::discovery(query)).await
    }

    /// Per-year publication counts, optionally clipped to `[year_start, year_end]`
    /// (SPEC_FULL.md §6: `probeTrendLine(query, yearStart?, yearEnd?)`).
    pub async fn probe_trend_line(&self, query: &str, year_start: Option<i32>, year_end: Option<i32>) -> YearHistogram {
        Probe::new(&self.orchestrator).trend_line(&SearchIntent::discovery(query), year_start, year_end).await
    }

    /// Feasibility signal for each query, run concurrently (SPEC_FULL.md §6:
    /// `compareQueries(list<query>)`).
    pub async fn compare_queries(&self, queries: Vec<String>) -> HashMap<String, SignalMetrics> {
        let intents = queries.into_iter().map(SearchIntent::discovery).collect();
        Probe::new(&self.orchestrator).compare(intents).await
    }

    /// Presents this facade's orchestrator behind the paged, bounded legacy
    /// contract (SPEC_FULL.md §4.7).
    pub async fn legacy_search(&self, query: &str, limit: u32, offset: u32, filters: &HashMap<String, String>) -> LegacyPage {
        LegacyBridge::new(&self.orchestrator).search(query, limit, offset, filters).await
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_default_config() {
        let config = Config::default();
        let facade = ScholarFed::new(&config);
        assert!(facade.is_ok());
        assert_eq!(facade.unwrap().orchestrator().providers().len(), 4);
    }
}
