//! Fan-out search orchestration across every configured provider
//! (SPEC_FULL.md §4.5).
//!
//! Generalizes this codebase's `MetaSearchClient::search` pattern — a
//! semaphore-gated `tokio::spawn` per provider, collected back through the
//! join handles, then aggregated — to run two different error-tolerance
//! policies depending on `SearchMode`: discovery silently drops a failing
//! provider, enrichment retries it through the shared `RetryPolicy` and
//! trips its `CircuitBreaker` on repeated failure.

use crate::governor::Governor;
use crate::intent::{SearchIntent, SearchMode};
use crate::merger::{merge, same_work_with_threshold};
use crate::model::ScholarlyDocument;
use crate::providers::{ProviderCapability, ProviderResult, ProviderStats, SourceProvider};
use crate::resilience::{retry_with_policy, CircuitBreaker, CircuitBreakerConfig, RetryPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Tunables for a single fan-out search.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_parallel_providers: usize,
    pub provider_timeout: Duration,
    /// Title-similarity threshold (token Jaccard) for fuzzy dedup when DOIs
    /// are absent. Default 0.90 (SPEC_FULL.md §9 Open Question).
    pub fuzzy_title_jaccard_threshold: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel_providers: 4,
            provider_timeout: Duration::from_secs(30),
            fuzzy_title_jaccard_threshold: 0.90,
        }
    }
}

/// One provider's outcome within a fan-out, kept for the aggregate report
/// even when the orchestrator recovers from it.
#[derive(Debug, Clone)]
pub struct ProviderOutcome {
    pub provider: String,
    pub document_count: usize,
    pub error: Option<String>,
}

/// The merged, deduplicated result of a fan-out search (SPEC_FULL.md §4.5).
#[derive(Debug, Clone)]
pub struct OrchestratedSearch {
    pub documents: Vec<ScholarlyDocument>,
    pub outcomes: Vec<ProviderOutcome>,
    pub elapsed: Duration,
}

/// Owns the provider registry, per-provider circuit breakers, and the shared
/// rate governor for one federated search surface.
pub struct Orchestrator {
    providers: Vec<Arc<dyn SourceProvider>>,
    governor: Arc<Governor>,
    breakers: HashMap<String, Arc<CircuitBreaker>>,
    retry_policy: RetryPolicy,
    config: OrchestratorConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn SourceProvider>>, governor: Arc<Governor>) -> Self {
        Self::with_config(providers, governor, OrchestratorConfig::default())
    }

    #[must_use]
    pub fn with_config(providers: Vec<Arc<dyn SourceProvider>>, governor: Arc<Governor>, config: OrchestratorConfig) -> Self {
        let breakers = providers
            .iter()
            .map(|p| (p.id().to_string(), Arc::new(CircuitBreaker::new(p.id(), CircuitBreakerConfig::default()))))
            .collect();
        Self {
            providers,
            governor,
            breakers,
            retry_policy: RetryPolicy::default(),
            config,
        }
    }

    /// Runs `intent` against every provider in parallel (bounded by
    /// `max_parallel_providers`), merging same-work documents as they land
    /// and returning once every task has settled (SPEC_FULL.md §4.5: no
    /// total ordering guarantee across providers, bounded-window
    /// cancellation via the per-task timeout).
    pub async fn search(&self, intent: &SearchIntent) -> OrchestratedSearch {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_providers));
        let mut tasks = Vec::new();

        // Active providers per SPEC_FULL.md §4.5 step (1): capability supports
        // the intent's text search, and the governor currently has budget.
        let mut active_providers = Vec::new();
        for provider in &self.providers {
            if !provider.supports(ProviderCapability::TextSearch) {
                debug!("{}: skipped, does not support text search", provider.id());
                continue;
            }
            if !self.governor.has_budget(provider.id()).await {
                debug!("{}: skipped, no governor budget available", provider.id());
                continue;
            }
            active_providers.push(provider.clone());
        }

        for provider in active_providers {
            let intent = intent.clone();
            let semaphore = semaphore.clone();
            let governor = self.governor.clone();
            let breaker = self.breakers.get(provider.id()).cloned();
            let retry_policy = self.retry_policy.clone();
            let timeout_duration = self.config.provider_timeout;
            let mode = intent.mode;

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                governor.acquire(provider.id()).await;

                let provider_id = provider.id().to_string();
                let run_once = || {
                    let provider = provider.clone();
                    let intent = intent.clone();
                    async move { dispatch(&*provider, &intent).await }
                };

                let outcome = match mode {
                    SearchMode::Discovery => {
                        // Discovery is best-effort: a slow or failing provider is
                        // dropped silently rather than retried.
                        match tokio::time::timeout(timeout_duration, run_once()).await {
                            Ok(Ok(documents)) => (documents, None),
                            Ok(Err(e)) => {
                                debug!("{provider_id}: discovery search dropped after error: {e}");
                                (Vec::new(), None)
                            }
                            Err(_) => {
                                debug!("{provider_id}: discovery search dropped after timeout");
                                (Vec::new(), None)
                            }
                        }
                    }
                    SearchMode::Enrichment => {
                        let breaker = breaker.clone();
                        let attempt = || {
                            let provider = provider.clone();
                            let intent = intent.clone();
                            let breaker = breaker.clone();
                            async move {
                                let fut = dispatch(&*provider, &intent);
                                match breaker {
                                    Some(breaker) => breaker.call(|| fut).await,
                                    None => fut.await,
                                }
                            }
                        };
                        match tokio::time::timeout(timeout_duration, retry_with_policy(attempt, &retry_policy, &provider_id)).await {
                            Ok(Ok(documents)) => (documents, None),
                            Ok(Err(e)) => {
                                warn!("{provider_id}: enrichment search failed: {e}");
                                (Vec::new(), Some(e.to_string()))
                            }
                            Err(_) => {
                                warn!("{provider_id}: enrichment search timed out");
                                (Vec::new(), Some("timed out".to_string()))
                            }
                        }
                    }
                };

                (provider_id, outcome)
            }));
        }

        let mut outcomes = Vec::new();
        let mut merged: Vec<ScholarlyDocument> = Vec::new();

        for task in tasks {
            let (provider_id, (documents, error)) = match task.await {
                Ok(result) => result,
                Err(join_error) => {
                    warn!("provider task panicked: {join_error}");
                    continue;
                }
            };
            outcomes.push(ProviderOutcome { provider: provider_id, document_count: documents.len(), error });
            for doc in documents {
                fold_in(&mut merged, doc, self.config.fuzzy_title_jaccard_threshold);
            }
        }

        info!("orchestrated search: {} merged documents from {} providers in {:?}", merged.len(), outcomes.len(), start.elapsed());

        OrchestratedSearch { documents: merged, outcomes, elapsed: start.elapsed() }
    }

    /// Aggregates per-provider statistics for a single intent without
    /// materializing documents (used by the probe). Year histograms are
    /// combined by taking the max count per year across providers, and the
    /// total is the max of the providers' reported totals — both are
    /// conservative estimates, never a sum, since providers' result sets
    /// overlap (SPEC_FULL.md §4.6).
    pub async fn get_stats(&self, intent: &SearchIntent) -> ProviderStats {
        let fetches = self.providers.iter().map(|provider| {
            let provider = provider.clone();
            let intent = intent.clone();
            let governor = self.governor.clone();
            async move {
                governor.acquire(provider.id()).await;
                (provider.id(), provider.get_stats(&intent).await)
            }
        });
        let results = futures::future::join_all(fetches).await;

        let mut combined = ProviderStats::default();
        for (provider_id, result) in results {
            match result {
                Ok(stats) => {
                    combined.total_count = combined.total_count.max(stats.total_count);
                    for (year, count) in stats.year_histogram {
                        let entry = combined.year_histogram.entry(year).or_insert(0);
                        *entry = (*entry).max(count);
                    }
                    combined.top_concepts.extend(stats.top_concepts);
                    combined.estimated_wall_time = combined.estimated_wall_time.max(stats.estimated_wall_time);
                }
                Err(e) => warn!("{provider_id}: stats fetch failed: {e}"),
            }
        }
        combined
    }

    /// Hydrates `document` via its originating provider's `fetch_details`,
    /// falling back to any other provider that can resolve the document's
    /// DOI if the originating one lacks enrichment capability or the fetch
    /// comes back empty (SPEC_FULL.md §4.5). Returns `None` only when no
    /// provider can enrich the document at all.
    pub async fn enrich(&self, document: &ScholarlyDocument) -> Option<ScholarlyDocument> {
        let native_id = document.id.splitn(2, ':').nth(1).unwrap_or(&document.id);

        if let Some(provider) = self.provider_by_id(document.source_provider.as_str()) {
            self.governor.acquire(provider.id()).await;
            match provider.fetch_details(native_id).await {
                Ok(Some(detailed)) => return Some(merge(document, &detailed)),
                Ok(None) => {}
                Err(e) => warn!("{}: enrichment fetch failed: {e}", provider.id()),
            }
        }

        let Some(doi) = &document.doi else { return None };
        for provider in &self.providers {
            if provider.id() == document.source_provider.as_str() {
                continue;
            }
            self.governor.acquire(provider.id()).await;
            if let Ok(Some(detailed)) = provider.fetch_details(doi.as_str()).await {
                return Some(merge(document, &detailed));
            }
        }
        None
    }

    fn provider_by_id(&self, id: &str) -> Option<&Arc<dyn SourceProvider>> {
        self.providers.iter().find(|p| p.id() == id)
    }

    #[must_use]
    pub fn providers(&self) -> &[Arc<dyn SourceProvider>] {
        &self.providers
    }
}

async fn dispatch(provider: &dyn SourceProvider, intent: &SearchIntent) -> crate::Result<Vec<ScholarlyDocument>> {
    let mut documents = Vec::new();
    for page in provider.search(intent).await {
        match page {
            ProviderResult::Success { documents: page_docs, .. } => documents.extend(page_docs),
            ProviderResult::Error { provider, cause } => return Err(cause.into_error(&provider)),
        }
    }
    Ok(documents)
}

/// Inserts `doc` into `merged`, fusing it into the first existing entry that
/// `same_work_with_threshold` identifies, or appending it as a new record.
fn fold_in(merged: &mut Vec<ScholarlyDocument>, doc: ScholarlyDocument, title_threshold: f64) {
    if let Some(existing) = merged.iter_mut().find(|d| same_work_with_threshold(d, &doc, title_threshold)) {
        *existing = merge(existing, &doc);
    } else {
        merged.push(doc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::SearchIntent;
    use crate::model::ProviderTag;
    use crate::providers::{ProviderCapability, ProviderStats};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        id: &'static str,
        docs: Vec<ScholarlyDocument>,
        calls: Arc<AtomicUsize>,
        fetch_response: Option<ScholarlyDocument>,
        capabilities: &'static [ProviderCapability],
    }

    impl StubProvider {
        fn new(id: &'static str, docs: Vec<ScholarlyDocument>, calls: Arc<AtomicUsize>) -> Self {
            Self { id, docs, calls, fetch_response: None, capabilities: &[ProviderCapability::TextSearch] }
        }
    }

    #[async_trait]
    impl SourceProvider for StubProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn capabilities(&self) -> &'static [ProviderCapability] {
            self.capabilities
        }

        async fn search(&self, _intent: &SearchIntent) -> Vec<ProviderResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            vec![ProviderResult::Success { documents: self.docs.clone(), total_available: Some(self.docs.len() as u64), has_more: false }]
        }

        async fn fetch_details(&self, _id: &str) -> Result<Option<ScholarlyDocument>, crate::providers::ProviderError> {
            Ok(self.fetch_response.clone())
        }

        async fn get_stats(&self, _intent: &SearchIntent) -> Result<ProviderStats, crate::providers::ProviderError> {
            Ok(ProviderStats::default())
        }

        fn debug_query_translation(&self, _intent: &SearchIntent) -> String {
            String::new()
        }
    }

    fn doc(provider: ProviderTag, id: &str, title: &str) -> ScholarlyDocument {
        ScholarlyDocument::new(provider, id, title)
    }

    #[tokio::test]
    async fn merges_same_work_across_providers() {
        let mut a = doc(ProviderTag::OpenAlex, "1", "A Study");
        a.doi = crate::doi::Doi::parse("10.1038/x");
        let mut b = doc(ProviderTag::Crossref, "2", "A Study (Extended)");
        b.doi = crate::doi::Doi::parse("10.1038/x");

        let calls = Arc::new(AtomicUsize::new(0));
        let providers: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(StubProvider::new("openalex", vec![a], calls.clone())),
            Arc::new(StubProvider::new("crossref", vec![b], calls.clone())),
        ];
        let governor = Arc::new(Governor::with_spec_defaults());
        let orchestrator = Orchestrator::new(providers, governor);

        let result = orchestrator.search(&SearchIntent::discovery("a study")).await;
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].title, "A Study (Extended)");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_works_stay_separate() {
        let a = doc(ProviderTag::OpenAlex, "1", "Topic One");
        let b = doc(ProviderTag::Crossref, "2", "Completely Unrelated Topic");

        let calls = Arc::new(AtomicUsize::new(0));
        let providers: Vec<Arc<dyn SourceProvider>> = vec![
            Arc::new(StubProvider::new("openalex", vec![a], calls.clone())),
            Arc::new(StubProvider::new("crossref", vec![b], calls.clone())),
        ];
        let governor = Arc::new(Governor::with_spec_defaults());
        let orchestrator = Orchestrator::new(providers, governor);

        let result = orchestrator.search(&SearchIntent::discovery("topic")).await;
        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn enrich_hydrates_via_originating_provider() {
        let stub = doc(ProviderTag::OpenAlex, "1", "A Study");
        let mut detailed = stub.clone();
        detailed.abstract_text = Some("full abstract".to_string());
        detailed.fully_hydrated = true;

        let calls = Arc::new(AtomicUsize::new(0));
        let mut provider = StubProvider::new("openalex", vec![], calls);
        provider.fetch_response = Some(detailed);
        let providers: Vec<Arc<dyn SourceProvider>> = vec![Arc::new(provider)];
        let governor = Arc::new(Governor::with_spec_defaults());
        let orchestrator = Orchestrator::new(providers, governor);

        let enriched = orchestrator.enrich(&stub).await.expect("enrichment should succeed");
        assert_eq!(enriched.abstract_text.as_deref(), Some("full abstract"));
        assert!(enriched.fully_hydrated);
    }

    #[tokio::test]
    async fn enrich_falls_back_to_other_provider_by_doi() {
        let mut stub = doc(ProviderTag::OpenAlex, "1", "A Study");
        stub.doi = crate::doi::Doi::parse("10.1038/x");
        let mut detailed = stub.clone();
        detailed.tldr = Some("short".to_string());

        let originating_calls = Arc::new(AtomicUsize::new(0));
        let originating = StubProvider::new("openalex", vec![], originating_calls);

        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let mut fallback = StubProvider::new("crossref", vec![], fallback_calls);
        fallback.fetch_response = Some(detailed);

        let providers: Vec<Arc<dyn SourceProvider>> = vec![Arc::new(originating), Arc::new(fallback)];
        let governor = Arc::new(Governor::with_spec_defaults());
        let orchestrator = Orchestrator::new(providers, governor);

        let enriched = orchestrator.enrich(&stub).await.expect("fallback enrichment should succeed");
        assert_eq!(enriched.tldr.as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn enrich_returns_none_when_no_provider_can_hydrate() {
        let stub = doc(ProviderTag::OpenAlex, "1", "A Study");
        let calls = Arc::new(AtomicUsize::new(0));
        let providers: Vec<Arc<dyn SourceProvider>> = vec![Arc::new(StubProvider::new("openalex", vec![], calls))];
        let governor = Arc::new(Governor::with_spec_defaults());
        let orchestrator = Orchestrator::new(providers, governor);

        assert!(orchestrator.enrich(&stub).await.is_none());
    }

    #[tokio::test]
    async fn search_skips_provider_lacking_text_search_capability() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut provider = StubProvider::new("no-search", vec![doc(ProviderTag::OpenAlex, "1", "A Study")], calls.clone());
        provider.capabilities = &[ProviderCapability::Statistics];
        let providers: Vec<Arc<dyn SourceProvider>> = vec![Arc::new(provider)];
        let governor = Arc::new(Governor::with_spec_defaults());
        let orchestrator = Orchestrator::new(providers, governor);

        let result = orchestrator.search(&SearchIntent::discovery("a study")).await;
        assert!(result.documents.is_empty());
        assert!(result.outcomes.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn search_skips_provider_without_governor_budget() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = StubProvider::new("exhausted", vec![doc(ProviderTag::OpenAlex, "1", "A Study")], calls.clone());
        let providers: Vec<Arc<dyn SourceProvider>> = vec![Arc::new(provider)];

        let mut defaults = HashMap::new();
        defaults.insert("exhausted".to_string(), crate::governor::BucketConfig { capacity: 1.0, refill_per_second: 0.0 });
        let governor = Arc::new(Governor::new(defaults));
        governor.acquire("exhausted").await; // drain the single token

        let orchestrator = Orchestrator::new(providers, governor);
        let result = orchestrator.search(&SearchIntent::discovery("a study")).await;
        assert!(result.documents.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
