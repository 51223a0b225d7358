//! Scholarfed: a federated scholarly-literature retrieval engine that fans
//! search and enrichment requests out across OpenAlex, Semantic Scholar,
//! Crossref, and arXiv, fusing the results into a single deduplicated
//! record per work.

pub mod config;
pub mod doi;
pub mod error;
pub mod facade;
pub mod governor;
pub mod intent;
pub mod legacy;
pub mod merger;
pub mod model;
pub mod orchestrator;
pub mod probe;
pub mod providers;
pub mod resilience;

pub use config::Config;
pub use doi::Doi;
pub use error::{Error, Result};
pub use facade::ScholarFed;
pub use governor::{BucketConfig, Governor};
pub use intent::{DocumentType, SearchFilters, SearchIntent, SearchMode};
pub use legacy::{LegacyBridge, LegacyPage};
pub use merger::{merge, same_work, same_work_with_threshold};
pub use model::{Author, Concept, ProviderTag, ScholarlyDocument, SidecarPayload};
pub use orchestrator::{OrchestratedSearch, Orchestrator, OrchestratorConfig, ProviderOutcome};
pub use probe::{FeasibilityBand, Probe, SignalMetrics};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, RetryPolicy, TimeoutConfig, TimeoutExt};
