//! Application configuration (SPEC_FULL.md §2 ambient stack, §9).
//!
//! Layers, lowest to highest precedence: compiled-in defaults, an optional
//! TOML file, then environment variables prefixed `SCHOLARFED_`. Uses the
//! `config` crate for the file layer and `envy` for the environment layer,
//! matching this codebase's existing `config`/`envy` dependency pair.

use crate::governor::BucketConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Per-provider contact and auth settings, all optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub openalex_mailto: Option<String>,
    pub crossref_mailto: Option<String>,
    pub semantic_scholar_api_key: Option<String>,
}

/// Overrides the built-in bucket defaults for one provider, leaving unset
/// fields at `Governor::with_spec_defaults()`'s values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateOverride {
    pub capacity: Option<f64>,
    pub refill_per_second: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub credentials: ProviderCredentials,
    /// Provider id (e.g. `"openalex"`) to its bucket override.
    pub rate_overrides: HashMap<String, RateOverride>,
    pub http_timeout_secs: u64,
    /// Title-similarity threshold (token Jaccard) used by the merger and
    /// orchestrator to fuse documents lacking a shared DOI. Documented in
    /// two places in the system this was distilled from with different
    /// values (85% and 97%); this crate standardizes on 0.90 and reads it
    /// from exactly one place so the merger and orchestrator never disagree
    /// (SPEC_FULL.md §9 Open Question).
    pub fuzzy_title_jaccard_threshold: f64,
    pub max_parallel_providers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: ProviderCredentials::default(),
            rate_overrides: HashMap::new(),
            http_timeout_secs: 30,
            fuzzy_title_jaccard_threshold: 0.90,
            max_parallel_providers: 4,
        }
    }
}

impl Config {
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Loads configuration by layering compiled-in defaults, an optional
    /// TOML file at `path`, and `SCHOLARFED_`-prefixed environment
    /// variables, in that order of precedence.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let defaults = config::Config::try_from(&Self::default())?;
        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }
        let layered: Self = builder.build()?.try_deserialize()?;
        Ok(layered.apply_env_overrides())
    }

    /// Applies `SCHOLARFED_*` environment overrides on top of `self`. Kept
    /// separate from `load` so tests can exercise env-layering without
    /// touching the filesystem.
    #[must_use]
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(overrides) = envy::prefixed("SCHOLARFED_").from_env::<EnvOverrides>() {
            if let Some(v) = overrides.openalex_mailto {
                self.credentials.openalex_mailto = Some(v);
            }
            if let Some(v) = overrides.crossref_mailto {
                self.credentials.crossref_mailto = Some(v);
            }
            if let Some(v) = overrides.semantic_scholar_api_key {
                self.credentials.semantic_scholar_api_key = Some(v);
            }
            if let Some(v) = overrides.http_timeout_secs {
                self.http_timeout_secs = v;
            }
            if let Some(v) = overrides.fuzzy_title_jaccard_threshold {
                self.fuzzy_title_jaccard_threshold = v;
            }
            if let Some(v) = overrides.max_parallel_providers {
                self.max_parallel_providers = v;
            }
        }
        self
    }

    /// Resolves the effective bucket configuration for `provider_id`,
    /// applying this config's override on top of the spec defaults.
    #[must_use]
    pub fn bucket_for(&self, provider_id: &str, spec_default: BucketConfig) -> BucketConfig {
        match self.rate_overrides.get(provider_id) {
            Some(r) => BucketConfig {
                capacity: r.capacity.unwrap_or(spec_default.capacity),
                refill_per_second: r.refill_per_second.unwrap_or(spec_default.refill_per_second),
            },
            None => spec_default,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct EnvOverrides {
    openalex_mailto: Option<String>,
    crossref_mailto: Option<String>,
    semantic_scholar_api_key: Option<String>,
    http_timeout_secs: Option<u64>,
    fuzzy_title_jaccard_threshold: Option<f64>,
    max_parallel_providers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.http_timeout_secs, 30);
        assert!((config.fuzzy_title_jaccard_threshold - 0.90).abs() < f64::EPSILON);
    }

    #[test]
    fn bucket_override_fills_only_set_fields() {
        let mut config = Config::default();
        config.rate_overrides.insert("arxiv".to_string(), RateOverride { capacity: Some(5.0), refill_per_second: None });
        let spec_default = BucketConfig { capacity: 1.0, refill_per_second: 1.0 / 3.0 };
        let resolved = config.bucket_for("arxiv", spec_default);
        assert_eq!(resolved.capacity, 5.0);
        assert!((resolved.refill_per_second - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unconfigured_provider_falls_back_to_spec_default() {
        let config = Config::default();
        let spec_default = BucketConfig { capacity: 10.0, refill_per_second: 1.0 };
        let resolved = config.bucket_for("openalex", spec_default);
        assert_eq!(resolved.capacity, spec_default.capacity);
    }
}
