//! The canonical document model shared by every provider adapter and
//! consumed by the merger and orchestrator (SPEC_FULL.md §3).

use crate::doi::Doi;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable tag identifying which provider produced or contributed to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTag {
    OpenAlex,
    SemanticScholar,
    Crossref,
    Arxiv,
}

impl ProviderTag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderTag::OpenAlex => "openalex",
            ProviderTag::SemanticScholar => "semanticscholar",
            ProviderTag::Crossref => "crossref",
            ProviderTag::Arxiv => "arxiv",
        }
    }

    #[must_use]
    pub fn id_prefix(self) -> &'static str {
        match self {
            ProviderTag::OpenAlex => "oa",
            ProviderTag::SemanticScholar => "ss",
            ProviderTag::Crossref => "cr",
            ProviderTag::Arxiv => "arxiv",
        }
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A contributing author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub provider_author_id: Option<String>,
    pub orcid: Option<String>,
    pub affiliation: Option<String>,
}

impl Author {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_author_id: None,
            orcid: None,
            affiliation: None,
        }
    }

    /// How many optional fields are populated; used by the merger to prefer
    /// "richer" author entries on a tie (SPEC_FULL.md §4.4).
    #[must_use]
    pub fn richness(&self) -> u8 {
        u8::from(self.provider_author_id.is_some())
            + u8::from(self.orcid.is_some())
            + u8::from(self.affiliation.is_some())
    }
}

/// A topical concept attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
    pub score: f64,
    pub provider_concept_id: Option<String>,
}

/// A provider's raw response fragment for one work, preserved verbatim for
/// diagnostics and downstream provider-specific inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SidecarPayload {
    Json(serde_json::Value),
    Xml(String),
}

/// The canonical scholarly document record (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarlyDocument {
    /// Opaque identifier, prefixed with the originating provider's tag, e.g. `oa:W2741809807`.
    pub id: String,
    pub doi: Option<Doi>,
    pub source_provider: ProviderTag,
    /// Which provider's title/year/venue values currently win under fusion
    /// precedence (SPEC_FULL.md §4.4). Starts equal to `source_provider` and
    /// is updated by the merger, never by adapters.
    pub primary_provenance: ProviderTag,

    // discovery layer
    pub title: String,
    pub authors: Vec<Author>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub citation_count: u64,
    pub pdf_url: Option<String>,

    // enrichment layer, only populated once `fully_hydrated` is true
    pub abstract_text: Option<String>,
    pub tldr: Option<String>,
    pub concepts: Vec<Concept>,
    pub references: Vec<String>,
    pub citations: Vec<String>,

    pub sidecar: HashMap<ProviderTag, SidecarPayload>,
    pub fully_hydrated: bool,
    pub confidence: f64,
    pub merged_ids: Vec<String>,
}

impl ScholarlyDocument {
    /// Construct a bare discovery-layer document. Adapters fill in the rest.
    #[must_use]
    pub fn new(source_provider: ProviderTag, native_id: &str, title: impl Into<String>) -> Self {
        Self {
            id: format!("{}:{}", source_provider.id_prefix(), native_id),
            doi: None,
            source_provider,
            primary_provenance: source_provider,
            title: title.into(),
            authors: Vec::new(),
            year: None,
            venue: None,
            citation_count: 0,
            pdf_url: None,
            abstract_text: None,
            tldr: None,
            concepts: Vec::new(),
            references: Vec::new(),
            citations: Vec::new(),
            sidecar: HashMap::new(),
            fully_hydrated: false,
            confidence: 1.0,
            merged_ids: Vec::new(),
        }
    }

    pub fn with_sidecar(mut self, payload: SidecarPayload) -> Self {
        self.sidecar.insert(self.source_provider, payload);
        self
    }

    /// Normalized title used for fuzzy-dedup identity (SPEC_FULL.md §4.4): lowercase,
    /// punctuation stripped, whitespace collapsed.
    #[must_use]
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    /// Jaccard overlap of normalized title word tokens against another
    /// document. `1.0` for titles identical after normalization; used with a
    /// configurable threshold (default 0.90, SPEC_FULL.md §9 Open Question)
    /// so exact-equality dedup is the `threshold == 1.0` special case.
    #[must_use]
    pub fn title_jaccard(&self, other: &ScholarlyDocument) -> f64 {
        let norm_a = self.normalized_title();
        let norm_b = other.normalized_title();
        let a: std::collections::HashSet<&str> = norm_a.split_whitespace().collect();
        let b: std::collections::HashSet<&str> = norm_b.split_whitespace().collect();
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        let intersection = a.intersection(&b).count();
        let union = a.union(&b).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    /// Jaccard overlap of normalized author-name tokens against another document,
    /// used as the fuzzy-dedup tiebreaker when DOIs are absent.
    #[must_use]
    pub fn author_jaccard(&self, other: &ScholarlyDocument) -> f64 {
        let a: std::collections::HashSet<String> = self
            .authors
            .iter()
            .map(|au| au.name.to_lowercase())
            .collect();
        let b: std::collections::HashSet<String> = other
            .authors
            .iter()
            .map(|au| au.name.to_lowercase())
            .collect();
        if a.is_empty() && b.is_empty() {
            return 0.0;
        }
        let intersection = a.intersection(&b).count();
        let union = a.union(&b).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }
}

#[must_use]
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_richness_counts_populated_fields() {
        let bare = Author::new("Jane Doe");
        assert_eq!(bare.richness(), 0);
        let mut rich = bare.clone();
        rich.orcid = Some("0000-0000-0000-0001".into());
        rich.affiliation = Some("MIT".into());
        assert_eq!(rich.richness(), 2);
    }

    #[test]
    fn normalized_title_collapses_punctuation_and_case() {
        assert_eq!(
            normalize_title("The State of OA: A Large-Scale Analysis"),
            "the state of oa a large scale analysis"
        );
    }

    #[test]
    fn author_jaccard_full_overlap_is_one() {
        let mut a = ScholarlyDocument::new(ProviderTag::OpenAlex, "1", "A");
        a.authors = vec![Author::new("Jane Doe"), Author::new("John Roe")];
        let mut b = ScholarlyDocument::new(ProviderTag::Crossref, "2", "A");
        b.authors = vec![Author::new("jane doe"), Author::new("john roe")];
        assert!((a.author_jaccard(&b) - 1.0).abs() < f64::EPSILON);
    }
}
