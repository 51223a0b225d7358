//! OpenAlex adapter (SPEC_FULL.md §4.2 "OpenAlex"), modeled on the
//! `Work`/`Author` wire shapes used by OpenAlex-facing adapters in this
//! codebase family: `id`/`doi` as full URIs, authorships wrapping a nested
//! author, abstracts as an inverted index, topics carrying relevance scores.

use super::{ProviderCapability, ProviderError, ProviderResult, ProviderStats, SourceProvider};
use crate::intent::{SearchIntent, SearchMode};
use crate::model::{Author, Concept, ProviderTag, ScholarlyDocument, SidecarPayload};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const CAPABILITIES: &[ProviderCapability] = &[
    ProviderCapability::TextSearch,
    ProviderCapability::YearFilter,
    ProviderCapability::VenueFilter,
    ProviderCapability::ConceptFilter,
    ProviderCapability::Abstracts,
    ProviderCapability::References,
    ProviderCapability::ConceptTags,
    ProviderCapability::CitationCounts,
    ProviderCapability::PdfUrls,
    ProviderCapability::Pagination,
    ProviderCapability::Statistics,
];

pub struct OpenAlexProvider {
    client: Client,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexProvider {
    pub fn new(mailto: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("scholarfed/0.1 (federated literature search)")
            .build()
            .map_err(|e| ProviderError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: "https://api.openalex.org/works".to_string(),
            mailto,
        })
    }

    fn apply_common(&self, url: &mut Url) {
        if let Some(mailto) = &self.mailto {
            url.query_pairs_mut().append_pair("mailto", mailto);
        }
    }

    fn build_filter(&self, intent: &SearchIntent) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(from) = intent.filters.year_from {
            parts.push(format!("from_publication_date:{from}-01-01"));
        }
        if let Some(to) = intent.filters.year_to {
            parts.push(format!("to_publication_date:{to}-12-31"));
        }
        if intent.filters.open_access_only {
            parts.push("open_access.is_oa:true".to_string());
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(","))
        }
    }

    fn build_search_url(&self, intent: &SearchIntent) -> Url {
        let mut url = Url::parse(&self.base_url).expect("static base URL is valid");
        let page = intent.offset / intent.per_provider_limit.max(1) + 1;
        url.query_pairs_mut()
            .append_pair("search", &intent.query)
            .append_pair("per-page", &intent.per_provider_limit.to_string())
            .append_pair("page", &page.to_string());
        if let Some(filter) = self.build_filter(intent) {
            url.query_pairs_mut().append_pair("filter", &filter);
        }
        self.apply_common(&mut url);
        url
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
        match status.as_u16() {
            429 => ProviderError::RateLimited { retry_after_ms: None },
            503 => ProviderError::Transient("OpenAlex service temporarily unavailable".to_string()),
            code @ 400..=499 => ProviderError::Permanent {
                status: code,
                message: body.chars().take(200).collect(),
            },
            _ => ProviderError::Transient(format!("HTTP {status}")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorksResponse {
    results: Vec<Work>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct Meta {
    count: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct Work {
    id: String,
    doi: Option<String>,
    display_name: Option<String>,
    title: Option<String>,
    publication_year: Option<i32>,
    cited_by_count: Option<i64>,
    primary_location: Option<Location>,
    authorships: Option<Vec<Authorship>>,
    concepts: Option<Vec<WorkConcept>>,
    abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
    referenced_works: Option<Vec<String>>,
    host_venue_display_name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct Location {
    pdf_url: Option<String>,
    source: Option<Source>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct Source {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct Authorship {
    author: AuthorRef,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct AuthorRef {
    display_name: Option<String>,
    id: Option<String>,
    orcid: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct WorkConcept {
    display_name: String,
    score: f64,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroupByYear {
    group_by: Vec<GroupByBucket>,
    meta: Meta,
}

#[derive(Debug, Deserialize)]
struct GroupByBucket {
    key: String,
    count: u64,
}

/// Reconstructs an abstract from OpenAlex's word-to-positions inverted index.
/// Ties are broken by first appearance in the source map.
fn reconstruct_abstract(index: &HashMap<String, Vec<u32>>) -> String {
    let mut positioned: Vec<(u32, &str)> = Vec::new();
    for (word, positions) in index {
        for &pos in positions {
            positioned.push((pos, word.as_str()));
        }
    }
    positioned.sort_by_key(|(pos, _)| *pos);
    positioned
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn work_to_document(work: Work, mode: SearchMode) -> ScholarlyDocument {
    let native_id = work.id.rsplit('/').next().unwrap_or(&work.id).to_string();
    let title = work
        .display_name
        .clone()
        .or_else(|| work.title.clone())
        .unwrap_or_else(|| "untitled".to_string());
    let mut doc = ScholarlyDocument::new(ProviderTag::OpenAlex, &native_id, title);

    if let Some(doi_url) = &work.doi {
        doc.doi = crate::doi::Doi::parse(doi_url);
    }
    doc.year = work.publication_year;
    doc.citation_count = work.cited_by_count.unwrap_or(0).max(0) as u64;
    if let Some(location) = &work.primary_location {
        doc.pdf_url = location.pdf_url.clone();
        doc.venue = location
            .source
            .as_ref()
            .and_then(|s| s.display_name.clone())
            .or_else(|| work.host_venue_display_name.clone());
    }
    if let Some(authorships) = &work.authorships {
        doc.authors = authorships
            .iter()
            .map(|a| {
                let mut author = Author::new(a.author.display_name.clone().unwrap_or_default());
                author.provider_author_id =
                    a.author.id.as_ref().map(|id| id.rsplit('/').next().unwrap_or(id).to_string());
                author.orcid = a
                    .author
                    .orcid
                    .as_ref()
                    .map(|o| o.rsplit('/').next().unwrap_or(o).to_string());
                author
            })
            .collect();
    }
    if mode == SearchMode::Enrichment {
        if let Some(concepts) = &work.concepts {
            doc.concepts = concepts
                .iter()
                .map(|c| Concept {
                    name: c.display_name.clone(),
                    score: c.score,
                    provider_concept_id: c.id.clone(),
                })
                .collect();
        }
        if let Some(index) = &work.abstract_inverted_index {
            doc.abstract_text = Some(reconstruct_abstract(index));
            doc.confidence = 0.95; // reconstructed, not verbatim
        }
        if let Some(refs) = &work.referenced_works {
            doc.references = refs.clone();
        }
        doc.fully_hydrated = doc.abstract_text.is_some() || !doc.concepts.is_empty();
    }

    let payload = serde_json::to_value(&work).unwrap_or(serde_json::Value::Null);
    doc.with_sidecar(SidecarPayload::Json(payload))
}

#[async_trait]
impl SourceProvider for OpenAlexProvider {
    fn id(&self) -> &'static str {
        "openalex"
    }

    fn capabilities(&self) -> &'static [ProviderCapability] {
        CAPABILITIES
    }

    async fn search(&self, intent: &SearchIntent) -> Vec<ProviderResult> {
        let url = self.build_search_url(intent);
        debug!("OpenAlex search URL: {url}");

        let response = match self.client.get(url.as_str()).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("OpenAlex request failed: {e}");
                return vec![ProviderResult::Error {
                    provider: self.id().to_string(),
                    cause: ProviderError::Transient(e.to_string()),
                }];
            }
        };
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return vec![ProviderResult::Error {
                provider: self.id().to_string(),
                cause: Self::classify_status(status, &body),
            }];
        }
        let parsed: Result<WorksResponse, _> = response.json().await;
        match parsed {
            Ok(body) => {
                let has_more = (intent.offset as u64 + body.results.len() as u64) < body.meta.count;
                let total = body.meta.count;
                vec![ProviderResult::Success {
                    documents: body
                        .results
                        .into_iter()
                        .map(|work| work_to_document(work, intent.mode))
                        .collect(),
                    total_available: Some(total),
                    has_more,
                }]
            }
            Err(e) => vec![ProviderResult::Error {
                provider: self.id().to_string(),
                cause: ProviderError::Malformed(e.to_string()),
            }],
        }
    }

    async fn fetch_details(&self, id: &str) -> Result<Option<ScholarlyDocument>, ProviderError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, id))
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        self.apply_common(&mut url);
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }
        let work: Work = response.json().await.map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(Some(work_to_document(work, SearchMode::Enrichment)))
    }

    async fn get_stats(&self, intent: &SearchIntent) -> Result<ProviderStats, ProviderError> {
        let mut url = Url::parse(&self.base_url).expect("static base URL is valid");
        url.query_pairs_mut()
            .append_pair("search", &intent.query)
            .append_pair("group_by", "publication_year");
        if let Some(filter) = self.build_filter(intent) {
            url.query_pairs_mut().append_pair("filter", &filter);
        }
        self.apply_common(&mut url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }
        let parsed: GroupByYear = response.json().await.map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let mut stats = ProviderStats {
            total_count: parsed.meta.count,
            ..Default::default()
        };
        for bucket in parsed.group_by {
            if let Ok(year) = bucket.key.parse::<i32>() {
                stats.year_histogram.insert(year, bucket.count);
            }
        }
        Ok(stats)
    }

    fn debug_query_translation(&self, intent: &SearchIntent) -> String {
        format!("GET {}", self.build_search_url(intent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstructs_abstract_from_inverted_index() {
        let mut index = HashMap::new();
        index.insert("Background".to_string(), vec![0]);
        index.insert(":".to_string(), vec![1]);
        index.insert("Metformin".to_string(), vec![2]);
        index.insert("is".to_string(), vec![3]);
        assert_eq!(reconstruct_abstract(&index), "Background : Metformin is");
    }

    #[test]
    fn native_id_strips_uri_prefix() {
        let work = Work {
            id: "https://openalex.org/W2741809807".to_string(),
            doi: None,
            display_name: Some("A Title".to_string()),
            title: None,
            publication_year: Some(2018),
            cited_by_count: Some(10),
            primary_location: None,
            authorships: None,
            concepts: None,
            abstract_inverted_index: None,
            referenced_works: None,
            host_venue_display_name: None,
        };
        let doc = work_to_document(work, SearchMode::Discovery);
        assert_eq!(doc.id, "oa:W2741809807");
        assert_eq!(doc.citation_count, 10);
    }

    #[test]
    fn discovery_mode_omits_enrichment_fields() {
        let mut index = HashMap::new();
        index.insert("Hello".to_string(), vec![0]);
        let work = Work {
            id: "https://openalex.org/W1".to_string(),
            doi: None,
            display_name: Some("A Title".to_string()),
            title: None,
            publication_year: Some(2020),
            cited_by_count: Some(1),
            primary_location: None,
            authorships: None,
            concepts: Some(vec![WorkConcept { display_name: "Physics".into(), score: 0.9, id: None }]),
            abstract_inverted_index: Some(index),
            referenced_works: Some(vec!["W2".to_string()]),
            host_venue_display_name: None,
        };
        let doc = work_to_document(work, SearchMode::Discovery);
        assert!(doc.abstract_text.is_none());
        assert!(doc.concepts.is_empty());
        assert!(doc.references.is_empty());
        assert!(!doc.fully_hydrated);
    }
}
