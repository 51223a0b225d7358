//! Semantic Scholar adapter (SPEC_FULL.md §4.2 "Semantic Scholar"): Graph API
//! `paper/search`, `next`/`offset`/`limit` pagination, `externalIds.DOI`,
//! `tldr.text` for the summary field.

use super::{ProviderCapability, ProviderError, ProviderResult, ProviderStats, SourceProvider};
use crate::intent::{SearchIntent, SearchMode};
use crate::model::{Author, ProviderTag, ScholarlyDocument, SidecarPayload};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const CAPABILITIES: &[ProviderCapability] = &[
    ProviderCapability::TextSearch,
    ProviderCapability::Abstracts,
    ProviderCapability::Tldr,
    ProviderCapability::CitationCounts,
    ProviderCapability::References,
    ProviderCapability::Citations,
    ProviderCapability::PdfUrls,
    ProviderCapability::Pagination,
];

const FIELDS: &str =
    "paperId,title,abstract,year,citationCount,authors,externalIds,tldr,openAccessPdf,venue,references,citations";

pub struct SemanticScholarProvider {
    client: Client,
    api_key: Option<String>,
}

impl SemanticScholarProvider {
    pub fn new(api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("scholarfed/0.1 (federated literature search)")
            .build()
            .map_err(|e| ProviderError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_key })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.get(url);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }
        builder
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
        match status.as_u16() {
            429 => ProviderError::RateLimited { retry_after_ms: None },
            503 => ProviderError::Transient("Semantic Scholar service temporarily unavailable".to_string()),
            code @ 400..=499 => ProviderError::Permanent {
                status: code,
                message: body.chars().take(200).collect(),
            },
            _ => ProviderError::Transient(format!("HTTP {status}")),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct SearchResponse {
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    next: Option<u32>,
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct Paper {
    #[serde(rename = "paperId")]
    paper_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default, rename = "citationCount")]
    citation_count: Option<i64>,
    #[serde(default)]
    authors: Vec<PaperAuthor>,
    #[serde(default, rename = "externalIds")]
    external_ids: Option<ExternalIds>,
    #[serde(default)]
    tldr: Option<Tldr>,
    #[serde(default, rename = "openAccessPdf")]
    open_access_pdf: Option<OpenAccessPdf>,
    #[serde(default)]
    venue: Option<String>,
    #[serde(default)]
    references: Option<Vec<RefPaper>>,
    #[serde(default)]
    citations: Option<Vec<RefPaper>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct PaperAuthor {
    #[serde(default, rename = "authorId")]
    author_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
struct ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct Tldr {
    text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct RefPaper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    #[serde(default, rename = "externalIds")]
    external_ids: Option<ExternalIds>,
}

fn ref_id(p: &RefPaper) -> Option<String> {
    p.external_ids
        .as_ref()
        .and_then(|e| e.doi.clone())
        .or_else(|| p.paper_id.clone())
}

fn paper_to_document(paper: Paper, mode: SearchMode) -> ScholarlyDocument {
    let title = paper.title.clone().unwrap_or_else(|| "untitled".to_string());
    let mut doc = ScholarlyDocument::new(ProviderTag::SemanticScholar, &paper.paper_id, title);
    doc.doi = paper
        .external_ids
        .as_ref()
        .and_then(|e| e.doi.as_deref())
        .and_then(crate::doi::Doi::parse);
    doc.year = paper.year;
    doc.citation_count = paper.citation_count.unwrap_or(0).max(0) as u64;
    doc.venue = paper.venue.clone();
    doc.pdf_url = paper.open_access_pdf.as_ref().and_then(|p| p.url.clone());
    doc.authors = paper
        .authors
        .iter()
        .map(|a| {
            let mut author = Author::new(a.name.clone().unwrap_or_default());
            author.provider_author_id = a.author_id.clone();
            author
        })
        .collect();
    if mode == SearchMode::Enrichment {
        doc.abstract_text = paper.abstract_text.clone();
        doc.tldr = paper.tldr.as_ref().and_then(|t| t.text.clone());
        if let Some(refs) = &paper.references {
            doc.references = refs.iter().filter_map(ref_id).collect();
        }
        if let Some(cites) = &paper.citations {
            doc.citations = cites.iter().filter_map(ref_id).collect();
        }
        doc.fully_hydrated = doc.abstract_text.is_some() || doc.tldr.is_some();
    }

    let payload = serde_json::to_value(&paper).unwrap_or(serde_json::Value::Null);
    doc.with_sidecar(SidecarPayload::Json(payload))
}

#[async_trait]
impl SourceProvider for SemanticScholarProvider {
    fn id(&self) -> &'static str {
        "semanticscholar"
    }

    fn capabilities(&self) -> &'static [ProviderCapability] {
        CAPABILITIES
    }

    async fn search(&self, intent: &SearchIntent) -> Vec<ProviderResult> {
        let url = format!(
            "https://api.semanticscholar.org/graph/v1/paper/search?query={}&offset={}&limit={}&fields={}",
            urlencoding::encode(&intent.query),
            intent.offset,
            intent.per_provider_limit,
            FIELDS
        );
        debug!("Semantic Scholar search URL: {url}");

        let response = match self.request(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Semantic Scholar request failed: {e}");
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
        match response.json::<SearchResponse>().await {
            Ok(body) => {
                let has_more = body.next.is_some();
                let total_available = body.total;
                vec![ProviderResult::Success {
                    documents: body
                        .data
                        .into_iter()
                        .map(|paper| paper_to_document(paper, intent.mode))
                        .collect(),
                    total_available,
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
        let url = format!(
            "https://api.semanticscholar.org/graph/v1/paper/{}?fields={}",
            urlencoding::encode(id),
            FIELDS
        );
        let response = self
            .request(&url)
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
        let paper: Paper = response.json().await.map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok(Some(paper_to_document(paper, SearchMode::Enrichment)))
    }

    async fn get_stats(&self, intent: &SearchIntent) -> Result<ProviderStats, ProviderError> {
        // Semantic Scholar's search endpoint has no year-histogram aggregate;
        // approximate total_count from the search response's `total` field.
        let results = self.search(intent).await;
        let mut stats = ProviderStats::default();
        for result in results {
            match result {
                ProviderResult::Success { documents, total_available, .. } => {
                    stats.total_count = total_available.unwrap_or(documents.len() as u64);
                    for doc in &documents {
                        if let Some(year) = doc.year {
                            *stats.year_histogram.entry(year).or_insert(0) += 1;
                        }
                    }
                }
                ProviderResult::Error { cause, .. } => return Err(cause),
            }
        }
        Ok(stats)
    }

    fn debug_query_translation(&self, intent: &SearchIntent) -> String {
        format!(
            "GET https://api.semanticscholar.org/graph/v1/paper/search?query={}&offset={}&limit={}",
            urlencoding::encode(&intent.query),
            intent.offset,
            intent.per_provider_limit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_tldr_and_doi() {
        let paper = Paper {
            paper_id: "abc123".to_string(),
            title: Some("Test Paper".to_string()),
            abstract_text: Some("An abstract".to_string()),
            year: Some(2023),
            citation_count: Some(42),
            authors: vec![PaperAuthor { author_id: Some("a1".into()), name: Some("Jane Doe".into()) }],
            external_ids: Some(ExternalIds { doi: Some("10.1234/x".into()) }),
            tldr: Some(Tldr { text: Some("short summary".into()) }),
            open_access_pdf: None,
            venue: None,
            references: None,
            citations: None,
        };
        let doc = paper_to_document(paper, SearchMode::Enrichment);
        assert_eq!(doc.id, "ss:abc123");
        assert_eq!(doc.doi.unwrap().as_str(), "10.1234/x");
        assert_eq!(doc.tldr.as_deref(), Some("short summary"));
        assert!(doc.fully_hydrated);
    }

    #[test]
    fn missing_tldr_leaves_field_null() {
        let paper = Paper {
            paper_id: "abc123".to_string(),
            title: Some("Test Paper".to_string()),
            abstract_text: None,
            year: None,
            citation_count: None,
            authors: vec![],
            external_ids: None,
            tldr: None,
            open_access_pdf: None,
            venue: None,
            references: None,
            citations: None,
        };
        let doc = paper_to_document(paper, SearchMode::Enrichment);
        assert!(doc.tldr.is_none());
    }

    #[test]
    fn discovery_mode_omits_abstract_and_tldr() {
        let paper = Paper {
            paper_id: "abc123".to_string(),
            title: Some("Test Paper".to_string()),
            abstract_text: Some("An abstract".to_string()),
            year: Some(2023),
            citation_count: Some(42),
            authors: vec![],
            external_ids: None,
            tldr: Some(Tldr { text: Some("short summary".into()) }),
            open_access_pdf: None,
            venue: None,
            references: None,
            citations: None,
        };
        let doc = paper_to_document(paper, SearchMode::Discovery);
        assert!(doc.abstract_text.is_none());
        assert!(doc.tldr.is_none());
        assert!(!doc.fully_hydrated);
    }
}
