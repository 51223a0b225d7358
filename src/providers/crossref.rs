//! Crossref adapter (SPEC_FULL.md §4.2 "Crossref"), drawing its date-range
//! filter construction from the `from-pub-date`/`until-pub-date` filter
//! naming used by Crossref query builders in this codebase family.

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
    ProviderCapability::YearFilter,
    ProviderCapability::VenueFilter,
    ProviderCapability::Pagination,
];

pub struct CrossrefProvider {
    client: Client,
    mailto: Option<String>,
}

impl CrossrefProvider {
    pub fn new(mailto: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("scholarfed/0.1 (federated literature search)")
            .build()
            .map_err(|e| ProviderError::Transient(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, mailto })
    }

    fn build_url(&self, intent: &SearchIntent) -> String {
        let mut url = format!(
            "https://api.crossref.org/works?query={}&rows={}&offset={}",
            urlencoding::encode(&intent.query),
            intent.per_provider_limit,
            intent.offset
        );
        let mut filters = Vec::new();
        if let Some(from) = intent.filters.year_from {
            filters.push(format!("from-pub-date:{from}-01-01"));
        }
        if let Some(to) = intent.filters.year_to {
            filters.push(format!("until-pub-date:{to}-12-31"));
        }
        if !filters.is_empty() {
            url.push_str(&format!("&filter={}", urlencoding::encode(&filters.join(","))));
        }
        if let Some(mailto) = &self.mailto {
            url.push_str(&format!("&mailto={}", urlencoding::encode(mailto)));
        }
        url
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
        match status.as_u16() {
            429 => ProviderError::RateLimited { retry_after_ms: None },
            503 => ProviderError::Transient("Crossref service temporarily unavailable".to_string()),
            code @ 400..=499 => ProviderError::Permanent {
                status: code,
                message: body.chars().take(200).collect(),
            },
            _ => ProviderError::Transient(format!("HTTP {status}")),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct CrossrefEnvelope {
    message: Message,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct Message {
    #[serde(rename = "total-results")]
    total_results: Option<u64>,
    items: Option<Vec<CrossrefWork>>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    title: Option<Vec<String>>,
    author: Option<Vec<CrossrefAuthor>>,
    #[serde(rename = "is-referenced-by-count")]
    cited_by_count: Option<i64>,
    #[serde(rename = "container-title")]
    container_title: Option<Vec<String>>,
    #[serde(rename = "published-print")]
    published_print: Option<DatePart>,
    #[serde(rename = "published-online")]
    published_online: Option<DatePart>,
    created: Option<DatePart>,
    indexed: Option<DatePart>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct CrossrefWork {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    title: Option<Vec<String>>,
    author: Option<Vec<CrossrefAuthor>>,
    #[serde(rename = "is-referenced-by-count")]
    cited_by_count: Option<i64>,
    #[serde(rename = "container-title")]
    container_title: Option<Vec<String>>,
    #[serde(rename = "published-print")]
    published_print: Option<DatePart>,
    #[serde(rename = "published-online")]
    published_online: Option<DatePart>,
    created: Option<DatePart>,
    indexed: Option<DatePart>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct CrossrefAuthor {
    given: Option<String>,
    family: Option<String>,
    #[serde(rename = "ORCID")]
    orcid: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
struct DatePart {
    #[serde(rename = "date-parts")]
    date_parts: Vec<Vec<i32>>,
}

impl DatePart {
    fn year(&self) -> Option<i32> {
        self.date_parts.first().and_then(|p| p.first()).copied()
    }
}

fn resolve_year(work: &CrossrefWork) -> Option<i32> {
    work.published_print
        .as_ref()
        .and_then(DatePart::year)
        .or_else(|| work.published_online.as_ref().and_then(DatePart::year))
        .or_else(|| work.created.as_ref().and_then(DatePart::year))
        .or_else(|| work.indexed.as_ref().and_then(DatePart::year))
}

/// Strips simple JATS markup (`<jats:p>`, etc.) from a Crossref abstract.
fn strip_jats(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn work_to_document(native_id: String, work: CrossrefWork, mode: SearchMode) -> ScholarlyDocument {
    let title = work
        .title
        .as_ref()
        .and_then(|t| t.first().cloned())
        .unwrap_or_else(|| "untitled".to_string());
    let mut doc = ScholarlyDocument::new(ProviderTag::Crossref, &native_id, title);
    doc.doi = crate::doi::Doi::parse(&native_id).or_else(|| Some(crate::doi::Doi::trusted(native_id.to_lowercase())));
    doc.year = resolve_year(&work);
    doc.citation_count = work.cited_by_count.unwrap_or(0).max(0) as u64;
    doc.venue = work.container_title.as_ref().and_then(|c| c.first().cloned());
    if let Some(authors) = &work.author {
        doc.authors = authors
            .iter()
            .map(|a| {
                let name = match (&a.given, &a.family) {
                    (Some(g), Some(f)) => format!("{g} {f}"),
                    (None, Some(f)) => f.clone(),
                    (Some(g), None) => g.clone(),
                    (None, None) => String::new(),
                };
                let mut author = Author::new(name);
                author.orcid = a
                    .orcid
                    .as_ref()
                    .map(|o| o.rsplit('/').next().unwrap_or(o).to_string());
                author
            })
            .collect();
    }
    if mode == SearchMode::Enrichment {
        doc.abstract_text = work.abstract_text.as_deref().map(strip_jats);
        doc.fully_hydrated = doc.abstract_text.is_some();
    }

    let payload = serde_json::to_value(&work).unwrap_or(serde_json::Value::Null);
    doc.with_sidecar(SidecarPayload::Json(payload))
}

#[async_trait]
impl SourceProvider for CrossrefProvider {
    fn id(&self) -> &'static str {
        "crossref"
    }

    fn capabilities(&self) -> &'static [ProviderCapability] {
        CAPABILITIES
    }

    async fn search(&self, intent: &SearchIntent) -> Vec<ProviderResult> {
        let url = self.build_url(intent);
        debug!("Crossref search URL: {url}");

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Crossref request failed: {e}");
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
        match response.json::<CrossrefEnvelope>().await {
            Ok(envelope) => {
                let total = envelope.message.total_results.unwrap_or(0);
                let items = envelope.message.items.unwrap_or_default();
                let has_more = (intent.offset as u64 + items.len() as u64) < total;
                let documents = items
                    .into_iter()
                    .filter_map(|w| w.doi.clone().map(|doi| work_to_document(doi, w, intent.mode)))
                    .collect();
                vec![ProviderResult::Success {
                    documents,
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
        let url = format!("https://api.crossref.org/works/{}", urlencoding::encode(id));
        let response = self
            .client
            .get(&url)
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
        let envelope: CrossrefEnvelope = response.json().await.map_err(|e| ProviderError::Malformed(e.to_string()))?;
        let work = CrossrefWork {
            doi: envelope.message.doi.clone().or_else(|| Some(id.to_string())),
            title: envelope.message.title,
            author: envelope.message.author,
            cited_by_count: envelope.message.cited_by_count,
            container_title: envelope.message.container_title,
            published_print: envelope.message.published_print,
            published_online: envelope.message.published_online,
            created: envelope.message.created,
            indexed: envelope.message.indexed,
            abstract_text: envelope.message.abstract_text,
        };
        Ok(Some(work_to_document(id.to_string(), work, SearchMode::Enrichment)))
    }

    async fn get_stats(&self, intent: &SearchIntent) -> Result<ProviderStats, ProviderError> {
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
        format!("GET {}", self.build_url(intent))
    }
}
