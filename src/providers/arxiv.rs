//! arXiv adapter: Atom 1.0 feed parsing (SPEC_FULL.md §4.2 "arXiv").

use super::{ProviderCapability, ProviderError, ProviderResult, ProviderStats, SourceProvider};
use crate::intent::{SearchIntent, SearchMode};
use crate::model::{Concept, ProviderTag, ScholarlyDocument, SidecarPayload};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

const CAPABILITIES: &[ProviderCapability] = &[
    ProviderCapability::TextSearch,
    ProviderCapability::ConceptTags,
    ProviderCapability::PdfUrls,
    ProviderCapability::Pagination,
];

pub struct ArxivProvider {
    client: Client,
    base_url: String,
}

impl ArxivProvider {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("scholarfed/0.1 (federated literature search)")
            .build()
            .map_err(|e| ProviderError::Transient(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: "http://export.arxiv.org/api/query".to_string(),
        })
    }

    fn build_search_url(&self, intent: &SearchIntent) -> String {
        let mut url = Url::parse(&self.base_url).expect("static base URL is valid");
        let search_query = format!("all:\"{}\"", intent.query);
        url.query_pairs_mut()
            .append_pair("search_query", &search_query)
            .append_pair("start", &intent.offset.to_string())
            .append_pair("max_results", &intent.per_provider_limit.to_string())
            .append_pair("sortBy", "relevance")
            .append_pair("sortOrder", "descending");
        url.to_string()
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
        match status.as_u16() {
            429 => ProviderError::RateLimited { retry_after_ms: None },
            503 => ProviderError::Transient("arXiv service temporarily unavailable".to_string()),
            code @ 400..=499 => ProviderError::Permanent {
                status: code,
                message: body.chars().take(200).collect(),
            },
            _ => ProviderError::Transient(format!("HTTP {status}")),
        }
    }

    fn parse_feed(&self, xml: &str, mode: SearchMode) -> Result<Vec<ScholarlyDocument>, ProviderError> {
        use roxmltree::Document;

        let doc = Document::parse(xml).map_err(|e| ProviderError::Malformed(format!("XML parse failed: {e}")))?;
        let mut documents = Vec::new();

        for entry in doc.descendants().filter(|n| n.has_tag_name("entry")) {
            let entry_xml = xml_fragment(xml, &entry);
            let native_id = entry
                .children()
                .find(|n| n.has_tag_name("id"))
                .and_then(|n| n.text())
                .and_then(extract_arxiv_id);
            let Some(native_id) = native_id else { continue };

            let title = entry
                .children()
                .find(|n| n.has_tag_name("title"))
                .and_then(|n| n.text())
                .map(|t| t.trim().split_whitespace().collect::<Vec<_>>().join(" "));
            let Some(title) = title else { continue };

            let mut doc_record = ScholarlyDocument::new(ProviderTag::Arxiv, &native_id, title);

            if let Some(published) = entry
                .children()
                .find(|n| n.has_tag_name("published"))
                .and_then(|n| n.text())
            {
                doc_record.year = published.get(0..4).and_then(|y| y.parse::<i32>().ok());
            }

            for author_node in entry.children().filter(|n| n.has_tag_name("author")) {
                if let Some(name) = author_node
                    .descendants()
                    .find(|n| n.has_tag_name("name"))
                    .and_then(|n| n.text())
                {
                    doc_record
                        .authors
                        .push(crate::model::Author::new(name.trim().to_string()));
                }
            }

            for link in entry.children().filter(|n| n.has_tag_name("link")) {
                if link.attribute("title") == Some("pdf") {
                    if let Some(href) = link.attribute("href") {
                        doc_record.pdf_url = Some(href.to_string());
                    }
                }
            }

            if mode == SearchMode::Enrichment {
                if let Some(summary) = entry
                    .children()
                    .find(|n| n.has_tag_name("summary"))
                    .and_then(|n| n.text())
                {
                    doc_record.abstract_text =
                        Some(summary.trim().split_whitespace().collect::<Vec<_>>().join(" "));
                }

                for category in entry.children().filter(|n| n.has_tag_name("category")) {
                    if let Some(term) = category.attribute("term") {
                        doc_record.concepts.push(Concept {
                            name: term.to_string(),
                            score: 1.0,
                            provider_concept_id: None,
                        });
                    }
                }

                doc_record.fully_hydrated = doc_record.abstract_text.is_some() || !doc_record.concepts.is_empty();
            }

            doc_record = doc_record.with_sidecar(SidecarPayload::Xml(entry_xml));
            documents.push(doc_record);
        }

        Ok(documents)
    }
}

/// Extracts the trailing `NNNN.NNNNN[vN]` segment of an arXiv entry id URL.
fn extract_arxiv_id(id_url: &str) -> Option<String> {
    id_url.rsplit('/').next().map(str::to_string)
}

/// Slices the verbatim `<entry>...</entry>` fragment out of the source feed
/// by byte range, rather than reconstructing one from a subset of children.
fn xml_fragment(xml: &str, node: &roxmltree::Node) -> String {
    xml[node.range()].to_string()
}

impl Default for ArxivProvider {
    fn default() -> Self {
        Self::new().expect("failed to construct ArxivProvider")
    }
}

#[async_trait]
impl SourceProvider for ArxivProvider {
    fn id(&self) -> &'static str {
        "arxiv"
    }

    fn capabilities(&self) -> &'static [ProviderCapability] {
        CAPABILITIES
    }

    async fn search(&self, intent: &SearchIntent) -> Vec<ProviderResult> {
        let start = Instant::now();
        let url = self.build_search_url(intent);
        debug!("arXiv search URL: {url}");

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("arXiv request failed: {e}");
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

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return vec![ProviderResult::Error {
                    provider: self.id().to_string(),
                    cause: ProviderError::Transient(e.to_string()),
                }]
            }
        };

        match self.parse_feed(&body, intent.mode) {
            Ok(documents) => {
                let has_more = documents.len() as u32 >= intent.per_provider_limit;
                info!("arXiv search returned {} entries in {:?}", documents.len(), start.elapsed());
                vec![ProviderResult::Success {
                    documents,
                    total_available: None,
                    has_more,
                }]
            }
            Err(cause) => vec![ProviderResult::Error {
                provider: self.id().to_string(),
                cause,
            }],
        }
    }

    async fn fetch_details(&self, id: &str) -> Result<Option<ScholarlyDocument>, ProviderError> {
        let mut url = Url::parse(&self.base_url).expect("static base URL is valid");
        url.query_pairs_mut()
            .append_pair("id_list", id)
            .append_pair("max_results", "1");
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
        let body = response.text().await.map_err(|e| ProviderError::Transient(e.to_string()))?;
        Ok(self.parse_feed(&body, SearchMode::Enrichment)?.into_iter().next())
    }

    async fn get_stats(&self, intent: &SearchIntent) -> Result<ProviderStats, ProviderError> {
        // arXiv's Atom feed does not expose a `group_by` style statistics
        // endpoint; approximate by fetching one page and reporting its size.
        let results = self.search(intent).await;
        let mut stats = ProviderStats::default();
        for result in results {
            if let ProviderResult::Success { documents, .. } = result {
                stats.total_count = stats.total_count.max(documents.len() as u64);
                for doc in &documents {
                    if let Some(year) = doc.year {
                        *stats.year_histogram.entry(year).or_insert(0) += 1;
                    }
                }
            }
        }
        Ok(stats)
    }

    fn debug_query_translation(&self, intent: &SearchIntent) -> String {
        format!("GET {}", self.build_search_url(intent))
    }
}
