//! Registry page fetching.
//!
//! Pages are requested one after another from `{endpoint}/studies`, each
//! carrying the previous page's `nextPageToken` as `pageToken`. A page that
//! fails (transport, status or decode) ends the sequence; whatever was
//! fetched before it is kept.

use crate::config::toml_config::SourceConfig;
use crate::core::{Extraction, RawRecord};
use crate::utils::error::{EtlError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudiesPage {
    #[serde(default)]
    studies: Vec<RawRecord>,
    next_page_token: Option<String>,
}

pub struct PaginatedFetcher {
    client: Client,
    url: String,
    page_size: u32,
    parameters: Vec<(String, String)>,
    max_pages: Option<usize>,
    token: Option<String>,
    pages: usize,
    finished: bool,
    failed: bool,
}

impl PaginatedFetcher {
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &source.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                EtlError::InvalidConfigValueError {
                    field: "source.headers".to_string(),
                    value: key.clone(),
                    reason: e.to_string(),
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                EtlError::InvalidConfigValueError {
                    field: format!("source.headers.{}", key),
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .user_agent(source.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(source.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: source.studies_url(),
            page_size: source.page_size,
            parameters: source
                .parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            max_pages: source.max_pages,
            token: None,
            pages: 0,
            finished: false,
            failed: false,
        })
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Next page of studies, or `None` once the sequence has ended.
    pub async fn next_page(&mut self) -> Option<Vec<RawRecord>> {
        if self.finished {
            return None;
        }

        if let Some(max_pages) = self.max_pages {
            if self.pages >= max_pages {
                tracing::info!(
                    "📄 Reached max_pages ({}), more results remain on the server",
                    max_pages
                );
                self.finished = true;
                return None;
            }
        }

        match self.request_page().await {
            Ok(page) => {
                self.pages += 1;
                let next = page.next_page_token.filter(|t| !t.is_empty());
                if next.is_some() && next == self.token {
                    tracing::warn!(
                        "⚠️ Page {} returned the token it was requested with, stopping pagination",
                        self.pages
                    );
                    self.finished = true;
                }
                self.token = next;
                if self.token.is_none() {
                    self.finished = true;
                }
                tracing::debug!(
                    "📄 Page {}: {} studies, more pages: {}",
                    self.pages,
                    page.studies.len(),
                    !self.finished
                );
                Some(page.studies)
            }
            Err(e) => {
                let page_number = self.pages + 1;
                match &e {
                    EtlError::ApiError(err) => {
                        tracing::error!("❌ Transport error on page {}: {}", page_number, err)
                    }
                    EtlError::SerializationError(err) => {
                        tracing::error!("❌ Failed to decode JSON on page {}: {}", page_number, err)
                    }
                    other => tracing::error!("❌ Failed to fetch page {}: {}", page_number, other),
                }
                self.finished = true;
                self.failed = true;
                None
            }
        }
    }

    /// Follows continuation tokens until exhausted, capped or failed.
    pub async fn fetch_all(mut self) -> Extraction {
        let mut records = Vec::new();
        while let Some(studies) = self.next_page().await {
            records.extend(studies);
        }

        if self.failed {
            tracing::warn!(
                "⚠️ Pagination stopped early, keeping {} studies from {} pages",
                records.len(),
                self.pages
            );
        }

        Extraction {
            records,
            pages: self.pages,
            complete: !self.failed,
        }
    }

    async fn request_page(&self) -> Result<StudiesPage> {
        let mut request = self
            .client
            .get(&self.url)
            .query(&[("pageSize", self.page_size.to_string())])
            .query(&self.parameters);

        if let Some(token) = &self.token {
            request = request.query(&[("pageToken", token)]);
        }

        tracing::debug!("Requesting {} (page {})", self.url, self.pages + 1);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::ProcessingError {
                message: format!("HTTP {}", status),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
