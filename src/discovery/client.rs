//! Search API clients

use crate::config::SearchConfig;
use crate::discovery::DiscoveryError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// One search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub title: String,
    pub display_link: String,
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Empty when the term has no further results
    pub items: Vec<SearchItem>,

    /// Start index the API reports having used, if it reports one
    pub start_index: Option<u32>,
}

/// An external search API answering `(term, start_index)` queries
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, term: &str, start_index: u32) -> Result<SearchPage, DiscoveryError>;
}

/// Google Custom Search JSON API client
pub struct GoogleSearchClient {
    client: Client,
    api_url: String,
    api_key: String,
    engine_id: String,
}

impl GoogleSearchClient {
    pub fn new(
        client: Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        }
    }

    /// Builds a client from the `[search]` section
    ///
    /// Fails when the API key or the engine id is missing.
    pub fn from_config(client: Client, config: &SearchConfig) -> Result<Self, DiscoveryError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| DiscoveryError::Config("search.api-key is not set".to_string()))?;
        let engine_id = config
            .engine_id
            .as_deref()
            .ok_or_else(|| DiscoveryError::Config("search.engine-id is not set".to_string()))?;

        Ok(Self::new(client, &config.api_url, api_key, engine_id))
    }
}

#[async_trait]
impl SearchClient for GoogleSearchClient {
    async fn search(&self, term: &str, start_index: u32) -> Result<SearchPage, DiscoveryError> {
        tracing::debug!("Searching '{}' from index {}", term, start_index);

        let start = start_index.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", term),
                ("start", start.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DiscoveryError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        parse_google_response(&body)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
    #[serde(default)]
    queries: Option<GoogleQueries>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleItem {
    #[serde(default)]
    title: String,
    display_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleQueries {
    #[serde(default)]
    request: Vec<GoogleRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest {
    start_index: Option<u32>,
}

/// Decodes a Custom Search response body; items without a display link are dropped
fn parse_google_response(body: &str) -> Result<SearchPage, DiscoveryError> {
    let response: GoogleResponse =
        serde_json::from_str(body).map_err(|e| DiscoveryError::Decode(e.to_string()))?;

    let start_index = response
        .queries
        .and_then(|queries| queries.request.into_iter().next())
        .and_then(|request| request.start_index);

    let items = response
        .items
        .into_iter()
        .filter_map(|item| {
            item.display_link.map(|display_link| SearchItem {
                title: item.title,
                display_link,
            })
        })
        .collect();

    Ok(SearchPage { items, start_index })
}
