use std::time::Duration;

use async_trait::async_trait;
use memesmith_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Image returned by the offline search.
pub const PLACEHOLDER_TEMPLATE_URL: &str = "https://placehold.co/600x400.png";

/// Finds candidate template image URLs for a query.
#[async_trait]
pub trait TemplateSearch: Send + Sync {
    fn provider_id(&self) -> &str;

    /// Image URLs in provider ranking order. Empty when nothing matched.
    async fn search(&self, query: &str) -> Result<Vec<String>>;
}

/// Tavily search API with image results enabled.
pub struct TavilySearch {
    client: Client,
    api_key: String,
    base_url: String,
    max_results: u32,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    include_images: bool,
    search_depth: &'static str,
    max_results: u32,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    images: Vec<TavilyImage>,
}

/// Tavily returns plain URLs, or objects when image descriptions are requested.
#[derive(Deserialize)]
#[serde(untagged)]
enum TavilyImage {
    Url(String),
    Described { url: String },
}

impl TavilyImage {
    fn into_url(self) -> String {
        match self {
            TavilyImage::Url(url) | TavilyImage::Described { url } => url,
        }
    }
}

impl TavilySearch {
    pub fn new(api_key: String, base_url: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://api.tavily.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            max_results: 5,
        }
    }
}

#[async_trait]
impl TemplateSearch for TavilySearch {
    fn provider_id(&self) -> &str {
        "tavily"
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let url = format!("{}/search", self.base_url);
        let body = TavilyRequest {
            query,
            include_images: true,
            search_depth: "basic",
            max_results: self.max_results,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Search(format!("tavily request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Search(format!("tavily returned status {status}")));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| Error::Search(format!("failed to parse tavily response: {}", e.without_url())))?;

        let urls: Vec<String> = parsed
            .images
            .into_iter()
            .map(TavilyImage::into_url)
            .filter(|u| !u.is_empty())
            .collect();
        debug!("tavily returned {} images", urls.len());
        Ok(urls)
    }
}

/// Offline search that always answers with one placeholder image.
pub struct FixedTemplateSearch {
    url: String,
}

impl FixedTemplateSearch {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for FixedTemplateSearch {
    fn default() -> Self {
        Self::new(PLACEHOLDER_TEMPLATE_URL)
    }
}

#[async_trait]
impl TemplateSearch for FixedTemplateSearch {
    fn provider_id(&self) -> &str {
        "fixed"
    }

    async fn search(&self, query: &str) -> Result<Vec<String>> {
        debug!("template search running in mock mode for '{query}'");
        Ok(vec![self.url.clone()])
    }
}
