use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::error::DownloadError;

/// Something that can produce template image bytes for a URL.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// Streams images over HTTP(S) with a hard size cap.
pub struct HttpImageSource {
    client: Client,
    max_bytes: u64,
}

impl HttpImageSource {
    pub fn new(max_bytes: u64, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("memesmith/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                warn!(
                    "template declares {declared} bytes, over the {} byte limit",
                    self.max_bytes
                );
                return Err(DownloadError::TooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DownloadError::Transport(e.without_url().to_string()))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                warn!("template stream passed the {} byte limit", self.max_bytes);
                return Err(DownloadError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        debug!("downloaded {} bytes", body.len());
        Ok(body)
    }
}
