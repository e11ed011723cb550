use std::{future::Future, time::Duration};

use super::ThumbnailError;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Byte-level access to media files.
pub trait MediaSource: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ThumbnailError>> + Send;

    /// Cheap existence probe. Any failure counts as missing.
    fn exists(&self, url: &str) -> impl Future<Output = bool> + Send;
}

pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self, ThumbnailError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| ThumbnailError::Fetch(error.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Absolute URLs pass through; anything else is joined onto the base URL.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_owned();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl MediaSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ThumbnailError> {
        let url = self.resolve_url(url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| ThumbnailError::Fetch(format!("{url}: {error}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| ThumbnailError::Fetch(format!("{url}: {error}")))?;
        Ok(bytes.to_vec())
    }

    async fn exists(&self, url: &str) -> bool {
        let url = self.resolve_url(url);
        match self.client.head(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                log::debug!("HEAD {url} failed: {error}");
                false
            }
        }
    }
}
