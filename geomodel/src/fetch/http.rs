//! HTTP and local file fetcher backed by reqwest.

use std::time::Duration;

use tracing::{debug, info};

use super::{AssetFetcher, BoxFuture, FetchError, LoaderOptions, DEFAULT_FETCH_TIMEOUT};
use crate::asset::{decode_gltf, GltfAsset};

/// Default `User-Agent` sent with model downloads.
pub const DEFAULT_USER_AGENT: &str = concat!("geomodel/", env!("CARGO_PKG_VERSION"));

/// Fetches models over HTTP(S) or from the local filesystem.
///
/// URLs starting with `http://` or `https://` are downloaded; `file://` URLs
/// and plain paths are read from disk. Decoding runs on the blocking pool.
pub struct HttpAssetFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpAssetFetcher {
    /// Creates a fetcher with default timeout and user agent.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_settings(DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT)
    }

    /// Creates a fetcher with a custom default timeout and user agent.
    pub fn with_settings(timeout: Duration, user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    async fn download(&self, url: &str, options: &LoaderOptions) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url).timeout(options.timeout);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Http(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Http(format!("Failed to read response: {}", e)))
    }

    async fn read_local(path: &str) -> Result<Vec<u8>, FetchError> {
        tokio::fs::read(path).await.map_err(|e| FetchError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

impl AssetFetcher for HttpAssetFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        options: LoaderOptions,
    ) -> BoxFuture<'a, Result<GltfAsset, FetchError>> {
        Box::pin(async move {
            let bytes = match local_path(url) {
                Some(path) => Self::read_local(path).await?,
                None => self.download(url, &options).await?,
            };
            debug!(url, bytes = bytes.len(), "Model bytes retrieved");

            let asset = tokio::task::spawn_blocking(move || decode_gltf(&bytes))
                .await
                .map_err(|e| FetchError::Decode(format!("Decode task failed: {}", e)))??;

            info!(
                url,
                animations = asset.animations().len(),
                "Model fetched and decoded"
            );
            Ok(asset)
        })
    }

    fn default_options(&self) -> LoaderOptions {
        LoaderOptions {
            headers: Vec::new(),
            timeout: self.timeout,
        }
    }
}

/// Returns the filesystem path for non-HTTP URLs.
fn local_path(url: &str) -> Option<&str> {
    if url.starts_with("http://") || url.starts_with("https://") {
        None
    } else {
        Some(url.strip_prefix("file://").unwrap_or(url))
    }
}
