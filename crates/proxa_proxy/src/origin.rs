use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Typed failure from an origin fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The origin answered, but with a non-success status.
    #[error("origin returned HTTP {status}")]
    Status { status: u16 },

    /// The origin could not be reached, timed out, or the body could not be
    /// read.
    #[error("origin unreachable: {reason}")]
    Transport { reason: String },
}

/// Generic outbound fetcher: the proxy depends on nothing beyond
/// "fetch this URL, give me the body or a typed failure".
#[async_trait]
pub trait OriginClient: Send + Sync {
    /// Fetches `url` and returns the response body. Redirects are followed
    /// transparently.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed origin client used in production.
pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    /// Builds the client with a per-request timeout. reqwest's default
    /// redirect policy already follows up to 10 hops.
    pub fn new(fetch_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OriginClient for HttpOrigin {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!(target: "proxa::proxy", %url, "Fetching from origin");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FetchError::Transport {
            reason: e.to_string(),
        })?;

        Ok(body.to_vec())
    }
}
