use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use crate::application::error::ApplicationError;

/// Result of the lightweight type probe made before any body is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProbe {
    /// Where the redirect chain ended.
    pub final_url: Url,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteBody {
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<RemoteProbe, ApplicationError>;

    /// Fetches the body, failing once more than `max_bytes` arrive.
    async fn fetch(&self, url: &Url, max_bytes: u64) -> Result<RemoteBody, ApplicationError>;
}

/// Only absolute `http`/`https` URLs with a host are fetched.
pub fn parse_remote_url(raw: &str) -> Result<Url, ApplicationError> {
    let raw = raw.trim();
    if !raw.starts_with("http://") && !raw.starts_with("https://") {
        return Err(ApplicationError::InvalidUrl);
    }
    let url = Url::parse(raw).map_err(|_| ApplicationError::InvalidUrl)?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ApplicationError::InvalidUrl),
    }
}
