use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use reqwest::{header, redirect, Client, ClientBuilder, Response, Url};
use tracing::debug;

use crate::{
    application::{
        error::ApplicationError,
        services::remote_source::{RemoteBody, RemoteProbe, RemoteSource},
    },
    services::error::FetchError,
};

pub const MAX_REDIRECTS: usize = 4;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpRemoteSource {
    client: Client,
}

impl HttpRemoteSource {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            client: client_builder().build()?,
        })
    }

    /// Streams the body into memory, refusing an oversized `Content-Length`
    /// up front and a body that grows past `max_bytes` without one.
    async fn download(&self, url: &Url, max_bytes: u64) -> Result<RemoteBody, FetchError> {
        let mut response = self.client.get(url.clone()).send().await?;
        ensure_success(&response)?;

        if response.content_length().is_some_and(|len| len > max_bytes) {
            return Err(FetchError::TooLarge { limit: max_bytes });
        }

        let content_type = content_type(&response);
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() as u64 + chunk.len() as u64 > max_bytes {
                return Err(FetchError::TooLarge { limit: max_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url = %url, bytes = body.len(), "Fetched remote image");
        Ok(RemoteBody {
            content_type,
            data: body.freeze(),
        })
    }
}

fn client_builder() -> ClientBuilder {
    Client::builder()
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn ensure_success(response: &Response) -> Result<(), FetchError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(FetchError::Status(response.status().as_u16()))
    }
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn probe(&self, url: &Url) -> Result<RemoteProbe, ApplicationError> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(FetchError::from)?;
        ensure_success(&response)?;

        debug!(
            url = %url,
            final_url = %response.url(),
            status = response.status().as_u16(),
            "Probed remote image"
        );

        Ok(RemoteProbe {
            final_url: response.url().clone(),
            content_type: content_type(&response),
        })
    }

    async fn fetch(&self, url: &Url, max_bytes: u64) -> Result<RemoteBody, ApplicationError> {
        Ok(self.download(url, max_bytes).await?)
    }
}
