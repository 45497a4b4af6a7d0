//! Downloading images from the external host

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{LOCATION, USER_AGENT};
use hyper::{Method, Request, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::s3::{build_https_client, HttpsClient};

/// Default `User-Agent`; some hosts refuse requests without a browser-like one
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 5;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("Request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("Failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    #[error("Unexpected status {0}")]
    Status(StatusCode),

    #[error("Invalid redirect target: {0}")]
    InvalidRedirect(String),

    #[error("Gave up after {0} redirects")]
    TooManyRedirects(usize),
}

/// Where image bytes come from
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Fetches images over HTTP(S) with a GET, following redirects
#[derive(Clone)]
pub struct HttpImageSource {
    client: HttpsClient,
    user_agent: String,
}

impl HttpImageSource {
    pub fn new(user_agent: &str) -> Result<Self, native_tls::Error> {
        Ok(Self::with_client(build_https_client()?, user_agent))
    }

    pub fn with_client(client: HttpsClient, user_agent: &str) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let mut current = url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let request = Request::builder()
                .method(Method::GET)
                .uri(current.as_str())
                .header(USER_AGENT, self.user_agent.as_str())
                .body(Full::new(Bytes::new()))?;

            let response = self.client.request(request).await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let _ = response.collect().await;

                // 304 and friends carry no Location
                let Some(location) = location else {
                    return Err(FetchError::Status(status));
                };
                let next = resolve_location(&current, &location)?;
                debug!(from = %current, to = %next, status = %status, "following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                // Drain body to return connection to pool
                let _ = response.collect().await;
                return Err(FetchError::Status(status));
            }

            let body = response.collect().await?.to_bytes();
            debug!(url = %current, bytes = body.len(), "downloaded image");
            return Ok(body);
        }

        Err(FetchError::TooManyRedirects(MAX_REDIRECTS))
    }
}

/// Resolve a `Location` header (absolute or relative) against the URL
/// that produced it
fn resolve_location(current: &str, location: &str) -> Result<String, FetchError> {
    url::Url::parse(current)
        .and_then(|base| base.join(location))
        .map(String::from)
        .map_err(|_| FetchError::InvalidRedirect(location.to_string()))
}
