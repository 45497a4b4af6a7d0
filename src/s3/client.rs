//! Authenticated object uploads
//!
//! - HTTP/1.1 only, hyper legacy client with native-tls
//! - Path-style URLs: `<endpoint>/<bucket>/<key>`
//! - Body is hashed and signed (no UNSIGNED-PAYLOAD), so the store can
//!   verify it byte for byte
//! - One attempt per upload; callers decide what to do with failures

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::s3::signer::{self, S3SignerV4};
use crate::s3::types::{content_type_for_key, Credential};

/// HTTP(S) client shared by the uploader and the image downloader
pub type HttpsClient = HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("Request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("Failed to read response body: {0}")]
    Body(#[from] hyper::Error),

    #[error("Upload rejected: {status} {code} - {message}")]
    Rejected {
        status: StatusCode,
        code: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, UploadError>;

/// Build the HTTPS-capable client.
///
/// Plain `http://` endpoints are allowed so local stores (MinIO, test
/// servers) work too.
pub fn build_https_client() -> std::result::Result<HttpsClient, native_tls::Error> {
    let mut http = HttpConnector::new();
    http.set_nodelay(true);
    http.enforce_http(false);
    http.set_connect_timeout(Some(Duration::from_secs(10)));

    let tls = TlsConnector::new()?;
    let https = HttpsConnector::from((http, tls.into()));

    Ok(HyperClient::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(90))
        .set_host(true)
        .build(https))
}

/// Anything that can store an object and hand back its public URL
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `bucket/key`; returns the public URL on success
    async fn upload(&self, data: Bytes, bucket: &str, key: &str) -> Result<String>;
}

/// Uploader for an S3-compatible store
///
/// Clone is cheap - the underlying HTTP client uses Arc internally.
#[derive(Clone)]
pub struct S3Client {
    client: HttpsClient,
    signer: S3SignerV4,
    /// Endpoint base URL without trailing slash
    endpoint: String,
    /// `Host` header value derived from the endpoint
    host: String,
    /// Public base URL objects are served from
    public_base: String,
}

impl S3Client {
    /// Create a new client for one endpoint
    pub fn new(endpoint: &str, credential: Credential, public_base: &str) -> Result<Self> {
        let client = build_https_client()?;
        Ok(Self::with_client(client, endpoint, credential, public_base))
    }

    /// Create a client on top of an existing HTTP client
    pub fn with_client(
        client: HttpsClient,
        endpoint: &str,
        credential: Credential,
        public_base: &str,
    ) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let host = signer::host_from_endpoint(&endpoint).to_string();

        Self {
            client,
            signer: S3SignerV4::new(credential),
            endpoint,
            host,
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Request URL and canonical path for an object.
    ///
    /// The path is shared by the URL and the signature so they cannot drift.
    pub fn build_url(&self, bucket: &str, key: &str) -> (String, String) {
        let path = signer::canonical_uri(bucket, Some(key));
        let mut url = String::with_capacity(self.endpoint.len() + path.len());
        url.push_str(&self.endpoint);
        url.push_str(&path);
        (url, path)
    }

    /// Public URL an uploaded object is reachable at
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key.trim_start_matches('/'))
    }

    /// Upload an object with an explicit content type.
    ///
    /// Signs immediately before sending with a fresh timestamp. Status 200
    /// yields the public URL; anything else is [`UploadError::Rejected`].
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &mime::Mime,
    ) -> Result<String> {
        let (url, path) = self.build_url(bucket, key);

        let signed = self
            .signer
            .sign_headers("PUT", &self.host, &path, &data, Utc::now());

        let mut req = Request::builder().method(Method::PUT).uri(&url);
        for (name, value) in signed.iter() {
            req = req.header(name.as_str(), value.as_str());
        }
        let request = req
            .header(CONTENT_TYPE, content_type.to_string())
            .header(CONTENT_LENGTH, data.len())
            .body(Full::new(data.clone()))?;

        debug!(url = %url, bytes = data.len(), content_type = %content_type, "uploading object");

        let response = self.client.request(request).await?;
        let status = response.status();
        let body = response.collect().await?.to_bytes();

        if status != StatusCode::OK {
            let (code, message) = parse_error_body(&body);
            return Err(UploadError::Rejected {
                status,
                code,
                message,
            });
        }

        let public_url = self.public_url(key);
        info!(bucket = bucket, key = key, url = %public_url, "uploaded object");
        Ok(public_url)
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn upload(&self, data: Bytes, bucket: &str, key: &str) -> Result<String> {
        let content_type = content_type_for_key(key);
        self.put_object(bucket, key, data, &content_type).await
    }
}

/// Pull `Code` and `Message` out of an S3 XML error body.
///
/// Bodies that are not S3 error documents come back as the message, with
/// an empty code.
pub fn parse_error_body(body: &[u8]) -> (String, String) {
    let text = String::from_utf8_lossy(body);
    let mut reader = Reader::from_str(&text);

    let mut code = String::new();
    let mut message = String::new();
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => {
                current_text.clear();
                if let Ok(unescaped) = e.unescape() {
                    current_text.push_str(&unescaped);
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"Code" => code = std::mem::take(&mut current_text),
                    b"Message" => message = std::mem::take(&mut current_text),
                    _ => {}
                }
                current_text.clear();
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    if code.is_empty() && message.is_empty() {
        return (String::new(), text.trim().to_string());
    }

    (code, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> S3Client {
        S3Client::new(
            "https://abc.r2.cloudflarestorage.com/",
            Credential::new("AKID", "secret"),
            "https://storage.example.dev/",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_url() {
        let client = test_client();
        let (url, path) = client.build_url("bucket-1", "img/abc123.png");
        assert_eq!(url, "https://abc.r2.cloudflarestorage.com/bucket-1/img/abc123.png");
        assert_eq!(path, "/bucket-1/img/abc123.png");
        assert_eq!(client.host(), "abc.r2.cloudflarestorage.com");
    }

    #[tokio::test]
    async fn test_public_url() {
        let client = test_client();
        assert_eq!(
            client.public_url("img/abc123.png"),
            "https://storage.example.dev/img/abc123.png"
        );
    }

    #[test]
    fn test_parse_error_body_xml() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>SignatureDoesNotMatch</Code><Message>The request signature we calculated does not match the signature you provided.</Message></Error>"#;
        let (code, message) = parse_error_body(body);
        assert_eq!(code, "SignatureDoesNotMatch");
        assert!(message.starts_with("The request signature"));
    }

    #[test]
    fn test_parse_error_body_plain_text() {
        let (code, message) = parse_error_body(b"  forbidden\n");
        assert_eq!(code, "");
        assert_eq!(message, "forbidden");
    }

    #[test]
    fn test_parse_error_body_empty() {
        let (code, message) = parse_error_body(b"");
        assert_eq!(code, "");
        assert_eq!(message, "");
    }

    #[test]
    fn test_rejected_display() {
        let err = UploadError::Rejected {
            status: StatusCode::FORBIDDEN,
            code: "AccessDenied".to_string(),
            message: "Access Denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Upload rejected: 403 Forbidden AccessDenied - Access Denied"
        );
    }
}
