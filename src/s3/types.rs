//! Types shared by the signer and the uploader

use chrono::{DateTime, Utc};
use std::fmt;

/// Region reported to the store. R2 accepts any value, `auto` is its convention.
pub const DEFAULT_REGION: &str = "auto";

/// Service name baked into the credential scope
pub const SERVICE: &str = "s3";

/// Long-term store credentials, loaded once per process
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub service: String,
}

impl Credential {
    /// Create a credential with the fixed `auto` region and `s3` service
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: DEFAULT_REGION.to_string(),
            service: SERVICE.to_string(),
        }
    }

    /// Override the region (only needed for stores that validate it)
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("service", &self.service)
            .finish()
    }
}

/// Everything a single request signature is bound to.
///
/// Built fresh for every request; a signature derived from one context
/// must never be sent with a different timestamp or body.
#[derive(Debug, Clone)]
pub struct SigningContext<'a> {
    pub timestamp: DateTime<Utc>,
    pub method: &'a str,
    pub host: &'a str,
    /// Canonical URI, `/bucket` or `/bucket/key`
    pub path: &'a str,
    pub payload: &'a [u8],
}

/// Output of the signer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Hex-encoded HMAC-SHA256 signature
    pub signature: String,
    /// `x-amz-date` value (`YYYYMMDDTHHMMSSZ`) the signature was computed with
    pub amz_date: String,
    /// `YYYYMMDD/region/service/aws4_request`
    pub credential_scope: String,
    /// Hex SHA-256 of the signed payload, sent as `x-amz-content-sha256`
    pub payload_hash: String,
}

/// Pick the `Content-Type` for an object from its key's extension.
///
/// Unknown extensions fall back to `image/jpeg`.
pub fn content_type_for_key(key: &str) -> mime::Mime {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => mime::IMAGE_PNG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        // mime has no constant for webp
        "webp" => "image/webp".parse().unwrap_or(mime::IMAGE_JPEG),
        _ => mime::IMAGE_JPEG,
    }
}
