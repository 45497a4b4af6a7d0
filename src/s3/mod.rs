//! S3-compatible upload with AWS SigV4 signing
//!
//! This module provides:
//! - A pure SigV4 signer for path-style object writes
//! - An uploader that PUTs signed bytes and returns the public URL

pub mod client;
pub mod signer;
pub mod types;

pub use client::{build_https_client, HttpsClient, ObjectStore, S3Client, UploadError};
pub use signer::{sign, S3SignerV4};
pub use types::{content_type_for_key, Credential, Signature, SigningContext};
