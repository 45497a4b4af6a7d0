use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::markdown::DEFAULT_SOURCE_PATTERN;
use crate::s3::Credential;
use crate::source::DEFAULT_USER_AGENT;

/// Object store connection settings (secrets included)
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint base URL, e.g. `https://<account>.r2.cloudflarestorage.com`
    pub endpoint: String,
    pub credential: Credential,
}

/// Resolved migration settings
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// Destination bucket
    pub bucket: String,
    /// Prepended to each image's file name to form the object key
    pub key_prefix: String,
    /// Public base URL objects are served from
    pub public_base: String,
    /// Regex identifying external image URLs
    pub source_pattern: String,
    /// `User-Agent` sent when downloading images
    pub user_agent: String,
}

fn default_key_prefix() -> String {
    "img/".to_string()
}

fn default_source_pattern() -> String {
    DEFAULT_SOURCE_PATTERN.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

/// One source of migration settings (YAML file, environment, CLI flags).
///
/// Layers are merged with [`SettingsLayer::merge`], later layers winning,
/// and then resolved into [`MigrationSettings`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsLayer {
    pub bucket: Option<String>,
    pub key_prefix: Option<String>,
    pub public_base: Option<String>,
    pub source_pattern: Option<String>,
    pub user_agent: Option<String>,
}

impl SettingsLayer {
    /// Read settings from environment variables
    ///
    /// - R2_BUCKET
    /// - R2_KEY_PREFIX
    /// - R2_PUBLIC_BASE
    /// - IMGSHIFT_SOURCE_PATTERN
    /// - IMGSHIFT_USER_AGENT
    pub fn from_env() -> Self {
        Self {
            bucket: non_empty_var("R2_BUCKET"),
            key_prefix: std::env::var("R2_KEY_PREFIX").ok(),
            public_base: non_empty_var("R2_PUBLIC_BASE"),
            source_pattern: non_empty_var("IMGSHIFT_SOURCE_PATTERN"),
            user_agent: non_empty_var("IMGSHIFT_USER_AGENT"),
        }
    }

    /// Overlay `other` on top of `self`
    pub fn merge(self, other: SettingsLayer) -> Self {
        Self {
            bucket: other.bucket.or(self.bucket),
            key_prefix: other.key_prefix.or(self.key_prefix),
            public_base: other.public_base.or(self.public_base),
            source_pattern: other.source_pattern.or(self.source_pattern),
            user_agent: other.user_agent.or(self.user_agent),
        }
    }

    /// Fill defaults and check required fields
    pub fn resolve(self) -> Result<MigrationSettings> {
        let bucket = self
            .bucket
            .context("Bucket not set (use --bucket, R2_BUCKET or the config file)")?;
        let public_base = self.public_base.context(
            "Public base URL not set (use --public-base, R2_PUBLIC_BASE or the config file)",
        )?;

        if bucket.is_empty() || bucket.contains('/') {
            anyhow::bail!("Invalid bucket name: '{}'", bucket);
        }

        Ok(MigrationSettings {
            bucket,
            key_prefix: self.key_prefix.unwrap_or_else(default_key_prefix),
            public_base: public_base.trim_end_matches('/').to_string(),
            source_pattern: self.source_pattern.unwrap_or_else(default_source_pattern),
            user_agent: self.user_agent.unwrap_or_else(default_user_agent),
        })
    }
}

/// Everything the tool needs to run
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub migration: MigrationSettings,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Load store settings from environment variables
///
/// Supports both the R2 names and the AWS standard ones:
/// - R2_API / S3_ENDPOINT
/// - R2_ACCESS_KEY / AWS_ACCESS_KEY_ID
/// - R2_SECRET / AWS_SECRET_ACCESS_KEY
/// - R2_REGION (optional, defaults to auto)
pub fn load_store_from_env() -> Result<StoreConfig> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let endpoint = non_empty_var("R2_API")
        .or_else(|| non_empty_var("S3_ENDPOINT"))
        .context("Neither R2_API nor S3_ENDPOINT environment variable is set")?;

    if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
        anyhow::bail!("Endpoint must start with http:// or https://: {}", endpoint);
    }

    let access_key = non_empty_var("R2_ACCESS_KEY")
        .or_else(|| non_empty_var("AWS_ACCESS_KEY_ID"))
        .context("Neither R2_ACCESS_KEY nor AWS_ACCESS_KEY_ID environment variable is set")?;

    let secret_key = non_empty_var("R2_SECRET")
        .or_else(|| non_empty_var("AWS_SECRET_ACCESS_KEY"))
        .context("Neither R2_SECRET nor AWS_SECRET_ACCESS_KEY environment variable is set")?;

    let mut credential = Credential::new(access_key, secret_key);
    if let Some(region) = non_empty_var("R2_REGION") {
        credential = credential.with_region(region);
    }

    Ok(StoreConfig {
        endpoint: endpoint.trim_end_matches('/').to_string(),
        credential,
    })
}

/// Load a settings layer from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<SettingsLayer> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let layer: SettingsLayer =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;

    Ok(layer)
}

/// Load the full configuration.
///
/// Store credentials always come from the environment. Migration settings
/// are layered: config file, then environment, then `overrides` (CLI flags).
pub fn load_config(config_path: Option<&Path>, overrides: SettingsLayer) -> Result<Config> {
    let store = load_store_from_env()?;

    let file_layer = match config_path {
        Some(path) => load_from_yaml(path)?,
        None => SettingsLayer::default(),
    };

    let migration = file_layer
        .merge(SettingsLayer::from_env())
        .merge(overrides)
        .resolve()?;

    Ok(Config { store, migration })
}
