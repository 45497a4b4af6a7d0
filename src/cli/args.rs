use clap::Parser;
use std::path::PathBuf;

use crate::config::SettingsLayer;

/// imgshift - move Markdown images to an S3-compatible bucket and relink them
#[derive(Parser, Debug)]
#[command(name = "imgshift")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory (or single file) of Markdown documents to migrate
    #[arg(value_name = "DIR")]
    pub root: PathBuf,

    /// YAML file with migration settings
    #[arg(long, env = "IMGSHIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Destination bucket
    #[arg(long)]
    pub bucket: Option<String>,

    /// Prefix for object keys (default: img/)
    #[arg(long)]
    pub key_prefix: Option<String>,

    /// Public base URL uploaded objects are served from
    #[arg(long)]
    pub public_base: Option<String>,

    /// Regex matching the external image URLs to migrate
    #[arg(long)]
    pub source_pattern: Option<String>,

    /// Show what would be migrated without downloading, uploading or writing
    #[arg(long)]
    pub dry_run: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Output format for the final report (text, json)
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Settings given on the command line, the top configuration layer
    pub fn settings_overrides(&self) -> SettingsLayer {
        SettingsLayer {
            bucket: self.bucket.clone(),
            key_prefix: self.key_prefix.clone(),
            public_base: self.public_base.clone(),
            source_pattern: self.source_pattern.clone(),
            user_agent: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["imgshift", "notes/"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("notes/"));
        assert!(!cli.dry_run);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(cli.settings_overrides().bucket.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let cli = Cli::try_parse_from([
            "imgshift",
            "--bucket",
            "bucket-1",
            "--key-prefix",
            "assets/",
            "--public-base",
            "https://storage.example.dev",
            "--dry-run",
            "--format",
            "json",
            "notes",
        ])
        .unwrap();

        let overrides = cli.settings_overrides();
        assert_eq!(overrides.bucket.as_deref(), Some("bucket-1"));
        assert_eq!(overrides.key_prefix.as_deref(), Some("assets/"));
        assert_eq!(overrides.public_base.as_deref(), Some("https://storage.example.dev"));
        assert!(cli.dry_run);
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_root_required() {
        assert!(Cli::try_parse_from(["imgshift"]).is_err());
    }
}
