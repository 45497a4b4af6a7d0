//! Command-line front end
//!
//! ```bash
//! # Migrate every note under ./notes
//! R2_API=https://<account>.r2.cloudflarestorage.com \
//! R2_ACCESS_KEY=... R2_SECRET=... \
//! imgshift notes/ --bucket bucket-1 --public-base https://storage.example.dev
//!
//! # See what would change
//! imgshift notes/ --dry-run -v
//! ```

pub mod args;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config;
use crate::migrate::{MigrationReport, Migrator};
use crate::s3::S3Client;
use crate::source::HttpImageSource;
use args::{Cli, OutputFormat};

/// Run one migration as described by the command line
pub async fn run(cli: Cli) -> Result<()> {
    debug!("CLI arguments: {:?}", cli);

    let config = config::load_config(cli.config.as_deref(), cli.settings_overrides())
        .context("Failed to load configuration")?;

    info!(
        endpoint = %config.store.endpoint,
        bucket = %config.migration.bucket,
        key_prefix = %config.migration.key_prefix,
        public_base = %config.migration.public_base,
        "starting migration"
    );

    let store = S3Client::new(
        &config.store.endpoint,
        config.store.credential.clone(),
        &config.migration.public_base,
    )
    .context("Failed to create object store client")?;
    let source = HttpImageSource::new(&config.migration.user_agent)
        .context("Failed to create image download client")?;

    let migrator = Migrator::new(source, store, config.migration)?
        .with_dry_run(cli.dry_run)
        .with_progress(!cli.no_progress);

    let report = migrator.run(&cli.root).await?;
    print_report(&report, &cli.format, cli.dry_run)?;

    Ok(())
}

fn print_report(report: &MigrationReport, format: &OutputFormat, dry_run: bool) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text if dry_run => {
            println!(
                "Dry run: {} images in {} files would be migrated",
                report.images_pending, report.files_scanned
            );
        }
        OutputFormat::Text => {
            println!(
                "Migrated {} of {} images, rewrote {} of {} files",
                report.images_migrated,
                report.images_found,
                report.files_rewritten,
                report.files_scanned
            );
            if !report.is_clean() {
                println!(
                    "Left unchanged: {} download failures, {} upload failures, {} unreadable files",
                    report.fetch_failures, report.upload_failures, report.files_failed
                );
            }
        }
    }
    Ok(())
}

/// Initialize logging based on verbosity flags
pub fn init_logging(verbose: bool, debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
