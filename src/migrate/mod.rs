//! Migration of image references, one Markdown file at a time
//!
//! Each file is read once, every distinct external URL in it is resolved
//! (downloaded and uploaded, or left alone on failure), and only then is
//! the file written, once, with all replacements applied.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::MigrationSettings;
use crate::markdown::{self, ImagePattern};
use crate::s3::ObjectStore;
use crate::source::ImageSource;

/// Totals for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub files_scanned: usize,
    pub files_rewritten: usize,
    pub files_failed: usize,
    /// Distinct external URLs seen, summed over files
    pub images_found: usize,
    pub images_migrated: usize,
    /// URLs found but not touched because of `--dry-run`
    pub images_pending: usize,
    pub fetch_failures: usize,
    pub upload_failures: usize,
}

impl MigrationReport {
    fn add(&mut self, file: &FileReport) {
        self.files_scanned += 1;
        if file.rewritten {
            self.files_rewritten += 1;
        }
        self.images_found += file.urls_found;
        self.images_migrated += file.migrated;
        self.images_pending += file.pending;
        self.fetch_failures += file.fetch_failures;
        self.upload_failures += file.upload_failures;
    }

    /// True when every reference found was migrated
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0 && self.fetch_failures == 0 && self.upload_failures == 0
    }
}

/// Outcome for a single document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileReport {
    pub urls_found: usize,
    pub migrated: usize,
    pub pending: usize,
    pub fetch_failures: usize,
    pub upload_failures: usize,
    pub rewritten: bool,
}

/// Drives the download → upload → rewrite cycle
pub struct Migrator<S, O> {
    source: S,
    store: O,
    settings: MigrationSettings,
    pattern: ImagePattern,
    dry_run: bool,
    show_progress: bool,
}

impl<S: ImageSource, O: ObjectStore> Migrator<S, O> {
    pub fn new(source: S, store: O, settings: MigrationSettings) -> Result<Self> {
        let pattern = ImagePattern::new(&settings.source_pattern)?;
        Ok(Self {
            source,
            store,
            settings,
            pattern,
            dry_run: false,
            show_progress: false,
        })
    }

    /// Only report what would be migrated; no network, no writes
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Migrate every Markdown file under `root`.
    ///
    /// A file that cannot be read or written is logged, counted in
    /// `files_failed` and skipped; the rest of the batch still runs.
    pub async fn run(&self, root: &Path) -> Result<MigrationReport> {
        let files = markdown::find_markdown_files(root).await?;
        info!(root = %root.display(), files = files.len(), "found markdown files");

        let pb = if self.show_progress {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.green/blue} {pos}/{len} files {msg}")?
                    .progress_chars("=>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        // Same image linked from several notes is uploaded once per run
        let mut uploaded: HashMap<String, String> = HashMap::new();
        let mut report = MigrationReport::default();

        for path in &files {
            pb.set_message(
                path.file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .into_owned(),
            );

            match self.migrate_file(path, &mut uploaded).await {
                Ok(file_report) => report.add(&file_report),
                Err(e) => {
                    warn!(file = %path.display(), error = %format!("{:#}", e), "skipping file");
                    report.files_scanned += 1;
                    report.files_failed += 1;
                }
            }

            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(report)
    }

    /// Migrate the images referenced by one document.
    ///
    /// `uploaded` maps external URLs to public URLs already produced in this
    /// run. The file is only written when at least one reference changed.
    pub async fn migrate_file(
        &self,
        path: &Path,
        uploaded: &mut HashMap<String, String>,
    ) -> Result<FileReport> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let urls = self.pattern.extract_urls(&content);
        let mut report = FileReport {
            urls_found: urls.len(),
            ..Default::default()
        };

        if urls.is_empty() {
            debug!(file = %path.display(), "no external images");
            return Ok(report);
        }

        if self.dry_run {
            for url in &urls {
                info!(file = %path.display(), url = %url, "would migrate");
            }
            report.pending = urls.len();
            return Ok(report);
        }

        let mut replacements = Vec::with_capacity(urls.len());
        for url in urls {
            if let Some(public_url) = uploaded.get(&url) {
                replacements.push((url, public_url.clone()));
                report.migrated += 1;
                continue;
            }

            let Some(key) = markdown::object_key(&self.settings.key_prefix, &url) else {
                warn!(url = %url, "cannot derive object key, leaving as is");
                continue;
            };

            let data = match self.source.fetch(&url).await {
                Ok(data) => data,
                Err(e) => {
                    warn!(url = %url, error = %e, "download failed, leaving as is");
                    report.fetch_failures += 1;
                    continue;
                }
            };

            match self.store.upload(data, &self.settings.bucket, &key).await {
                Ok(public_url) => {
                    uploaded.insert(url.clone(), public_url.clone());
                    replacements.push((url, public_url));
                    report.migrated += 1;
                }
                Err(e) => {
                    warn!(url = %url, key = %key, error = %e, "upload failed, leaving as is");
                    report.upload_failures += 1;
                }
            }
        }

        if !replacements.is_empty() {
            let rewritten = markdown::apply_replacements(&content, &replacements);
            markdown::write_atomically(path, rewritten).await?;
            report.rewritten = true;
            info!(file = %path.display(), replaced = replacements.len(), "rewrote document");
        }

        Ok(report)
    }
}
