//! Markdown discovery, image URL extraction and in-place rewriting

use anyhow::{Context, Result};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

/// Matches direct imgur image links
pub const DEFAULT_SOURCE_PATTERN: &str =
    r"https?://i\.imgur\.com/[A-Za-z0-9]+\.(?:png|jpg|jpeg|gif)";

/// Regex identifying external image URLs in a document
#[derive(Debug, Clone)]
pub struct ImagePattern {
    regex: Regex,
}

impl ImagePattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .with_context(|| format!("Invalid source pattern: {}", pattern))?;
        Ok(Self { regex })
    }

    /// Distinct matches, in order of first appearance
    pub fn extract_urls(&self, content: &str) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for m in self.regex.find_iter(content) {
            if !urls.iter().any(|u| u == m.as_str()) {
                urls.push(m.as_str().to_string());
            }
        }
        urls
    }
}

impl Default for ImagePattern {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_SOURCE_PATTERN).expect("default pattern is valid"),
        }
    }
}

/// Object key for an external URL: `prefix` + the URL's file name.
///
/// Query strings and fragments are ignored. Returns `None` when the URL
/// has no file name.
pub fn object_key(prefix: &str, url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query.rsplit('/').next()?;
    if name.is_empty() || !without_query.contains('/') {
        return None;
    }
    Some(format!("{}{}", prefix, name))
}

/// Replace every occurrence of each old URL with its new URL
pub fn apply_replacements(content: &str, replacements: &[(String, String)]) -> String {
    replacements
        .iter()
        .fold(content.to_string(), |acc, (old, new)| acc.replace(old.as_str(), new))
}

/// Collect Markdown files under `root`, sorted by path.
///
/// A file root is returned as-is when it has an `.md` extension.
pub async fn find_markdown_files(root: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(root)
        .await
        .with_context(|| format!("Cannot read {}", root.display()))?;

    let mut files = if metadata.is_file() {
        if is_markdown(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        }
    } else {
        collect_files(root, true).await?
    };

    files.sort();
    Ok(files)
}

/// Recursive walk. Only a failure to list `root` itself is an error;
/// unreadable subdirectories are skipped with a warning.
fn collect_files<'a>(
    path: &'a Path,
    is_root: bool,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<PathBuf>>> + Send + 'a>> {
    Box::pin(async move {
        let mut files = Vec::new();

        let mut entries = match fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if !is_root => {
                warn!(dir = %path.display(), error = %e, "skipping unreadable directory");
                return Ok(files);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot list {}", path.display()));
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %path.display(), error = %e, "stopped listing directory");
                    break;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping entry");
                    continue;
                }
            };

            if file_type.is_file() && is_markdown(&path) {
                files.push(path);
            } else if file_type.is_dir() {
                files.extend(collect_files(&path, false).await?);
            }
        }

        Ok(files)
    })
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// Replace a file's content in one step.
///
/// The new content goes to a temporary file next to the target which is
/// then renamed over it, so readers never see a half-written document.
/// A symlinked document is rewritten through the link.
pub async fn write_atomically(path: &Path, content: String) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let target = std::fs::canonicalize(&path).unwrap_or(path);
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Cannot create temp file in {}", dir.display()))?;
        tmp.write_all(content.as_bytes())?;
        // Temp files are created 0600; keep the document's own mode
        if let Ok(metadata) = std::fs::metadata(&target) {
            tmp.as_file().set_permissions(metadata.permissions())?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&target)
            .with_context(|| format!("Cannot replace {}", target.display()))?;
        Ok(())
    })
    .await
    .context("Rewrite task panicked")?
}
