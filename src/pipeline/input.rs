//! Input loading: turn a user-supplied path or URL into a [`SourceDocument`].
//!
//! Everything is read into memory. pdfium can render straight from a byte
//! slice, and a backend that reads PDFs natively wants the bytes anyway, so
//! no temp files are needed. The leading bytes decide the document kind:
//! `%PDF` means PDF, anything `image::guess_format` recognises is an image,
//! everything else is rejected before it can reach a worker.

use crate::error::BatchError;
use crate::model::{DocumentKind, SourceDocument};
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extensions considered when a directory is given as input.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "png", "jpg", "jpeg", "tif", "tiff", "webp",
];

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load one input, local or remote.
pub async fn load_source(input: &str, timeout_secs: u64) -> Result<SourceDocument, BatchError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(Path::new(input)).await
    }
}

/// Decide what the bytes are, or reject them.
pub fn sniff_kind(name: &str, bytes: &[u8]) -> Result<DocumentKind, BatchError> {
    if bytes.starts_with(b"%PDF") {
        return Ok(DocumentKind::Pdf);
    }
    match image::guess_format(bytes) {
        Ok(
            ImageFormat::Png
            | ImageFormat::Jpeg
            | ImageFormat::Tiff
            | ImageFormat::WebP,
        ) => Ok(DocumentKind::Image),
        _ => Err(BatchError::UnsupportedFormat {
            name: name.to_string(),
            magic: bytes.iter().take(8).copied().collect(),
        }),
    }
}

/// Expand a directory into its supported files, sorted by name.
///
/// Non-recursive; files with unsupported extensions are skipped.
pub fn list_directory(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let entries = std::fs::read_dir(dir).map_err(|e| map_io_error(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_supported_extension(p))
        .collect();
    files.sort();
    debug!("{}: {} supported files", dir.display(), files.len());
    Ok(files)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn load_local(path: &Path) -> Result<SourceDocument, BatchError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| map_io_error(path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let kind = sniff_kind(&name, &bytes)?;
    debug!("Loaded {} ({:?}, {} bytes)", path.display(), kind, bytes.len());
    Ok(SourceDocument::new(name, kind, bytes))
}

fn map_io_error(path: &Path, e: std::io::Error) -> BatchError {
    match e.kind() {
        std::io::ErrorKind::NotFound => BatchError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => BatchError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => BatchError::Internal(format!("reading {}: {e}", path.display())),
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, BatchError> {
    info!("Downloading: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            BatchError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            BatchError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(BatchError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| BatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let name = filename_from_url(url);
    let kind = sniff_kind(&name, &bytes)?;
    info!("Downloaded {} ({:?}, {} bytes)", name, kind, bytes.len());
    Ok(SourceDocument::new(name, kind, bytes.to_vec()))
}

/// Extract a reasonable display name from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
        if let Some(host) = parsed.host_str() {
            return host.to_string();
        }
    }
    "download".to_string()
}
