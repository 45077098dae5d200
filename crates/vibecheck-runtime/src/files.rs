//! Filesystem helpers for artifacts.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::io;
use std::path::{Path, PathBuf};

use vibecheck_core::artifact;

use crate::providers::ImageData;

/// Attempts before [`reserve_artifact`] gives up on finding a free name.
const MAX_NAME_CANDIDATES: u32 = 1000;

/// Whether `path` exists. Permission errors count as absent.
pub async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Create `path` and its parents if missing. Idempotent.
pub async fn ensure_dir(path: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Claim a fresh artifact file for `name` inside `dir`.
///
/// Creates an empty file with `create_new`, so two checks can never be
/// handed the same path. Taken names get a `-<n>` suffix.
pub async fn reserve_artifact(dir: &Path, name: &str) -> io::Result<PathBuf> {
    for n in 0..MAX_NAME_CANDIDATES {
        let path = dir.join(artifact::artifact_file_candidate(name, n));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free artifact name for '{}' in {}", name, dir.display()),
    ))
}

/// Remove a file, ignoring a file that is already gone.
pub async fn remove_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Read a file and return its contents base64-encoded.
pub async fn read_base64(path: &Path) -> io::Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(BASE64.encode(bytes))
}

/// MIME type for an image path, by extension. Unknown extensions are treated as PNG.
pub fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

/// Load an artifact as judge-ready image data.
pub async fn load_image(path: &Path) -> io::Result<ImageData> {
    let base64 = read_base64(path).await?;
    Ok(ImageData::new(base64, media_type_for(path)))
}
