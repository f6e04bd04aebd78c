//! Per-site scratch directories
//!
//! A fetched site is materialized under
//! `<scratch root>/.z-web-temp-<name>-<digest>` before it is served, where
//! `<digest>` is a short BLAKE3 hash of the raw site name. The directory is
//! emptied before every fetch and on cleanup.

use crate::{Result, SyncError};
use std::path::{Component, Path, PathBuf};

/// Prefix of every scratch directory name
pub const SCRATCH_PREFIX: &str = ".z-web-temp-";

/// Hex digits of the name digest kept in the directory name
const DIGEST_LEN: usize = 16;

/// Scratch directory of a site under `root`
///
/// Distinct site names always get distinct directories, even when they
/// sanitize to the same readable part.
pub fn scratch_dir_for(root: &Path, site: &str) -> PathBuf {
    let safe: String = site
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    let digest = blake3::hash(site.as_bytes()).to_hex();
    root.join(format!(
        "{}{}-{}",
        SCRATCH_PREFIX,
        safe,
        &digest.as_str()[..DIGEST_LEN]
    ))
}

/// Make `path` an existing, empty directory
pub async fn ensure_clean(path: &Path) -> Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => clear(path).await,
        Ok(_) => Err(SyncError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(path).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete everything beneath `path`, keeping `path` itself
pub async fn clear(path: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(path).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        if file_type.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await?;
        } else {
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

/// Where a site file with relative key `key` goes inside `dir`
///
/// A single leading `/` is accepted, as written by older key stores. Keys
/// that are otherwise empty or absolute, or contain `.`/`..` components, are
/// rejected.
pub fn resolve_in(dir: &Path, key: &str) -> Result<PathBuf> {
    let trimmed = key.strip_prefix('/').unwrap_or(key);
    let relative = Path::new(trimmed);
    let valid = !trimmed.is_empty()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    if !valid {
        return Err(SyncError::InvalidPath(key.to_string()));
    }
    Ok(dir.join(relative))
}
