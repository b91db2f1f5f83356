//! File operation utilities
//!
//! Existence checks, exclusive publication of finished downloads and the
//! JSON sidecar written next to every downloaded file.

use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{FileOperation, HarvestError, ResolvedFile, Result};

/// True when anything (file, directory, dangling link) already sits at `path`
pub async fn destination_exists(path: &Path) -> Result<bool> {
    match fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(HarvestError::file_system(path, FileOperation::Metadata, e)),
    }
}

/// Temporary path for an in-flight download: `<dest>.part`
pub fn create_temp_path(dest_path: &Path) -> PathBuf {
    let mut name = dest_path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest_path.with_file_name(name)
}

/// Give a finished temporary file its final name, failing if that name is taken
///
/// A hard link is created instead of a rename because rename silently
/// replaces an existing destination. Filesystems without hard links get an
/// exclusive copy instead. The temporary name is removed afterwards.
pub async fn publish_exclusive(temp_path: &Path, dest_path: &Path) -> Result<()> {
    match fs::hard_link(temp_path, dest_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(HarvestError::AlreadyExists {
                path: dest_path.to_path_buf(),
            });
        }
        Err(e) if links_unsupported(&e) => {
            debug!("Hard link refused ({}), copying to {}", e, dest_path.display());
            copy_exclusive(temp_path, dest_path).await?;
        }
        Err(e) => return Err(HarvestError::file_system(dest_path, FileOperation::Link, e)),
    }

    fs::remove_file(temp_path)
        .await
        .map_err(|e| HarvestError::file_system(temp_path, FileOperation::Delete, e))?;
    debug!("Published {} as {}", temp_path.display(), dest_path.display());
    Ok(())
}

/// FAT/exFAT volumes and many network or container mounts reject hard links
fn links_unsupported(error: &std::io::Error) -> bool {
    matches!(error.kind(), ErrorKind::Unsupported | ErrorKind::PermissionDenied)
}

/// Copy `temp_path` into a newly created `dest_path`; never touches an existing file
///
/// A partially copied destination is removed again.
pub async fn copy_exclusive(temp_path: &Path, dest_path: &Path) -> Result<u64> {
    let mut dest = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest_path)
        .await
        .map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                HarvestError::AlreadyExists {
                    path: dest_path.to_path_buf(),
                }
            } else {
                HarvestError::file_system(dest_path, FileOperation::Create, e)
            }
        })?;
    let mut source = fs::File::open(temp_path)
        .await
        .map_err(|e| HarvestError::file_system(temp_path, FileOperation::Read, e))?;

    let copied = async {
        let size = tokio::io::copy(&mut source, &mut dest).await?;
        dest.flush().await?;
        Ok::<u64, std::io::Error>(size)
    }
    .await;
    drop(dest);

    match copied {
        Ok(size) => Ok(size),
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(dest_path).await {
                warn!("Could not remove incomplete {}: {}", dest_path.display(), cleanup);
            }
            Err(HarvestError::file_system(dest_path, FileOperation::Write, e))
        }
    }
}

/// Best-effort cleanup of a temporary file after a failed transfer
pub async fn remove_temp_file(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Could not remove partial download {}: {}", temp_path.display(), e);
        }
    }
}

/// Sidecar location: `<parent-of-id-path>/<id>.json`
///
/// When the file's own ID-path already is `<id>.json`, the sidecar moves to
/// `<id>.meta.json` so it cannot clobber the download.
pub fn sidecar_path(file: &ResolvedFile, dest_path: &Path) -> PathBuf {
    let parent = dest_path.parent().unwrap_or_else(|| Path::new(""));
    let candidate = parent.join(format!("{}.json", file.id));
    if candidate == dest_path {
        parent.join(format!("{}.meta.json", file.id))
    } else {
        candidate
    }
}

/// Write the full resolved-file record next to the downloaded file
pub async fn write_sidecar(file: &ResolvedFile, dest_path: &Path) -> Result<PathBuf> {
    let path = sidecar_path(file, dest_path);

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    file.serialize(&mut serializer)
        .map_err(|source| HarvestError::Sidecar {
            path: path.clone(),
            source,
        })?;

    fs::write(&path, buffer)
        .await
        .map_err(|e| HarvestError::file_system(&path, FileOperation::Write, e))?;
    debug!("Wrote sidecar {}", path.display());
    Ok(path)
}
