//! Local filesystem helpers for download destinations and processed torrents.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

const FALLBACK_NAME: &str = "download";
const PARTIAL_SUFFIX: &str = ".part";

/// Reduce a remote-supplied name to a single safe path component.
#[must_use]
pub fn sanitize_filename(raw: &str) -> String {
    let last = raw
        .rsplit(['/', '\\'])
        .find(|part| !part.trim().is_empty())
        .unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|ch| match ch {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    let trimmed = cleaned.trim().trim_end_matches('.').trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// First path in `dir` named `name`, `name (1).ext`, `name (2).ext`, ... that
/// does not exist yet (neither the file nor its partial download).
///
/// # Errors
///
/// Propagates metadata failures other than "not found".
pub async fn unique_path(dir: &Path, name: &str) -> io::Result<PathBuf> {
    let (stem, ext) = split_extension(name);
    let mut candidate = dir.join(name);
    let mut counter = 1_u32;
    while exists(&candidate).await? || exists(&partial_path(&candidate)).await? {
        let numbered = ext.map_or_else(
            || format!("{stem} ({counter})"),
            |ext| format!("{stem} ({counter}).{ext}"),
        );
        candidate = dir.join(numbered);
        counter += 1;
    }
    Ok(candidate)
}

/// Sibling path used while bytes are still arriving.
#[must_use]
pub fn partial_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(PARTIAL_SUFFIX);
    PathBuf::from(raw)
}

/// Move `path` into `dir` (created when missing), avoiding collisions.
///
/// # Errors
///
/// Returns the IO error from creating the directory or renaming the file.
pub async fn move_into(path: &Path, dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let target = unique_path(dir, &name).await?;
    fs::rename(path, &target).await?;
    Ok(target)
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

async fn exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
