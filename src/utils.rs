//! Utility functions for file operations, formatting, and identifier checks

use crate::error::{Error, PostProcessError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

/// Directory name written by yt-dlp for thumbnails; never the real download
pub const PLACEHOLDER_DIR_NAME: &str = "yt-dlp-thumb";

/// Suffixes of partial-file markers written by download engines
pub const PARTIAL_FILE_SUFFIXES: &[&str] = &[".aria2", ".!qB"];

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

static DRIVE_ID: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^(tp:|sa:|mtp:)?(?:[a-zA-Z0-9\-_]{33}|[a-zA-Z0-9_\-]{19})$|^gdl$|^(tp:|mtp:)?root$")
        .unwrap()
});

/// Whether an upload destination names a cloud-drive folder rather than an rclone remote
///
/// # Examples
///
/// ```
/// use mirror_dl::utils::is_drive_id;
///
/// assert!(is_drive_id("root"));
/// assert!(is_drive_id("mtp:1AbCdEfGhIjKlMnOpQrStUvWxYz012345"));
/// assert!(!is_drive_id("gdrive:/Movies"));
/// ```
pub fn is_drive_id(dest: &str) -> bool {
    DRIVE_ID.is_match(dest)
}

/// Whether a file name is a download engine's partial-file marker
pub fn is_partial_marker(name: &str) -> bool {
    PARTIAL_FILE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Total size in bytes of a file, or of every regular file below a directory
///
/// Unreadable entries are skipped. A missing path has size zero.
pub async fn get_path_size(path: &Path) -> u64 {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        WalkDir::new(&path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    })
    .await
    .unwrap_or(0)
}

/// Remove a job's working directory tree, logging but never surfacing failures
pub async fn clean_download(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::info!(?path, "cleaned download directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(?path, error = %e, "failed to clean download directory"),
    }
}

/// Remove a file or directory, logging but never surfacing failures
pub async fn clean_target(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(_) => return,
    };
    if let Err(e) = result {
        tracing::warn!(?path, error = %e, "failed to clean target");
    }
}

/// Find the name the engine actually wrote when the expected entry is missing
///
/// Picks the most recently modified entry in `dir`; if that is the thumbnail
/// placeholder, the oldest entry is used instead.
pub async fn resolve_download_name(dir: &Path) -> Result<String> {
    let name_err = |reason: String| {
        Error::PostProcess(PostProcessError::NameResolution {
            dir: dir.to_path_buf(),
            reason,
        })
    };

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| name_err(e.to_string()))?;

    let mut found: Vec<(std::time::SystemTime, String)> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| name_err(e.to_string()))?
    {
        let modified = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .unwrap_or(std::time::UNIX_EPOCH);
        found.push((modified, entry.file_name().to_string_lossy().into_owned()));
    }
    found.sort();

    match found.as_slice() {
        [] => Err(name_err("directory is empty".to_string())),
        [.., (_, last)] if last == PLACEHOLDER_DIR_NAME => Ok(found[0].1.clone()),
        [.., (_, last)] => Ok(last.clone()),
    }
}

/// Split `dir/name` into its parent directory and final component
pub fn split_path(path: &Path) -> (PathBuf, String) {
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, name)
}

/// Human-readable byte count (`1.50GB`)
///
/// # Examples
///
/// ```
/// use mirror_dl::utils::readable_file_size;
///
/// assert_eq!(readable_file_size(0), "0B");
/// assert_eq!(readable_file_size(1536), "1.50KB");
/// ```
pub fn readable_file_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.2}{}", size, SIZE_UNITS[unit])
    }
}

/// Escape text for inclusion in an HTML-formatted chat message
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode a remote path, keeping `/` separators intact
pub fn quote_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
