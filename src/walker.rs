use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::error::{Error, Result};

/// A discovered document file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Fully resolved absolute path. This is the document's identity.
    pub absolute_path: PathBuf,
    /// Lower-cased extension including the leading dot (e.g. `.pdf`).
    pub extension: String,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

impl DiscoveredFile {
    /// The absolute path as a string, the key used by the vector store.
    pub fn path_key(&self) -> String {
        self.absolute_path.to_string_lossy().to_string()
    }

    /// File name without directories.
    pub fn file_name(&self) -> String {
        self.absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Modification time as an ISO-8601 string.
    pub fn modified_iso(&self) -> String {
        self.modified.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Which files a scan accepts.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Allowed extensions, lower-case with leading dot.
    pub extensions: Vec<String>,
    /// Files larger than this are skipped.
    pub max_file_size: u64,
}

/// Recursively walk a directory and discover eligible document files.
///
/// Skips hidden files/directories (names starting with `.`), files whose
/// extension is not allowed and files above the size limit. Results are
/// sorted by absolute path so runs process files in a stable order.
pub fn discover_files(
    root: &Path,
    options: &WalkOptions,
) -> Result<Vec<DiscoveredFile>> {
    if !root.is_dir() {
        return Err(Error::Config(format!(
            "not a directory: {}",
            root.display()
        )));
    }
    let canonical_root = root.canonicalize()?;
    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, options, &mut results)?;
    results.sort_by(|a, b| a.absolute_path.cmp(&b.absolute_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    options: &WalkOptions,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        // Skip hidden files and directories.
        if name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk_dir(root, &entry.path(), options, results)?;
        } else if file_type.is_symlink() {
            let resolved = match entry.path().canonicalize() {
                Ok(p) => p,
                Err(_) => continue, // Skip broken symlinks
            };
            // Directory symlinks are not followed (cycle prevention).
            if resolved.is_file()
                && let Some(df) = make_discovered(&resolved, options)?
            {
                results.push(df);
            }
        } else if file_type.is_file() {
            let abs = entry.path().canonicalize()?;
            if let Some(df) = make_discovered(&abs, options)? {
                results.push(df);
            }
        }
    }

    debug!(dir = %current.display(), root = %root.display(), "scanned directory");
    Ok(())
}

/// Lower-cased extension with leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

fn make_discovered(
    absolute_path: &Path,
    options: &WalkOptions,
) -> Result<Option<DiscoveredFile>> {
    let extension = extension_of(absolute_path);
    if !options.extensions.iter().any(|e| *e == extension) {
        return Ok(None);
    }

    let metadata = std::fs::metadata(absolute_path)?;
    if metadata.len() > options.max_file_size {
        debug!(
            path = %absolute_path.display(),
            size = metadata.len(),
            "skipping file above size limit"
        );
        return Ok(None);
    }

    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

    Ok(Some(DiscoveredFile {
        absolute_path: absolute_path.to_path_buf(),
        extension,
        size: metadata.len(),
        modified: DateTime::<Utc>::from(modified),
    }))
}
