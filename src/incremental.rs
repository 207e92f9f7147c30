use std::collections::{BTreeSet, HashMap, HashSet};

use sha2::{Digest, Sha256};

/// Compute the content fingerprint of a document's extracted text.
///
/// The digest is taken over the same text that gets chunked, so a change in
/// fingerprint tracks exactly the content visible to the index.
///
/// # Examples
///
/// ```
/// use fileseek::incremental::fingerprint;
///
/// assert_eq!(fingerprint("hello"), fingerprint("hello"));
/// assert_ne!(fingerprint("hello"), fingerprint("hello!"));
/// assert_eq!(fingerprint("hello").len(), 64);
/// ```
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Result of comparing the files found by a scan against the index.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Indexed paths that no longer exist in the scan (removed or renamed).
    pub to_delete: BTreeSet<String>,
    /// Every scanned path, in scan order. Each one is fingerprinted again
    /// and skipped when the fingerprint is unchanged.
    pub to_consider: Vec<String>,
}

/// What needs to happen to one scanned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    /// Nothing indexed under this path yet.
    New,
    /// Indexed with the same fingerprint; nothing to write.
    Unchanged,
    /// Indexed with a different fingerprint; old records must go first.
    Modified { previous: String },
}

/// Compare scanned paths against the fingerprints already in the index.
pub fn diff<S: AsRef<str>>(
    current: &[S],
    indexed: &HashMap<String, String>,
) -> ChangeSet {
    let seen: HashSet<&str> = current.iter().map(AsRef::as_ref).collect();

    let to_delete = indexed
        .keys()
        .filter(|path| !seen.contains(path.as_str()))
        .cloned()
        .collect();

    ChangeSet {
        to_delete,
        to_consider: current.iter().map(|p| p.as_ref().to_string()).collect(),
    }
}

/// Decide what to do with one file given its freshly computed fingerprint.
pub fn classify(
    path: &str,
    fingerprint: &str,
    indexed: &HashMap<String, String>,
) -> FileChange {
    match indexed.get(path) {
        None => FileChange::New,
        Some(stored) if stored == fingerprint => FileChange::Unchanged,
        Some(stored) => FileChange::Modified {
            previous: stored.clone(),
        },
    }
}
