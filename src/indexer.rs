use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    chunking::{ChunkingConfig, chunk_text},
    embedding::{Embedder, check_batch},
    error::{Error, Result},
    extract::TextExtractor,
    incremental::{self, FileChange},
    status::RunGuard,
    vector_store::{IndexRecord, RecordMetadata, VectorIndex},
    walker::{DiscoveredFile, WalkOptions, discover_files},
};

/// Outcome of one indexing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub directory: String,
    /// Eligible files found by the scan.
    pub total_files: usize,
    /// Files that are indexed and current after the run.
    pub successful: usize,
    /// Files (re)written during the run.
    pub indexed: usize,
    /// Files skipped because their content did not change.
    pub unchanged: usize,
    /// Files whose text could not be extracted.
    pub failed: usize,
    /// Previously indexed files that disappeared from the directory.
    pub deleted: usize,
    pub chunks_written: usize,
    /// Records in the collection after the run.
    pub collection_count: usize,
    pub duration_ms: u64,
}

enum FileOutcome {
    Indexed { chunks: usize },
    Unchanged,
}

/// Drives indexing runs: scan, diff, extract, chunk, embed, store.
pub struct Indexer {
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    walk: WalkOptions,
}

impl Indexer {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
        walk: WalkOptions,
    ) -> Result<Self> {
        chunking.validate()?;
        Ok(Self {
            extractor,
            embedder,
            store,
            chunking,
            walk,
        })
    }

    /// Bring the index in line with the contents of `root`.
    ///
    /// `on_progress(path, ordinal, total)` is called before each file, with
    /// a 1-based ordinal. Files whose text cannot be extracted are counted
    /// and skipped; embedding or storage failures abort the run, leaving the
    /// files already written in place.
    pub fn index_directory(
        &self,
        root: &Path,
        mut on_progress: impl FnMut(&str, usize, usize),
    ) -> Result<IndexSummary> {
        let started = Instant::now();

        let files = discover_files(root, &self.walk)?;
        let root = root.canonicalize()?;
        info!(directory = %root.display(), files = files.len(), "indexing directory");

        // Only files under this root are candidates for deletion.
        let indexed: HashMap<String, String> = self
            .store
            .fingerprints()?
            .into_iter()
            .filter(|(path, _)| Path::new(path).starts_with(&root))
            .collect();

        let current: Vec<String> =
            files.iter().map(DiscoveredFile::path_key).collect();
        let changes = incremental::diff(&current, &indexed);

        for path in &changes.to_delete {
            let removed = self.store.delete_by_path(path)?;
            debug!(path = %path, records = removed, "removed deleted file");
        }

        let total = files.len();
        let mut summary = IndexSummary {
            directory: root.to_string_lossy().to_string(),
            total_files: total,
            successful: 0,
            indexed: 0,
            unchanged: 0,
            failed: 0,
            deleted: changes.to_delete.len(),
            chunks_written: 0,
            collection_count: 0,
            duration_ms: 0,
        };

        for (i, file) in files.iter().enumerate() {
            let path = file.path_key();
            on_progress(&path, i + 1, total);

            match self.index_file(file, &indexed) {
                Ok(FileOutcome::Indexed { chunks }) => {
                    debug!(path = %path, chunks, "indexed file");
                    summary.indexed += 1;
                    summary.chunks_written += chunks;
                }
                Ok(FileOutcome::Unchanged) => {
                    debug!(path = %path, "unchanged");
                    summary.unchanged += 1;
                }
                Err(e) if e.is_per_file() => {
                    warn!("{e}");
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        summary.successful = summary.indexed + summary.unchanged;
        summary.collection_count = self.store.count()?;
        summary.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            indexed = summary.indexed,
            unchanged = summary.unchanged,
            failed = summary.failed,
            deleted = summary.deleted,
            chunks = summary.chunks_written,
            "indexing complete"
        );
        Ok(summary)
    }

    /// Run [`Indexer::index_directory`], publishing progress and the final
    /// outcome through `guard`.
    pub fn run(&self, root: &Path, guard: RunGuard) -> Result<IndexSummary> {
        let outcome = self.index_directory(root, |path, progress, total| {
            guard.progress(path, progress, total);
        });
        if let Err(e) = &outcome {
            warn!(directory = %root.display(), "indexing failed: {e}");
        }
        guard.finish(&outcome);
        outcome
    }

    fn index_file(
        &self,
        file: &DiscoveredFile,
        indexed: &HashMap<String, String>,
    ) -> Result<FileOutcome> {
        let path = file.path_key();

        let text = self.extractor.extract(&file.absolute_path)?;
        if text.trim().is_empty() {
            return Err(Error::extraction(
                file.absolute_path.clone(),
                "no text content",
            ));
        }

        let fingerprint = incremental::fingerprint(&text);
        match incremental::classify(&path, &fingerprint, indexed) {
            FileChange::Unchanged => return Ok(FileOutcome::Unchanged),
            FileChange::Modified { .. } => {
                self.store.delete_by_path(&path)?;
            }
            FileChange::New => {}
        }

        let chunks =
            chunk_text(&text, self.chunking.chunk_size, self.chunking.overlap)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = check_batch(texts.len(), self.embedder.embed(&texts)?)?;

        let file_name = file.file_name();
        let modified_time = file.modified_iso();
        let records: Vec<IndexRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexRecord {
                id: IndexRecord::record_id(&path, chunk.index),
                embedding,
                document: chunk.text,
                metadata: RecordMetadata {
                    file_name: file_name.clone(),
                    extension: file.extension.clone(),
                    file_path: path.clone(),
                    fingerprint: fingerprint.clone(),
                    file_size: file.size,
                    modified_time: modified_time.clone(),
                    total_chunks: chunk.total,
                    chunk_index: chunk.index,
                },
            })
            .collect();

        self.store.upsert(&records)?;
        Ok(FileOutcome::Indexed {
            chunks: records.len(),
        })
    }
}

/// Resolve and check a directory supplied by a caller.
pub fn validate_directory(directory: &str) -> Result<PathBuf> {
    let trimmed = directory.trim();
    if trimmed.is_empty() {
        return Err(Error::Config("directory is required".into()));
    }
    let path = PathBuf::from(trimmed);
    if !path.exists() {
        return Err(Error::NotFound {
            kind: "directory",
            name: trimmed.to_string(),
        });
    }
    if !path.is_dir() {
        return Err(Error::Config(format!("not a directory: {trimmed}")));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        embedding::HashingEmbedder,
        extract::FileExtractor,
        status::{IndexingStatus, StatusHandle},
        vector_store::RedbVectorStore,
    };

    struct Fixture {
        _tmp: tempfile::TempDir,
        docs: PathBuf,
        store: Arc<RedbVectorStore>,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        std::fs::create_dir(&docs).unwrap();
        let store = Arc::new(
            RedbVectorStore::open(&tmp.path().join("index.redb"), "test").unwrap(),
        );
        Fixture {
            _tmp: tmp,
            docs,
            store,
        }
    }

    fn indexer_with(
        store: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Indexer {
        Indexer::new(
            Arc::new(FileExtractor),
            embedder,
            store,
            ChunkingConfig::new(100, 20).unwrap(),
            WalkOptions {
                extensions: vec![".txt".into(), ".md".into(), ".pdf".into()],
                max_file_size: 1024 * 1024,
            },
        )
        .unwrap()
    }

    fn indexer(f: &Fixture) -> Indexer {
        indexer_with(f.store.clone(), Arc::new(HashingEmbedder::new(32)))
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(Error::Embedding("service unavailable".into()))
        }

        fn model_id(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn indexes_new_files() {
        let f = fixture();
        std::fs::write(f.docs.join("a.txt"), "alpha ".repeat(50)).unwrap();
        std::fs::write(f.docs.join("b.md"), "short note").unwrap();

        let summary = indexer(&f).index_directory(&f.docs, |_, _, _| {}).unwrap();
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.indexed, 2);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.collection_count, summary.chunks_written);
        assert!(summary.chunks_written > 2);
        assert_eq!(f.store.files().unwrap().len(), 2);
    }

    #[test]
    fn progress_is_reported_before_each_file() {
        let f = fixture();
        std::fs::write(f.docs.join("a.txt"), "one").unwrap();
        std::fs::write(f.docs.join("b.txt"), "two").unwrap();

        let mut calls = Vec::new();
        indexer(&f)
            .index_directory(&f.docs, |path, n, total| {
                calls.push((path.rsplit('/').next().unwrap().to_string(), n, total))
            })
            .unwrap();
        assert_eq!(
            calls,
            vec![("a.txt".to_string(), 1, 2), ("b.txt".to_string(), 2, 2)]
        );
    }

    #[test]
    fn blank_and_unreadable_files_count_as_failed() {
        let f = fixture();
        std::fs::write(f.docs.join("good.txt"), "real content").unwrap();
        std::fs::write(f.docs.join("blank.txt"), "  \n ").unwrap();
        std::fs::write(f.docs.join("broken.pdf"), "not a pdf").unwrap();

        let summary = indexer(&f).index_directory(&f.docs, |_, _, _| {}).unwrap();
        assert_eq!(summary.indexed, 1);
        assert_eq!(summary.failed, 2);
        let files = f.store.files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "good.txt");
    }

    #[test]
    fn only_files_under_root_are_deleted() {
        let f = fixture();
        let other = f.docs.parent().unwrap().join("other");
        std::fs::create_dir(&other).unwrap();
        std::fs::write(f.docs.join("a.txt"), "inside").unwrap();
        std::fs::write(other.join("b.txt"), "outside").unwrap();

        let idx = indexer(&f);
        idx.index_directory(&f.docs, |_, _, _| {}).unwrap();
        idx.index_directory(&other, |_, _, _| {}).unwrap();
        assert_eq!(f.store.files().unwrap().len(), 2);

        std::fs::remove_file(f.docs.join("a.txt")).unwrap();
        let summary = idx.index_directory(&f.docs, |_, _, _| {}).unwrap();
        assert_eq!(summary.deleted, 1);
        let files = f.store.files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "b.txt");
    }

    #[test]
    fn embedding_failure_aborts_run() {
        let f = fixture();
        std::fs::write(f.docs.join("a.txt"), "content").unwrap();

        let idx = indexer_with(f.store.clone(), Arc::new(FailingEmbedder));
        let err = idx.index_directory(&f.docs, |_, _, _| {}).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
        assert_eq!(f.store.count().unwrap(), 0);
    }

    #[test]
    fn run_records_status() {
        let f = fixture();
        std::fs::write(f.docs.join("a.txt"), "content").unwrap();
        let handle = StatusHandle::new();

        let seen = Mutex::new(Vec::new());
        let idx = indexer(&f);
        let guard = handle.try_start().unwrap();
        idx.index_directory(&f.docs, |p, n, t| {
            seen.lock().unwrap().push((p.to_string(), n, t));
            guard.progress(p, n, t);
            assert!(handle.get().is_running());
        })
        .unwrap();
        drop(guard);

        let guard = handle.try_start().unwrap();
        let summary = idx.run(&f.docs, guard).unwrap();
        assert_eq!(summary.unchanged, 1);
        assert_eq!(handle.get(), IndexingStatus::Completed { summary });
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_run_records_error() {
        let f = fixture();
        std::fs::write(f.docs.join("a.txt"), "content").unwrap();
        let handle = StatusHandle::new();

        let idx = indexer_with(f.store.clone(), Arc::new(FailingEmbedder));
        assert!(idx.run(&f.docs, handle.try_start().unwrap()).is_err());
        assert!(matches!(handle.get(), IndexingStatus::Failed { .. }));
        assert!(!handle.is_running());
    }

    #[test]
    fn validate_directory_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();

        assert!(matches!(validate_directory("  "), Err(Error::Config(_))));
        assert!(matches!(
            validate_directory(tmp.path().join("missing").to_str().unwrap()),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            validate_directory(file.to_str().unwrap()),
            Err(Error::Config(_))
        ));
        assert!(validate_directory(tmp.path().to_str().unwrap()).is_ok());
    }
}
