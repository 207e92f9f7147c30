//! Persistent chunk records and exact nearest-neighbour search.
//!
//! A collection is a pair of redb tables sharing the record id as key:
//!
//! - `{collection}.records`: JSON-encoded chunk text and [`RecordMetadata`]
//! - `{collection}.vectors`: the embedding as raw little-endian `f32`s
//!
//! Queries score every stored vector (cosine distance) and keep the best.

use std::{collections::HashMap, path::Path};

use rayon::prelude::*;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-chunk metadata stored alongside every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub file_name: String,
    pub extension: String,
    /// Absolute path of the source file.
    pub file_path: String,
    pub fingerprint: String,
    pub file_size: u64,
    /// Last modification time, RFC 3339.
    pub modified_time: String,
    pub total_chunks: usize,
    pub chunk_index: usize,
}

/// One chunk ready to be written to the store.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub document: String,
    pub metadata: RecordMetadata,
}

impl IndexRecord {
    /// Record id for chunk `ordinal` of the file at `path`.
    pub fn record_id(path: &str, ordinal: usize) -> String {
        format!("{path}::{ordinal}")
    }
}

/// A stored chunk returned by a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    /// Cosine distance, `1 - cosine similarity`.
    pub distance: f32,
    pub metadata: RecordMetadata,
}

/// Storage and retrieval of embedded chunks.
pub trait VectorIndex: Send + Sync {
    /// Insert records, replacing any with the same id.
    fn upsert(&self, records: &[IndexRecord]) -> Result<()>;

    /// Delete every record whose metadata path equals `path`.
    ///
    /// Returns the number of records removed.
    fn delete_by_path(&self, path: &str) -> Result<usize>;

    /// The `n` records closest to `embedding`, nearest first.
    fn query(&self, embedding: &[f32], n: usize) -> Result<Vec<SearchHit>>;

    /// Stored fingerprint of every indexed file, keyed by path.
    fn fingerprints(&self) -> Result<HashMap<String, String>>;

    /// One metadata entry per indexed file, sorted by path.
    fn files(&self) -> Result<Vec<RecordMetadata>>;

    /// Total number of stored records.
    fn count(&self) -> Result<usize>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    document: String,
    metadata: RecordMetadata,
}

/// Flat vector store on top of redb.
pub struct RedbVectorStore {
    db: Database,
    records_table: String,
    vectors_table: String,
}

impl RedbVectorStore {
    /// Open or create the store at `path`, using the tables of `collection`.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use fileseek::vector_store::{RedbVectorStore, VectorIndex};
    ///
    /// let store =
    ///     RedbVectorStore::open(&tmp.path().join("index.redb"), "docs").unwrap();
    /// assert_eq!(store.count().unwrap(), 0);
    /// ```
    pub fn open(path: &Path, collection: &str) -> Result<Self> {
        if collection.is_empty() {
            return Err(Error::Config("collection name must not be empty".into()));
        }

        let db = Database::create(path)?;
        let store = Self {
            db,
            records_table: format!("{collection}.records"),
            vectors_table: format!("{collection}.vectors"),
        };

        let txn = store.db.begin_write()?;
        txn.open_table(store.records())?;
        txn.open_table(store.vectors())?;
        txn.commit()?;

        Ok(store)
    }

    fn records(&self) -> TableDefinition<'_, &'static str, &'static str> {
        TableDefinition::new(&self.records_table)
    }

    fn vectors(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        TableDefinition::new(&self.vectors_table)
    }

    fn decode_record(json: &str) -> Result<StoredRecord> {
        Ok(serde_json::from_str(json)?)
    }

    fn all_metadata(&self) -> Result<Vec<RecordMetadata>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(self.records())?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_, v) = entry?;
            result.push(Self::decode_record(v.value())?.metadata);
        }
        Ok(result)
    }
}

impl VectorIndex for RedbVectorStore {
    fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut record_table = txn.open_table(self.records())?;
            let mut vector_table = txn.open_table(self.vectors())?;
            for record in records {
                let json = serde_json::to_string(&StoredRecord {
                    document: record.document.clone(),
                    metadata: record.metadata.clone(),
                })?;
                record_table.insert(record.id.as_str(), json.as_str())?;
                vector_table.insert(
                    record.id.as_str(),
                    bytemuck::cast_slice::<f32, u8>(&record.embedding),
                )?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn delete_by_path(&self, path: &str) -> Result<usize> {
        let prefix = format!("{path}::");
        let txn = self.db.begin_write()?;
        let removed = {
            let mut record_table = txn.open_table(self.records())?;
            let mut vector_table = txn.open_table(self.vectors())?;

            let mut ids = Vec::new();
            for entry in record_table.range(prefix.as_str()..)? {
                let (k, v) = entry?;
                let id = k.value();
                if !id.starts_with(&prefix) {
                    break;
                }
                // Another path may itself start with `{path}::`.
                if Self::decode_record(v.value())?.metadata.file_path == path {
                    ids.push(id.to_string());
                }
            }

            for id in &ids {
                record_table.remove(id.as_str())?;
                vector_table.remove(id.as_str())?;
            }
            ids.len()
        };
        txn.commit()?;
        Ok(removed)
    }

    fn query(&self, embedding: &[f32], n: usize) -> Result<Vec<SearchHit>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read()?;
        let vector_table = txn.open_table(self.vectors())?;

        let mut stored = Vec::new();
        for entry in vector_table.iter()? {
            let (k, v) = entry?;
            let vector: Vec<f32> = v
                .value()
                .chunks_exact(4)
                .map(bytemuck::pod_read_unaligned::<f32>)
                .collect();
            if vector.len() != embedding.len() {
                return Err(Error::VectorStore(format!(
                    "query has dimension {} but record {} has {}",
                    embedding.len(),
                    k.value(),
                    vector.len()
                )));
            }
            stored.push((k.value().to_string(), vector));
        }

        let mut scored: Vec<(String, f32)> = stored
            .into_par_iter()
            .map(|(id, vector)| {
                let distance = cosine_distance(embedding, &vector);
                (id, distance)
            })
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(n);

        let record_table = txn.open_table(self.records())?;
        let mut hits = Vec::with_capacity(scored.len());
        for (id, distance) in scored {
            let Some(guard) = record_table.get(id.as_str())? else {
                return Err(Error::VectorStore(format!(
                    "record {id} has a vector but no document"
                )));
            };
            let record = Self::decode_record(guard.value())?;
            hits.push(SearchHit {
                id,
                document: record.document,
                distance,
                metadata: record.metadata,
            });
        }
        Ok(hits)
    }

    fn fingerprints(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .all_metadata()?
            .into_iter()
            .map(|m| (m.file_path, m.fingerprint))
            .collect())
    }

    fn files(&self) -> Result<Vec<RecordMetadata>> {
        let mut by_path: HashMap<String, RecordMetadata> = HashMap::new();
        for metadata in self.all_metadata()? {
            let keep = by_path
                .get(&metadata.file_path)
                .is_some_and(|e| e.chunk_index <= metadata.chunk_index);
            if !keep {
                by_path.insert(metadata.file_path.clone(), metadata);
            }
        }
        let mut files: Vec<RecordMetadata> = by_path.into_values().collect();
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(files)
    }

    fn count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(self.records())?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }
}

impl std::fmt::Debug for RedbVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbVectorStore")
            .field("records_table", &self.records_table)
            .finish_non_exhaustive()
    }
}

/// `1 - cos(a, b)`. A zero vector has similarity 0 with everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
