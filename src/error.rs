use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("vector store error: {0}")]
    Redb(#[from] redb::Error),

    #[error("vector store database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("vector store storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("vector store transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("vector store table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("vector store commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedding service error: {0}")]
    Embedding(String),

    #[error("failed to extract text from {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("an indexing run is already in progress")]
    IndexingInProgress,

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    /// Errors that only affect a single file during an indexing run.
    ///
    /// Everything else is a service-level failure that aborts the run.
    pub fn is_per_file(&self) -> bool {
        matches!(self, Error::Extraction { .. })
    }

    pub(crate) fn extraction(
        path: impl Into<PathBuf>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Error::Extraction {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
