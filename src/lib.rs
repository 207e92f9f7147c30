//! fileseek - incremental semantic search over local documents.
//!
//! fileseek walks a directory, extracts text from plain-text, Markdown, PDF,
//! DOCX and PPTX files, splits it into overlapping chunks, embeds the chunks
//! and stores them in a local [redb](https://github.com/cberner/redb)
//! database. Re-indexing only touches files whose content changed. Queries
//! are answered per file, blending semantic similarity with keyword,
//! coverage, recency and exact-match signals.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fileseek::{
//!     DataDir, RedbVectorStore, Settings,
//!     extract::FileExtractor,
//!     indexer::Indexer,
//!     search::SearchEngine,
//!     vector_store::VectorIndex,
//! };
//!
//! let settings = Settings::default();
//! let data_dir = DataDir::resolve(None).unwrap();
//! let store: Arc<dyn VectorIndex> = Arc::new(
//!     RedbVectorStore::open(&data_dir.index_db(), &settings.collection).unwrap(),
//! );
//! let embedder = settings.embedder().unwrap();
//!
//! let indexer = Indexer::new(
//!     Arc::new(FileExtractor),
//!     embedder.clone(),
//!     store.clone(),
//!     settings.chunking,
//!     settings.walk_options(),
//! )
//! .unwrap();
//! indexer
//!     .index_directory("/home/me/Documents".as_ref(), |_, _, _| {})
//!     .unwrap();
//!
//! let engine = SearchEngine::new(embedder, store);
//! for r in engine.search("tax return 2023", 5).unwrap() {
//!     println!("{} (score: {:.3})", r.file_path, r.score);
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod data_dir;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod incremental;
pub mod indexer;
pub mod opener;
pub mod search;
pub mod server;
pub mod settings;
pub mod status;
pub mod text_util;
pub mod vector_store;
pub mod walker;

pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use settings::Settings;
pub use vector_store::RedbVectorStore;
