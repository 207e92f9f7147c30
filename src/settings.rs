//! Runtime configuration.
//!
//! Every setting is a CLI flag with a `FILESEEK_*` environment fallback.
//! [`SettingsArgs`] is what clap parses; [`Settings`] is the validated form
//! the rest of the crate consumes.

use std::{sync::Arc, time::Duration};

use clap::Args;
use tracing::info;

use crate::{
    chunking::{ChunkingConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE},
    embedding::{
        DEFAULT_BASE_URL,
        DEFAULT_MODEL,
        Embedder,
        HashingEmbedder,
        OllamaEmbedder,
    },
    error::{Error, Result},
    walker::WalkOptions,
};

pub const DEFAULT_EXTENSIONS: [&str; 5] = [".txt", ".md", ".pdf", ".docx", ".pptx"];
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 100;
pub const DEFAULT_RESULTS: usize = 5;
pub const DEFAULT_COLLECTION: &str = "file_embeddings";
pub const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Args)]
pub struct SettingsArgs {
    /// Base URL of the Ollama embedding service
    #[arg(long, env = "FILESEEK_EMBEDDING_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub embedding_url: String,

    /// Embedding model name
    #[arg(long, env = "FILESEEK_EMBEDDING_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub embedding_model: String,

    /// Embedding request timeout in seconds
    #[arg(long, env = "FILESEEK_EMBEDDING_TIMEOUT", default_value_t = DEFAULT_EMBEDDING_TIMEOUT_SECS, global = true)]
    pub embedding_timeout: u64,

    /// Use the offline hashing embedder instead of the embedding service
    #[arg(long, env = "FILESEEK_FAKE_EMBEDDINGS", global = true)]
    pub fake_embeddings: bool,

    /// Chunk size in characters
    #[arg(long, env = "FILESEEK_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE, global = true)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "FILESEEK_CHUNK_OVERLAP", default_value_t = DEFAULT_CHUNK_OVERLAP, global = true)]
    pub chunk_overlap: usize,

    /// Skip files larger than this many megabytes
    #[arg(long, env = "FILESEEK_MAX_FILE_SIZE_MB", default_value_t = DEFAULT_MAX_FILE_SIZE_MB, global = true)]
    pub max_file_size_mb: u64,

    /// Comma-separated list of file extensions to index
    #[arg(
        long,
        env = "FILESEEK_EXTENSIONS",
        value_delimiter = ',',
        default_value = ".txt,.md,.pdf,.docx,.pptx",
        global = true
    )]
    pub extensions: Vec<String>,

    /// Default number of search results
    #[arg(long, env = "FILESEEK_DEFAULT_RESULTS", default_value_t = DEFAULT_RESULTS, global = true)]
    pub default_results: usize,

    /// Name of the vector store collection
    #[arg(long, env = "FILESEEK_COLLECTION", default_value = DEFAULT_COLLECTION, global = true)]
    pub collection: String,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_timeout: Duration,
    pub fake_embeddings: bool,
    pub chunking: ChunkingConfig,
    pub max_file_size: u64,
    /// Lower-case extensions with a leading dot.
    pub extensions: Vec<String>,
    pub default_results: usize,
    pub collection: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            embedding_url: DEFAULT_BASE_URL.to_string(),
            embedding_model: DEFAULT_MODEL.to_string(),
            embedding_timeout: Duration::from_secs(DEFAULT_EMBEDDING_TIMEOUT_SECS),
            fake_embeddings: false,
            chunking: ChunkingConfig::default(),
            max_file_size: DEFAULT_MAX_FILE_SIZE_MB * 1024 * 1024,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            default_results: DEFAULT_RESULTS,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

impl TryFrom<SettingsArgs> for Settings {
    type Error = Error;

    fn try_from(args: SettingsArgs) -> Result<Self> {
        let extensions: Vec<String> = args
            .extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| e.len() > 1)
            .collect();

        let settings = Settings {
            embedding_url: args.embedding_url,
            embedding_model: args.embedding_model,
            embedding_timeout: Duration::from_secs(args.embedding_timeout),
            fake_embeddings: args.fake_embeddings,
            chunking: ChunkingConfig {
                chunk_size: args.chunk_size,
                overlap: args.chunk_overlap,
            },
            max_file_size: args.max_file_size_mb.saturating_mul(1024 * 1024),
            extensions,
            default_results: args.default_results,
            collection: args.collection,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.max_file_size == 0 {
            return Err(Error::Config("maximum file size must be positive".into()));
        }
        if self.extensions.is_empty() {
            return Err(Error::Config("at least one file extension is required".into()));
        }
        if self.default_results == 0 {
            return Err(Error::Config("default result count must be positive".into()));
        }
        if self.collection.trim().is_empty() {
            return Err(Error::Config("collection name must not be empty".into()));
        }
        if !self.fake_embeddings && self.embedding_model.trim().is_empty() {
            return Err(Error::Config("embedding model must not be empty".into()));
        }
        Ok(())
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            extensions: self.extensions.clone(),
            max_file_size: self.max_file_size,
        }
    }

    /// Build the configured embedder.
    ///
    /// The HTTP-backed embedder uses a blocking client and must be built
    /// outside of an async runtime.
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        if self.fake_embeddings {
            info!("using offline hashing embedder");
            return Ok(Arc::new(HashingEmbedder::default()));
        }
        Ok(Arc::new(OllamaEmbedder::new(
            &self.embedding_url,
            &self.embedding_model,
            self.embedding_timeout,
        )?))
    }
}

/// Lower-case an extension and make sure it has a leading dot.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: SettingsArgs,
    }

    fn parse(args: &[&str]) -> Result<Settings> {
        let mut argv = vec!["fileseek"];
        argv.extend_from_slice(args);
        Settings::try_from(TestCli::parse_from(argv).settings)
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = parse(&[]).unwrap();
        // environment may override defaults on a developer machine
        if std::env::vars().any(|(k, _)| k.starts_with("FILESEEK_")) {
            return;
        }
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_file_size, 100 * 1024 * 1024);
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.overlap, 200);
    }

    #[test]
    fn extensions_are_normalized() {
        let settings = parse(&["--extensions", "TXT, .Md,pdf"]).unwrap();
        assert_eq!(settings.extensions, vec![".txt", ".md", ".pdf"]);
    }

    #[test]
    fn invalid_overlap_is_rejected() {
        let err = parse(&["--chunk-size", "100", "--chunk-overlap", "100"])
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_results_is_rejected() {
        assert!(parse(&["--default-results", "0"]).is_err());
    }

    #[test]
    fn walk_options_carry_limits() {
        let settings = parse(&["--max-file-size-mb", "2"]).unwrap();
        let walk = settings.walk_options();
        assert_eq!(walk.max_file_size, 2 * 1024 * 1024);
        assert_eq!(walk.extensions, settings.extensions);
    }

    #[test]
    fn fake_embeddings_selects_hashing_embedder() {
        let settings = Settings {
            fake_embeddings: true,
            ..Settings::default()
        };
        assert_eq!(settings.embedder().unwrap().model_id(), "hashing");
    }
}
