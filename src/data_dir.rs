use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DATA_DIR_ENV: &str = "FILESEEK_DATA_DIR";
const INDEX_DB_FILE: &str = "index.redb";

/// Where fileseek keeps its index.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// `--data-dir`, else `$FILESEEK_DATA_DIR`, else `$XDG_DATA_HOME/fileseek`.
    ///
    /// The directory is created if missing.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        let root = match pick_root(explicit, from_env) {
            Some(root) => root,
            None => xdg_data_home()?,
        };
        Self::create(root)
    }

    fn create(root: PathBuf) -> Result<Self> {
        if root.exists() && !root.is_dir() {
            return Err(Error::DataDir(root));
        }
        std::fs::create_dir_all(&root).map_err(|_| Error::DataDir(root.clone()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The redb database holding every collection's records and vectors.
    pub fn index_db(&self) -> PathBuf {
        self.root.join(INDEX_DB_FILE)
    }
}

fn pick_root(explicit: Option<&Path>, from_env: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or(from_env.filter(|p| !p.as_os_str().is_empty()))
}

fn xdg_data_home() -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix("fileseek")
        .get_data_home()
        .ok_or_else(|| Error::Config("could not determine XDG data home".into()))
}
