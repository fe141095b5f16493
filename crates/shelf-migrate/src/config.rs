use crate::orchestrator::DEFAULT_PROGRESS_STRIDE;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DATA_DIR_ENV: &str = "SHELF_DATA_DIR";
pub const LEGACY_FILE_NAME: &str = "legacy.json";
pub const TARGET_FILE_NAME: &str = "library.sqlite3";
pub const FLAG_FILE_NAME: &str = "migration-flag.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("progress stride must be > 0")]
    InvalidStride,
    #[error("could not determine data directory: {0}")]
    DataDir(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub legacy_path: PathBuf,
    pub target_path: PathBuf,
    pub flag_path: PathBuf,
    pub progress_stride: usize,
}

impl MigrationConfig {
    pub fn from_data_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            legacy_path: dir.join(LEGACY_FILE_NAME),
            target_path: dir.join(TARGET_FILE_NAME),
            flag_path: dir.join(FLAG_FILE_NAME),
            progress_stride: DEFAULT_PROGRESS_STRIDE,
        }
    }

    /// Explicit directory, then `SHELF_DATA_DIR`, then the working directory.
    pub fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
        let from_env = std::env::var(DATA_DIR_ENV).ok();
        data_dir_from(explicit, from_env, std::env::current_dir)
    }

    pub fn with_progress_stride(mut self, stride: usize) -> Result<Self, ConfigError> {
        self.progress_stride = stride;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.progress_stride == 0 {
            return Err(ConfigError::InvalidStride);
        }
        Ok(())
    }
}

fn data_dir_from(
    explicit: Option<PathBuf>,
    from_env: Option<String>,
    current_dir: impl FnOnce() -> std::io::Result<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    if let Some(value) = from_env {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    Ok(current_dir()?)
}
