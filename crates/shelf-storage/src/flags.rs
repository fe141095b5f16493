use crate::StorageError;
use shelf_core::{CompletionFlag, FlagStore, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Completion flag persisted as a small JSON file next to the library.
///
/// A missing file reads as "not completed, version 0". Writes go through a
/// sibling temp file and a rename so a crash never leaves a torn flag.
#[derive(Debug, Clone)]
pub struct FileFlagStore {
    path: PathBuf,
}

impl FileFlagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl FlagStore for FileFlagStore {
    fn load(&self) -> Result<CompletionFlag, StoreError> {
        if !self.path.exists() {
            return Ok(CompletionFlag::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(StorageError::from)?;
        let flag = serde_json::from_str::<CompletionFlag>(&raw)
            .map_err(|err| StorageError::Serialization(format!("completion flag: {err}")))?;
        Ok(flag)
    }

    fn store(&self, flag: CompletionFlag) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(StorageError::from)?;
            }
        }
        let payload = serde_json::to_vec_pretty(&flag)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let temp = self.temp_path();
        fs::write(&temp, payload).map_err(StorageError::from)?;
        fs::rename(&temp, &self.path).map_err(StorageError::from)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    flag: Mutex<CompletionFlag>,
}

impl MemoryFlagStore {
    pub fn new(flag: CompletionFlag) -> Self {
        Self {
            flag: Mutex::new(flag),
        }
    }
}

impl FlagStore for MemoryFlagStore {
    fn load(&self) -> Result<CompletionFlag, StoreError> {
        self.flag
            .lock()
            .map(|flag| *flag)
            .map_err(|_| StoreError::Backend("completion flag lock poisoned".to_string()))
    }

    fn store(&self, flag: CompletionFlag) -> Result<(), StoreError> {
        let mut guard = self
            .flag
            .lock()
            .map_err(|_| StoreError::Backend("completion flag lock poisoned".to_string()))?;
        *guard = flag;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_as_not_completed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = FileFlagStore::new(dir.path().join("flag.json"));
        assert_eq!(store.load().expect("load"), CompletionFlag::default());
    }

    #[test]
    fn file_flag_survives_a_new_handle() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("flag.json");
        FileFlagStore::new(&path)
            .store(CompletionFlag {
                completed: true,
                version: 1,
            })
            .expect("store");

        let reopened = FileFlagStore::new(&path);
        let flag = reopened.load().expect("load");
        assert!(flag.completed);
        assert_eq!(flag.version, 1);
        assert!(!reopened.temp_path().exists());
    }

    #[test]
    fn corrupt_flag_file_is_a_decode_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("flag.json");
        fs::write(&path, "yes please").expect("write junk");
        assert!(matches!(
            FileFlagStore::new(path).load(),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn memory_flag_roundtrip() {
        let store = MemoryFlagStore::default();
        assert!(!store.load().expect("load").completed);
        store
            .store(CompletionFlag {
                completed: true,
                version: 1,
            })
            .expect("store");
        assert_eq!(
            store.load().expect("load"),
            CompletionFlag {
                completed: true,
                version: 1
            }
        );
    }
}
