//! JSON file-backed snapshot store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use super::{SnapshotStore, StorageResult};

/// Stores one snapshot as a JSON document on disk.
///
/// Writes land in `<path>.tmp` first and are renamed over the target, so a
/// reader never observes a half-written document.
pub struct JsonFileStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<T> SnapshotStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> StorageResult<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &T) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, snapshot)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<HashMap<String, u32>> =
            JsonFileStore::new(dir.path().join("absent.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store: JsonFileStore<HashMap<String, u32>> = JsonFileStore::new(&path);

        let mut snapshot = HashMap::new();
        snapshot.insert("10.0.0.1".to_string(), 3);
        store.save(&snapshot).unwrap();

        assert!(path.exists());
        assert!(!store.temp_path().exists());

        let reopened: JsonFileStore<HashMap<String, u32>> = JsonFileStore::new(&path);
        assert_eq!(reopened.load().unwrap(), Some(snapshot));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let store: JsonFileStore<HashMap<String, u32>> = JsonFileStore::new(&path);
        assert!(store.load().is_err());
    }
}
