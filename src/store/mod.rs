// src/store/mod.rs
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::{
    errors::GameBoxError,
    game::{GameEntry, LibraryIndex},
};

pub const LIBRARY_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct LibraryFileData {
    version: u32,
    games: Vec<GameEntry>,
}

/// Persists the library index as one JSON document.
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty library. Anything unreadable is a `StorageError`.
    pub fn load(&self) -> Result<LibraryIndex, GameBoxError> {
        if !self.path.exists() {
            log::info!("No library file at {}, starting empty", self.path.display());
            return Ok(LibraryIndex::new());
        }

        let bytes = std::fs::read(&self.path).map_err(|e| {
            GameBoxError::StorageError(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let data: LibraryFileData = serde_json::from_slice(&bytes).map_err(|e| {
            GameBoxError::StorageError(format!("Library file {} is corrupt: {}", self.path.display(), e))
        })?;

        if data.version != LIBRARY_FORMAT_VERSION {
            return Err(GameBoxError::StorageError(format!(
                "Unsupported library format version: {}",
                data.version
            )));
        }

        let mut index = LibraryIndex::new();
        for entry in data.games {
            let id = entry.id;
            if index.insert(entry).is_some() {
                return Err(GameBoxError::StorageError(format!("Duplicate game id {} in library file", id)));
            }
        }

        log::info!("Loaded {} games from {}", index.len(), self.path.display());
        Ok(index)
    }

    /// Writes to a sibling temp file, syncs it and renames it over the old document.
    pub fn save(&self, index: &LibraryIndex) -> Result<(), GameBoxError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = LibraryFileData {
            version: LIBRARY_FORMAT_VERSION,
            games: index.iter().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&data)
            .map_err(|e| GameBoxError::StorageError(format!("Failed to serialize library: {}", e)))?;

        write_atomic(&self.path, &json)
            .map_err(|e| GameBoxError::StorageError(format!("Failed to save {}: {}", self.path.display(), e)))?;

        log::debug!("Library saved to {}", self.path.display());
        Ok(())
    }

    /// Moves an unreadable document aside so the next save does not destroy it.
    pub fn quarantine(&self) -> Option<PathBuf> {
        if !self.path.exists() {
            return None;
        }
        let target = self.path.with_extension("json.corrupt");
        match std::fs::rename(&self.path, &target) {
            Ok(()) => {
                log::warn!("Moved unreadable library file to {}", target.display());
                Some(target)
            }
            Err(e) => {
                log::error!("Could not move unreadable library file aside: {}", e);
                None
            }
        }
    }
}

/// Temp file in the same directory, fsync, rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4().simple()));

    let result = (|| {
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(contents)?;
        tmp_file.sync_all()?;
        drop(tmp_file);
        std::fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameMetadata, GameType};
    use uuid::Uuid;

    fn sample_index() -> LibraryIndex {
        let metadata = GameMetadata::new("Snake", GameType::TwoD, 1, vec!["Arcade".to_string()]);
        let entry = GameEntry::from_metadata(Uuid::new_v4(), "Snake".to_string(), metadata);
        vec![entry].into_iter().collect()
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("library.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path().join("library.json"));
        let index = sample_index();
        store.save(&index).unwrap();
        assert_eq!(store.load().unwrap(), index);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(&path, b"{ not json").unwrap();
        let store = MetadataStore::new(path);
        assert!(matches!(store.load(), Err(GameBoxError::StorageError(_))));
    }

    #[test]
    fn unknown_version_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(&path, br#"{"version": 99, "games": []}"#).unwrap();
        let store = MetadataStore::new(path);
        assert!(matches!(store.load(), Err(GameBoxError::StorageError(_))));
    }

    #[test]
    fn quarantine_moves_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        std::fs::write(&path, b"garbage").unwrap();
        let store = MetadataStore::new(path.clone());
        let moved = store.quarantine().unwrap();
        assert!(!path.exists());
        assert_eq!(std::fs::read(moved).unwrap(), b"garbage");
    }
}
