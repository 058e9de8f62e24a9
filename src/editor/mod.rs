// src/editor/mod.rs - Source access for the instant editor and the assistant
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::{
    errors::GameBoxError,
    game::{determine_asset_type, AssetType, GameEntry},
    library::LibraryManager,
    store::write_atomic,
};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Who wrote a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOrigin {
    Manual,
    Assistant,
}

/// Sent after every completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChanged {
    pub game_id: Uuid,
    pub path: PathBuf,
    pub origin: EditOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub asset_type: AssetType,
    pub size: u64,
}

/// Reads and writes a game's text sources. Writes replace whole files and are
/// serialized per path, so two writers never interleave.
pub struct CodeEditorBridge {
    games_dir: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    changes: broadcast::Sender<FileChanged>,
}

impl CodeEditorBridge {
    pub fn new(games_dir: PathBuf) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            games_dir,
            locks: Mutex::new(HashMap::new()),
            changes,
        }
    }

    pub fn for_library(library: &LibraryManager) -> Self {
        Self::new(library.games_dir())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FileChanged> {
        self.changes.subscribe()
    }

    /// Editable files of a game, sorted by path.
    pub fn list_sources(&self, entry: &GameEntry) -> Result<Vec<SourceFile>, GameBoxError> {
        let folder = self.games_dir.join(&entry.folder);
        let mut sources = Vec::new();
        for item in WalkDir::new(&folder).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
            let item = item.map_err(|e| GameBoxError::EditorError(format!("Failed to list sources: {}", e)))?;
            if !item.file_type().is_file() {
                continue;
            }
            let Some(asset_type) = determine_asset_type(item.path()).filter(|t| t.is_editable()) else {
                continue;
            };
            let size = item.metadata().map(|m| m.len()).unwrap_or(0);
            if let Ok(relative) = item.path().strip_prefix(&folder) {
                sources.push(SourceFile {
                    path: relative.to_path_buf(),
                    asset_type,
                    size,
                });
            }
        }
        Ok(sources)
    }

    pub fn read_source(&self, entry: &GameEntry, relative: &str) -> Result<String, GameBoxError> {
        let path = self.resolve(entry, relative)?;
        std::fs::read_to_string(&path).map_err(|e| {
            GameBoxError::EditorError(format!("Failed to read {}: {}", path.display(), e))
        })
    }

    /// Replaces the whole file and notifies subscribers.
    pub fn write_source(&self, entry: &GameEntry, relative: &str, contents: &str, origin: EditOrigin) -> Result<(), GameBoxError> {
        let path = self.resolve(entry, relative)?;
        let lock = self.lock_for(&path);
        let written = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            path.parent()
                .map_or(Ok(()), std::fs::create_dir_all)
                .and_then(|_| write_atomic(&path, contents.as_bytes()))
        };
        self.release_lock(&path, lock);
        written.map_err(|e| GameBoxError::EditorError(format!("Failed to write {}: {}", path.display(), e)))?;

        log::debug!("{:?} edit written to {}", origin, path.display());
        // No subscribers is fine.
        let _ = self.changes.send(FileChanged {
            game_id: entry.id,
            path: PathBuf::from(relative),
            origin,
        });
        Ok(())
    }

    /// Writes the file and counts the edit against the game.
    pub fn save_edit(
        &self,
        library: &mut LibraryManager,
        id: &Uuid,
        relative: &str,
        contents: &str,
        origin: EditOrigin,
    ) -> Result<(), GameBoxError> {
        let entry = library.get(id).ok_or(GameBoxError::NotFound(*id))?.clone();
        self.write_source(&entry, relative, contents, origin)?;
        library.record_edit(id)
    }

    fn resolve(&self, entry: &GameEntry, relative: &str) -> Result<PathBuf, GameBoxError> {
        let cleaned = validate_relative_path(relative)?;
        match determine_asset_type(&cleaned) {
            Some(t) if t.is_editable() => {}
            _ => {
                return Err(GameBoxError::EditorError(format!("{} is not an editable source file", relative)));
            }
        }
        Ok(self.games_dir.join(&entry.folder).join(cleaned))
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Drops the path's lock from the map once no other writer holds it.
    fn release_lock(&self, path: &Path, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // one reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

/// Accepts plain relative paths only.
pub fn validate_relative_path(path: &str) -> Result<PathBuf, GameBoxError> {
    let input = Path::new(path);
    if input.is_absolute() {
        return Err(GameBoxError::EditorError(format!("Absolute paths are not allowed: {}", path)));
    }

    let mut cleaned = PathBuf::new();
    for component in input.components() {
        match component {
            Component::Normal(part) => cleaned.push(part),
            Component::CurDir => {}
            _ => return Err(GameBoxError::EditorError(format!("Invalid path component in {}", path))),
        }
    }

    if cleaned.as_os_str().is_empty() {
        return Err(GameBoxError::EditorError("Empty file path".to_string()));
    }

    Ok(cleaned)
}
