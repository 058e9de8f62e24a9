// src/library/mod.rs - Game library: owns the entries and their folders
pub mod archive;
pub mod import;
pub mod profile;
pub mod search;

use std::path::{Path, PathBuf};
use std::time::Duration;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    config::AppPaths,
    errors::GameBoxError,
    game::{sanitize_filename, template, GameEntry, GameMetadata, LibraryIndex, MetadataPatch},
    store::MetadataStore,
};

pub use archive::{ArchiveManifest, ARCHIVE_MANIFEST_NAME};
pub use profile::LibraryProfile;
pub use search::{Search, SearchFilters, SortOrder};

pub struct LibraryManager {
    paths: AppPaths,
    store: MetadataStore,
    index: LibraryIndex,
}

impl LibraryManager {
    /// Opens the library under `paths`. An unreadable library file is set
    /// aside and replaced by an empty library.
    pub fn open(paths: AppPaths) -> Result<Self, GameBoxError> {
        log::info!("Opening library at {}", paths.root().display());
        paths.ensure_dirs()?;

        let store = MetadataStore::new(paths.library_file());
        let index = match store.load() {
            Ok(index) => index,
            Err(e) => {
                log::warn!("{}; falling back to an empty library", e);
                store.quarantine();
                LibraryIndex::new()
            }
        };

        Ok(Self { paths, store, index })
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn games_dir(&self) -> PathBuf {
        self.paths.games_dir()
    }

    pub fn get(&self, id: &Uuid) -> Option<&GameEntry> {
        self.index.get(id)
    }

    pub fn list(&self) -> impl Iterator<Item = &GameEntry> + '_ {
        self.index.iter()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &LibraryIndex {
        &self.index
    }

    pub fn game_folder(&self, id: &Uuid) -> Option<PathBuf> {
        self.index.get(id).map(|entry| self.folder_of(entry))
    }

    pub fn folder_of(&self, entry: &GameEntry) -> PathBuf {
        self.paths.games_dir().join(&entry.folder)
    }

    /// Absolute path of the entry file, which must exist.
    pub fn entry_path(&self, id: &Uuid) -> Result<PathBuf, GameBoxError> {
        let entry = self.index.get(id).ok_or(GameBoxError::NotFound(*id))?;
        let path = self.folder_of(entry).join(&entry.entry_file);
        if !path.is_file() {
            return Err(GameBoxError::StorageError(format!(
                "Entry file of '{}' is missing: {}",
                entry.name,
                path.display()
            )));
        }
        Ok(path)
    }

    /// Creates a game with a starter page as its entry file.
    pub fn create_game(&mut self, metadata: GameMetadata) -> Result<GameEntry, GameBoxError> {
        let starter = template::starter_html(metadata.name.trim(), metadata.game_type);
        self.create_game_with_source(metadata, &starter)
    }

    /// Creates a game whose entry file holds `source`. Nothing is left on disk
    /// or in the index if any step fails.
    pub fn create_game_with_source(&mut self, metadata: GameMetadata, source: &str) -> Result<GameEntry, GameBoxError> {
        let id = self.allocate_id();
        let folder = self.allocate_folder(&metadata.name, &id);
        let entry = GameEntry::from_metadata(id, folder, metadata);
        entry.validate()?;

        let game_folder = self.folder_of(&entry);
        let written = (|| -> std::io::Result<()> {
            let entry_path = game_folder.join(&entry.entry_file);
            if let Some(parent) = entry_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&entry_path, source)
        })();
        if let Err(e) = written {
            let _ = std::fs::remove_dir_all(&game_folder);
            return Err(GameBoxError::IoError(e));
        }

        self.insert_and_persist(entry.clone(), &game_folder)?;
        log::info!("Created game '{}' ({}) in {}", entry.name, entry.id, game_folder.display());
        Ok(entry)
    }

    /// Removes the entry and its folder. Unknown ids are ignored.
    pub fn delete_game(&mut self, id: &Uuid) -> Result<(), GameBoxError> {
        let entry = match self.index.remove(id) {
            Some(entry) => entry,
            None => {
                log::debug!("delete_game: {} is not in the library", id);
                return Ok(());
            }
        };

        if let Err(e) = self.store.save(&self.index) {
            self.index.insert(entry);
            return Err(e);
        }

        let folder = self.folder_of(&entry);
        if folder.exists() {
            if let Err(e) = std::fs::remove_dir_all(&folder) {
                log::warn!("Deleted '{}' but could not remove {}: {}", entry.name, folder.display(), e);
            }
        }
        log::info!("Deleted game '{}' ({})", entry.name, id);
        Ok(())
    }

    /// Merges `patch` into the entry. The stored entry is untouched unless the
    /// merged result validates and is saved.
    pub fn update_metadata(&mut self, id: &Uuid, patch: MetadataPatch) -> Result<GameEntry, GameBoxError> {
        let current = self.index.get(id).ok_or(GameBoxError::NotFound(*id))?.clone();

        let mut updated = current.clone();
        updated.apply_patch(patch);
        updated.validate()?;

        if updated.entry_file != current.entry_file {
            let new_entry = self.folder_of(&updated).join(&updated.entry_file);
            if !new_entry.is_file() {
                return Err(GameBoxError::ValidationError(format!(
                    "entry file '{}' does not exist in the game folder",
                    updated.entry_file
                )));
            }
        }

        self.index.insert(updated.clone());
        if let Err(e) = self.store.save(&self.index) {
            self.index.insert(current);
            return Err(e);
        }
        log::info!("Updated metadata of '{}'", updated.name);
        Ok(updated)
    }

    /// Adds a finished play session. A game deleted mid-session is skipped.
    pub fn record_play_session(&mut self, id: &Uuid, elapsed: Duration) -> Result<(), GameBoxError> {
        let Some(entry) = self.index.get_mut(id) else {
            log::warn!("Play session for {} ignored, the game is no longer in the library", id);
            return Ok(());
        };
        entry.playtime_secs = entry.playtime_secs.saturating_add(elapsed.as_secs());
        entry.last_played = Some(Utc::now());
        log::info!("Recorded {}s of play for '{}'", elapsed.as_secs(), entry.name);
        self.store.save(&self.index)
    }

    pub fn record_edit(&mut self, id: &Uuid) -> Result<(), GameBoxError> {
        let Some(entry) = self.index.get_mut(id) else {
            log::warn!("Edit for {} ignored, the game is no longer in the library", id);
            return Ok(());
        };
        entry.edit_count = entry.edit_count.saturating_add(1);
        self.store.save(&self.index)
    }

    pub fn search<'a>(&'a self, query: &'a str, filters: &'a SearchFilters) -> Search<'a> {
        Search::new(self.index.iter(), query, filters)
    }

    pub fn search_sorted<'a>(&'a self, query: &'a str, filters: &'a SearchFilters, order: SortOrder) -> Vec<&'a GameEntry> {
        let mut found: Vec<&GameEntry> = self.search(query, filters).collect();
        order.sort(&mut found);
        found
    }

    pub fn library_profile(&self) -> LibraryProfile {
        LibraryProfile::from_entries(self.index.iter())
    }

    fn allocate_id(&self) -> Uuid {
        loop {
            let id = Uuid::new_v4();
            if !self.index.contains(&id) {
                return id;
            }
        }
    }

    fn allocate_folder(&self, name: &str, id: &Uuid) -> String {
        let base = sanitize_filename(name);
        let taken = |folder: &str| {
            self.index.folder_in_use(folder, None) || self.paths.games_dir().join(folder).exists()
        };
        if !taken(&base) {
            return base;
        }
        let short = id.simple().to_string();
        format!("{}_{}", base, &short[..8])
    }

    /// Inserts a game whose folder is already on disk, removing the folder
    /// again if the index cannot be saved.
    fn insert_and_persist(&mut self, entry: GameEntry, game_folder: &Path) -> Result<(), GameBoxError> {
        let id = entry.id;
        self.index.insert(entry);
        if let Err(e) = self.store.save(&self.index) {
            self.index.remove(&id);
            let _ = std::fs::remove_dir_all(game_folder);
            return Err(e);
        }
        Ok(())
    }
}
