// src/game/index.rs
use std::collections::btree_map::{BTreeMap, Values};
use uuid::Uuid;
use super::GameEntry;

/// All entries of the library keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryIndex {
    games: BTreeMap<Uuid, GameEntry>,
}

impl LibraryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any entry with the same id and returns it.
    pub fn insert(&mut self, entry: GameEntry) -> Option<GameEntry> {
        self.games.insert(entry.id, entry)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<GameEntry> {
        self.games.remove(id)
    }

    pub fn get(&self, id: &Uuid) -> Option<&GameEntry> {
        self.games.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut GameEntry> {
        self.games.get_mut(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.games.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn iter(&self) -> Values<'_, Uuid, GameEntry> {
        self.games.values()
    }

    /// Whether some entry other than `except` already uses `folder`.
    pub fn folder_in_use(&self, folder: &str, except: Option<&Uuid>) -> bool {
        self.games
            .values()
            .any(|g| Some(&g.id) != except && g.folder == folder)
    }
}

impl FromIterator<GameEntry> for LibraryIndex {
    fn from_iter<I: IntoIterator<Item = GameEntry>>(iter: I) -> Self {
        let mut index = LibraryIndex::new();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}
