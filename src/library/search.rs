// src/library/search.rs
use std::cmp::Ordering;
use std::collections::btree_map::Values;
use uuid::Uuid;
use crate::game::{GameEntry, GameType};

/// Exact-match filters applied on top of the name query. Category and tag
/// comparisons ignore ASCII case.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub main_category: Option<String>,
    pub sub_category: Option<String>,
    pub tag: Option<String>,
    pub game_type: Option<GameType>,
    pub players: Option<u8>,
    pub min_rating: Option<u8>,
}

impl SearchFilters {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.main_category = Some(category.into());
        self
    }

    pub fn sub_category(mut self, category: impl Into<String>) -> Self {
        self.sub_category = Some(category.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn game_type(mut self, game_type: GameType) -> Self {
        self.game_type = Some(game_type);
        self
    }

    pub fn players(mut self, players: u8) -> Self {
        self.players = Some(players);
        self
    }

    pub fn min_rating(mut self, rating: u8) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn matches(&self, entry: &GameEntry) -> bool {
        if let Some(category) = &self.main_category {
            if !entry.has_main_category(category) {
                return false;
            }
        }
        if let Some(category) = &self.sub_category {
            if !entry.has_sub_category(category) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !entry.has_tag(tag) {
                return false;
            }
        }
        if let Some(game_type) = self.game_type {
            if entry.game_type != game_type {
                return false;
            }
        }
        if let Some(players) = self.players {
            if entry.players != players {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if entry.rating.map_or(true, |r| r < min) {
                return false;
            }
        }
        true
    }
}

/// Lazy walk over the index. Each call to `LibraryManager::search` starts a
/// fresh walk; nothing is cached between calls.
#[derive(Clone)]
pub struct Search<'a> {
    entries: Values<'a, Uuid, GameEntry>,
    needle: String,
    filters: &'a SearchFilters,
}

impl<'a> Search<'a> {
    pub(crate) fn new(entries: Values<'a, Uuid, GameEntry>, query: &str, filters: &'a SearchFilters) -> Self {
        Self {
            entries,
            needle: query.trim().to_lowercase(),
            filters,
        }
    }

    fn name_matches(&self, entry: &GameEntry) -> bool {
        self.needle.is_empty() || entry.name.to_lowercase().contains(&self.needle)
    }
}

impl<'a> Iterator for Search<'a> {
    type Item = &'a GameEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = self.entries.next()?;
            if self.name_matches(entry) && self.filters.matches(entry) {
                return Some(entry);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Name,
    LastPlayed,
    Playtime,
    Rating,
    RecentlyCreated,
}

impl SortOrder {
    pub fn sort(self, entries: &mut [&GameEntry]) {
        entries.sort_by(|a, b| self.compare(a, b).then_with(|| by_name(a, b)));
    }

    fn compare(self, a: &GameEntry, b: &GameEntry) -> Ordering {
        match self {
            SortOrder::Name => by_name(a, b),
            SortOrder::LastPlayed => b.last_played.cmp(&a.last_played),
            SortOrder::Playtime => b.playtime_secs.cmp(&a.playtime_secs),
            SortOrder::Rating => b.rating.cmp(&a.rating),
            SortOrder::RecentlyCreated => b.created_at.cmp(&a.created_at),
        }
    }
}

fn by_name(a: &GameEntry, b: &GameEntry) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}
