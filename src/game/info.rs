// src/game/info.rs
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::errors::GameBoxError;

pub const MAX_MAIN_CATEGORIES: usize = 5;
pub const MAX_NAME_LEN: usize = 120;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
pub const DEFAULT_ENTRY_FILE: &str = "index.html";
pub const DEFAULT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    #[serde(rename = "2D")]
    TwoD,
    #[serde(rename = "3D")]
    ThreeD,
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GameType::TwoD => write!(f, "2D"),
            GameType::ThreeD => write!(f, "3D"),
        }
    }
}

impl FromStr for GameType {
    type Err = GameBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2d" | "2" => Ok(GameType::TwoD),
            "3d" | "3" => Ok(GameType::ThreeD),
            other => Err(GameBoxError::ValidationError(format!(
                "game type must be 2D or 3D, got '{}'",
                other
            ))),
        }
    }
}

/// One game in the library. The folder is relative to the games directory and
/// the entry file is relative to that folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEntry {
    pub id: Uuid,
    pub name: String,
    pub version: String,
    pub game_type: GameType,
    pub players: u8,
    pub main_categories: Vec<String>,
    #[serde(default)]
    pub sub_categories: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub entry_file: String,
    pub folder: String,
    #[serde(default)]
    pub playtime_secs: u64,
    #[serde(default)]
    pub edit_count: u32,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl GameEntry {
    pub fn from_metadata(id: Uuid, folder: String, metadata: GameMetadata) -> Self {
        Self {
            id,
            name: metadata.name.trim().to_string(),
            version: metadata.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            game_type: metadata.game_type,
            players: metadata.players,
            main_categories: metadata.main_categories,
            sub_categories: metadata.sub_categories,
            tags: metadata.tags,
            description: metadata.description,
            entry_file: metadata.entry_file.unwrap_or_else(|| DEFAULT_ENTRY_FILE.to_string()),
            folder,
            playtime_secs: 0,
            edit_count: 0,
            last_played: None,
            rating: metadata.rating,
            notes: metadata.notes,
            created_at: Utc::now(),
        }
    }

    /// The user-editable part of the entry, without id, folder or counters.
    pub fn to_metadata(&self) -> GameMetadata {
        GameMetadata {
            name: self.name.clone(),
            version: Some(self.version.clone()),
            game_type: self.game_type,
            players: self.players,
            main_categories: self.main_categories.clone(),
            sub_categories: self.sub_categories.clone(),
            tags: self.tags.clone(),
            description: self.description.clone(),
            entry_file: Some(self.entry_file.clone()),
            rating: self.rating,
            notes: self.notes.clone(),
        }
    }

    pub fn playtime(&self) -> Duration {
        Duration::from_secs(self.playtime_secs)
    }

    pub fn has_main_category(&self, category: &str) -> bool {
        contains_ignore_case(&self.main_categories, category)
    }

    pub fn has_sub_category(&self, category: &str) -> bool {
        contains_ignore_case(&self.sub_categories, category)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        contains_ignore_case(&self.tags, tag)
    }

    /// Checks the user-editable fields. Counters are never invalid.
    pub fn validate(&self) -> Result<(), GameBoxError> {
        validate_name(&self.name)?;
        validate_players(self.players)?;
        validate_categories("main category", &self.main_categories, true)?;
        validate_categories("sub category", &self.sub_categories, false)?;
        validate_rating(self.rating)?;
        validate_entry_file(&self.entry_file)?;
        if self.version.trim().is_empty() {
            return Err(GameBoxError::ValidationError("version must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn apply_patch(&mut self, patch: MetadataPatch) {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(version) = patch.version {
            self.version = version;
        }
        if let Some(game_type) = patch.game_type {
            self.game_type = game_type;
        }
        if let Some(players) = patch.players {
            self.players = players;
        }
        if let Some(main) = patch.main_categories {
            self.main_categories = main;
        }
        if let Some(sub) = patch.sub_categories {
            self.sub_categories = sub;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(entry_file) = patch.entry_file {
            self.entry_file = entry_file;
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }
}

/// What the user supplies when creating or importing a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub name: String,
    pub version: Option<String>,
    pub game_type: GameType,
    pub players: u8,
    pub main_categories: Vec<String>,
    pub sub_categories: Vec<String>,
    pub tags: Vec<String>,
    pub description: String,
    pub entry_file: Option<String>,
    pub rating: Option<u8>,
    pub notes: String,
}

impl GameMetadata {
    pub fn new(name: impl Into<String>, game_type: GameType, players: u8, main_categories: Vec<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            game_type,
            players,
            main_categories,
            sub_categories: Vec::new(),
            tags: Vec::new(),
            description: String::new(),
            entry_file: None,
            rating: None,
            notes: String::new(),
        }
    }

    pub fn with_entry_file(mut self, entry_file: impl Into<String>) -> Self {
        self.entry_file = Some(entry_file.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial update. `rating: Some(None)` clears the rating.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataPatch {
    pub name: Option<String>,
    pub version: Option<String>,
    pub game_type: Option<GameType>,
    pub players: Option<u8>,
    pub main_categories: Option<Vec<String>>,
    pub sub_categories: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub description: Option<String>,
    pub entry_file: Option<String>,
    pub rating: Option<Option<u8>>,
    pub notes: Option<String>,
}

fn contains_ignore_case(values: &[String], needle: &str) -> bool {
    values.iter().any(|v| v.eq_ignore_ascii_case(needle.trim()))
}

fn validate_name(name: &str) -> Result<(), GameBoxError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GameBoxError::ValidationError("name is required".to_string()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(GameBoxError::ValidationError(format!(
            "name is longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_players(players: u8) -> Result<(), GameBoxError> {
    match players {
        1 | 2 => Ok(()),
        other => Err(GameBoxError::ValidationError(format!(
            "player count must be 1 or 2, got {}",
            other
        ))),
    }
}

fn validate_categories(label: &str, categories: &[String], main: bool) -> Result<(), GameBoxError> {
    if main && categories.is_empty() {
        return Err(GameBoxError::ValidationError("at least one main category is required".to_string()));
    }
    if main && categories.len() > MAX_MAIN_CATEGORIES {
        return Err(GameBoxError::ValidationError(format!(
            "at most {} main categories are allowed, got {}",
            MAX_MAIN_CATEGORIES,
            categories.len()
        )));
    }
    for (i, category) in categories.iter().enumerate() {
        if category.trim().is_empty() {
            return Err(GameBoxError::ValidationError(format!("{} #{} is empty", label, i + 1)));
        }
        if categories[..i].iter().any(|c| c.trim().eq_ignore_ascii_case(category.trim())) {
            return Err(GameBoxError::ValidationError(format!(
                "{} '{}' is listed twice",
                label, category
            )));
        }
    }
    Ok(())
}

fn validate_rating(rating: Option<u8>) -> Result<(), GameBoxError> {
    match rating {
        Some(r) if !(MIN_RATING..=MAX_RATING).contains(&r) => Err(GameBoxError::ValidationError(format!(
            "rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, r
        ))),
        _ => Ok(()),
    }
}

pub fn validate_entry_file(entry_file: &str) -> Result<(), GameBoxError> {
    let path = Path::new(entry_file);
    let is_relative = !entry_file.is_empty()
        && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !is_relative {
        return Err(GameBoxError::ValidationError(format!(
            "entry file '{}' must be a path inside the game folder",
            entry_file
        )));
    }
    if !is_html_file(path) {
        return Err(GameBoxError::ValidationError(format!(
            "entry file '{}' must be an .html or .htm file",
            entry_file
        )));
    }
    Ok(())
}

pub fn is_html_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("html") | Some("htm")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maze() -> GameEntry {
        let metadata = GameMetadata::new("Maze", GameType::TwoD, 1, vec!["Puzzle".to_string()]);
        GameEntry::from_metadata(Uuid::new_v4(), "Maze".to_string(), metadata)
    }

    #[test]
    fn new_entry_starts_with_zero_counters() {
        let entry = maze();
        assert_eq!(entry.playtime_secs, 0);
        assert_eq!(entry.edit_count, 0);
        assert_eq!(entry.entry_file, DEFAULT_ENTRY_FILE);
        assert_eq!(entry.version, DEFAULT_VERSION);
        entry.validate().unwrap();
    }

    #[test]
    fn rejects_too_many_main_categories() {
        let mut entry = maze();
        entry.main_categories = ["A", "B", "C", "D", "E", "F"].iter().map(|s| s.to_string()).collect();
        let err = entry.validate().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_duplicate_and_empty_categories() {
        let mut entry = maze();
        entry.main_categories = vec!["Puzzle".to_string(), "puzzle".to_string()];
        assert!(entry.validate().is_err());
        entry.main_categories = vec!["  ".to_string()];
        assert!(entry.validate().is_err());
        entry.main_categories = Vec::new();
        assert!(entry.validate().is_err());
    }

    #[test]
    fn rating_and_players_ranges() {
        let mut entry = maze();
        entry.rating = Some(0);
        assert!(entry.validate().is_err());
        entry.rating = Some(5);
        assert!(entry.validate().is_ok());
        entry.players = 3;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn entry_file_must_stay_inside_folder() {
        assert!(validate_entry_file("index.html").is_ok());
        assert!(validate_entry_file("web/play.HTM").is_ok());
        assert!(validate_entry_file("../index.html").is_err());
        assert!(validate_entry_file("/etc/index.html").is_err());
        assert!(validate_entry_file("main.js").is_err());
        assert!(validate_entry_file("").is_err());
    }

    #[test]
    fn patch_merges_only_given_fields() {
        let mut entry = maze();
        entry.apply_patch(MetadataPatch {
            rating: Some(Some(4)),
            notes: Some("hard".to_string()),
            ..Default::default()
        });
        assert_eq!(entry.name, "Maze");
        assert_eq!(entry.rating, Some(4));
        assert_eq!(entry.notes, "hard");

        entry.apply_patch(MetadataPatch { rating: Some(None), ..Default::default() });
        assert_eq!(entry.rating, None);
    }

    #[test]
    fn game_type_parses_and_serializes() {
        assert_eq!("2d".parse::<GameType>().unwrap(), GameType::TwoD);
        assert_eq!("3D".parse::<GameType>().unwrap(), GameType::ThreeD);
        assert!("4d".parse::<GameType>().is_err());
        assert_eq!(serde_json::to_string(&GameType::ThreeD).unwrap(), "\"3D\"");
    }
}
