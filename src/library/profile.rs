// src/library/profile.rs
use std::collections::HashMap;
use crate::game::{GameEntry, GameType};

/// Weight every owned game carries before playtime and rating are added.
const BASE_WEIGHT: u64 = 60;
const RATING_WEIGHT: u64 = 600;
const TOP_CATEGORIES: usize = 3;

/// What the library says about the player, used to personalise generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryProfile {
    pub total_games: usize,
    pub top_categories: Vec<String>,
    pub favourite_type: Option<GameType>,
    pub prefers_two_players: bool,
    pub average_rating: Option<f32>,
    pub total_playtime_secs: u64,
}

impl LibraryProfile {
    pub fn from_entries<'a>(entries: impl Iterator<Item = &'a GameEntry>) -> Self {
        let mut category_scores: HashMap<String, (String, u64)> = HashMap::new();
        let mut type_scores: HashMap<GameType, u64> = HashMap::new();
        let mut player_scores = [0u64; 2];
        let mut rating_sum = 0u32;
        let mut rated = 0u32;
        let mut total_games = 0;
        let mut total_playtime_secs = 0u64;

        for entry in entries {
            total_games += 1;
            total_playtime_secs = total_playtime_secs.saturating_add(entry.playtime_secs);

            let weight = BASE_WEIGHT
                + entry.playtime_secs
                + entry.rating.map_or(0, |r| r as u64 * RATING_WEIGHT);

            for category in &entry.main_categories {
                let slot = category_scores
                    .entry(category.trim().to_lowercase())
                    .or_insert_with(|| (category.trim().to_string(), 0));
                slot.1 += weight;
            }
            *type_scores.entry(entry.game_type).or_insert(0) += weight;
            if entry.players == 2 {
                player_scores[1] += weight;
            } else {
                player_scores[0] += weight;
            }
            if let Some(r) = entry.rating {
                rating_sum += r as u32;
                rated += 1;
            }
        }

        let mut ranked: Vec<(String, u64)> = category_scores.into_values().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let top_categories = ranked.into_iter().take(TOP_CATEGORIES).map(|(name, _)| name).collect();

        let favourite_type = type_scores
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.to_string().cmp(&a.0.to_string())))
            .map(|(game_type, _)| game_type);

        Self {
            total_games,
            top_categories,
            favourite_type,
            prefers_two_players: player_scores[1] > player_scores[0],
            average_rating: (rated > 0).then(|| rating_sum as f32 / rated as f32),
            total_playtime_secs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_games == 0
    }

    /// One paragraph suitable for dropping into a prompt.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "The player has no games yet.".to_string();
        }
        let mut parts = vec![format!("The player owns {} games", self.total_games)];
        if !self.top_categories.is_empty() {
            parts.push(format!("and spends most time on {}", self.top_categories.join(", ")));
        }
        let mut summary = parts.join(" ") + ".";
        if let Some(game_type) = self.favourite_type {
            summary.push_str(&format!(" They lean towards {} games.", game_type));
        }
        if self.prefers_two_players {
            summary.push_str(" They often play with a second player.");
        }
        if let Some(avg) = self.average_rating {
            summary.push_str(&format!(" Their average rating is {:.1}/5.", avg));
        }
        summary
    }
}
