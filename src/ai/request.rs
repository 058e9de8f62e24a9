// src/ai/request.rs
use std::time::Duration;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    errors::{AiFailure, GameBoxError},
    game::{GameEntry, GameMetadata, GameType},
};

const SOURCE_MARKERS: [&str; 4] = ["<html", "<!doctype html", "<canvas", "<script"];
const MAX_TITLE_LEN: usize = 60;

/// Shape of the game to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConstraints {
    pub game_type: GameType,
    pub players: u8,
    pub categories: Vec<String>,
}

impl Default for GameConstraints {
    fn default() -> Self {
        Self {
            game_type: GameType::TwoD,
            players: 1,
            categories: Vec::new(),
        }
    }
}

impl GameConstraints {
    pub fn new(game_type: GameType, players: u8, categories: Vec<String>) -> Self {
        Self { game_type, players, categories }
    }

    /// Checks the constraints against the rules new entries must satisfy, so a
    /// generation is never started for a game that could not be saved.
    pub fn validate(&self) -> Result<(), GameBoxError> {
        let probe = GameEntry::from_metadata(Uuid::nil(), String::new(), self.metadata("probe"));
        probe.validate()
    }

    pub(crate) fn metadata(&self, name: &str) -> GameMetadata {
        let categories = if self.categories.is_empty() {
            vec!["AI Generated".to_string()]
        } else {
            self.categories.clone()
        };
        let mut metadata = GameMetadata::new(name, self.game_type, self.players, categories);
        metadata.tags = vec!["ai".to_string()];
        metadata
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationMode {
    /// A full game from the user's prompt.
    OneShot { prompt: String, constraints: GameConstraints },
    /// A full game from a randomly picked theme.
    Surprise,
    /// A full game shaped by what the library says the player likes.
    ForYou { prompt: Option<String>, constraints: GameConstraints },
    /// One conversational turn, never applied to files.
    Chat { message: String },
    /// Full replacement of an existing game's entry file.
    Edit { game_id: Uuid, instruction: String },
}

impl GenerationMode {
    pub fn label(&self) -> &'static str {
        match self {
            GenerationMode::OneShot { .. } => "one-shot",
            GenerationMode::Surprise => "surprise",
            GenerationMode::ForYou { .. } => "for-you",
            GenerationMode::Chat { .. } => "chat",
            GenerationMode::Edit { .. } => "edit",
        }
    }

    /// The game this request would write to, if any.
    pub fn target(&self) -> Option<Uuid> {
        match self {
            GenerationMode::Edit { game_id, .. } => Some(*game_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub mode: GenerationMode,
    pub created_at: DateTime<Utc>,
}

impl GenerationRequest {
    pub fn new(mode: GenerationMode) -> Self {
        Self { mode, created_at: Utc::now() }
    }

    pub fn one_shot(prompt: impl Into<String>, constraints: GameConstraints) -> Self {
        Self::new(GenerationMode::OneShot { prompt: prompt.into(), constraints })
    }

    pub fn surprise() -> Self {
        Self::new(GenerationMode::Surprise)
    }

    pub fn for_you(prompt: Option<String>, constraints: GameConstraints) -> Self {
        Self::new(GenerationMode::ForYou { prompt, constraints })
    }

    pub fn chat(message: impl Into<String>) -> Self {
        Self::new(GenerationMode::Chat { message: message.into() })
    }

    pub fn edit(game_id: Uuid, instruction: impl Into<String>) -> Self {
        Self::new(GenerationMode::Edit { game_id, instruction: instruction.into() })
    }
}

/// A validated response held in memory until it is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedContent {
    NewGame { metadata: GameMetadata, source: String },
    Edit { game_id: Uuid, entry_file: String, source: String },
    Reply { message: String, reply: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Ready(GeneratedContent),
    Failed(AiFailure),
    Cancelled,
}

/// What the completion callback is told.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationStatus {
    Succeeded,
    Failed(AiFailure),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub id: Uuid,
    /// Kept so a failed request can be submitted again as is.
    pub request: GenerationRequest,
    pub outcome: GenerationOutcome,
    pub elapsed: Duration,
}

impl GenerationResult {
    pub fn status(&self) -> GenerationStatus {
        match &self.outcome {
            GenerationOutcome::Ready(_) => GenerationStatus::Succeeded,
            GenerationOutcome::Failed(failure) => GenerationStatus::Failed(failure.clone()),
            GenerationOutcome::Cancelled => GenerationStatus::Cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, GenerationOutcome::Ready(_))
    }

    /// The request to resubmit after a failure.
    pub fn retry_request(&self) -> Option<GenerationRequest> {
        match self.outcome {
            GenerationOutcome::Failed(_) => Some(GenerationRequest::new(self.request.mode.clone())),
            _ => None,
        }
    }
}

/// Removes a surrounding markdown code fence, if the model added one.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[start + 3..];
    // skip the language tag line
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None => return trimmed,
    };
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Accepts a response only if it looks like a complete web game.
pub fn validate_game_source(text: &str) -> Result<String, AiFailure> {
    let source = strip_code_fences(text);
    if source.is_empty() {
        return Err(AiFailure::Malformed("the response was empty".to_string()));
    }
    let lower = source.to_lowercase();
    if !SOURCE_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return Err(AiFailure::Malformed("the response does not contain an HTML game".to_string()));
    }
    Ok(source.to_string())
}

pub fn validate_reply(text: &str) -> Result<String, AiFailure> {
    let reply = text.trim();
    if reply.is_empty() {
        return Err(AiFailure::Malformed("the reply was empty".to_string()));
    }
    Ok(reply.to_string())
}

/// Text of the first `<title>` element.
pub fn extract_title(source: &str) -> Option<String> {
    let lower = source.to_lowercase();
    let open = lower.find("<title")?;
    let content_start = open + lower[open..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find("</title")?;
    let title = source.get(content_start..content_end)?.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.chars().take(MAX_TITLE_LEN).collect())
    }
}

/// A readable fallback name from the start of a prompt.
pub fn name_from_prompt(prompt: &str) -> String {
    let words: Vec<&str> = prompt.split_whitespace().take(5).collect();
    if words.is_empty() {
        return "AI Game".to_string();
    }
    let mut name = words.join(" ");
    if let Some(first) = name.get(..1) {
        name = first.to_uppercase() + &name[1..];
    }
    name.chars().take(MAX_TITLE_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_removed() {
        let text = "Here you go:\n```html\n<!DOCTYPE html>\n<html></html>\n```\nEnjoy!";
        assert_eq!(strip_code_fences(text), "<!DOCTYPE html>\n<html></html>");
        assert_eq!(strip_code_fences("  <html></html> "), "<html></html>");
    }

    #[test]
    fn source_must_look_like_a_game() {
        assert!(validate_game_source("<canvas id=c></canvas>").is_ok());
        assert!(matches!(validate_game_source("   "), Err(AiFailure::Malformed(_))));
        assert!(matches!(validate_game_source("Sorry, I can't help."), Err(AiFailure::Malformed(_))));
        assert!(matches!(validate_game_source("```\n```"), Err(AiFailure::Malformed(_))));
    }

    #[test]
    fn title_is_read_from_markup() {
        let html = "<html><head><TITLE> Star Hopper </TITLE></head></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Star Hopper"));
        assert_eq!(extract_title("<html><title></title></html>"), None);
        assert_eq!(extract_title("<html></html>"), None);
    }

    #[test]
    fn prompt_names() {
        assert_eq!(name_from_prompt("a snake game with portals and lasers"), "A snake game with portals");
        assert_eq!(name_from_prompt("   "), "AI Game");
    }

    #[test]
    fn constraints_are_checked_like_entries() {
        assert!(GameConstraints::default().validate().is_ok());
        assert!(GameConstraints::new(GameType::TwoD, 3, vec![]).validate().unwrap_err().is_validation());
        let six = (0..6).map(|i| format!("Cat{}", i)).collect();
        assert!(GameConstraints::new(GameType::TwoD, 1, six).validate().is_err());
        let metadata = GameConstraints::default().metadata("Maze");
        assert_eq!(metadata.main_categories, vec!["AI Generated".to_string()]);
    }

    #[test]
    fn only_failures_offer_retry() {
        let request = GenerationRequest::chat("hi");
        let mut result = GenerationResult {
            id: Uuid::new_v4(),
            request: request.clone(),
            outcome: GenerationOutcome::Failed(AiFailure::RateLimited),
            elapsed: Duration::ZERO,
        };
        assert_eq!(result.retry_request().unwrap().mode, request.mode);
        result.outcome = GenerationOutcome::Cancelled;
        assert!(result.retry_request().is_none());
        assert_eq!(result.status(), GenerationStatus::Cancelled);
    }
}
