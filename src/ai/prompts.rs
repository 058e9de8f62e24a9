// src/ai/prompts.rs
use rand::seq::SliceRandom;
use rand::Rng;

use super::request::GameConstraints;
use crate::game::GameType;
use crate::library::LibraryProfile;

pub const GAME_SYSTEM_PROMPT: &str = "You are GAMAI, a game developer who writes complete, \
self-contained HTML5 games. Answer with a single HTML document only: inline all CSS and \
JavaScript, use no external files or network requests, and include a <title>. The game must \
start on load, explain its controls on screen and run at a steady frame rate with \
requestAnimationFrame.";

pub const EDIT_SYSTEM_PROMPT: &str = "You are GAMAI, maintaining an existing HTML5 game. You \
receive the current source of its entry file and a change request. Answer with the complete \
updated HTML document only, never a diff or a partial file. Keep everything the request does \
not mention working exactly as before.";

pub const CHAT_SYSTEM_PROMPT: &str = "You are GAMAI, a friendly assistant inside GameBox, a \
library of small web games. Help the player with game ideas, design questions and \
JavaScript. Keep answers short unless asked for detail.";

/// Surprise Me picks one of these.
pub const SURPRISE_THEMES: &[(&str, &str)] = &[
    ("Neon Drift", "a top-down racer on a glowing grid where drifting charges a boost"),
    ("Lantern Keeper", "guide moths to lanterns before the night swallows the village"),
    ("Orbit Gardener", "plant seeds on tiny planets and keep them in stable orbits"),
    ("Pixel Heist", "sneak through a museum avoiding guard sight cones"),
    ("Tide Tower", "stack floating crates before the tide comes in"),
    ("Comet Courier", "deliver parcels between moons while dodging comets"),
    ("Mole Mayhem", "a whack-a-mole with power-ups and sneaky decoys"),
    ("Bubble Forge", "merge bubbles of the same colour to craft rarer ones"),
    ("Echo Maze", "navigate a dark maze using sound pulses that briefly reveal walls"),
    ("Snowball Summit", "roll a snowball uphill, growing it while avoiding rocks"),
    ("Robo Rally", "program a short move queue to guide a robot across a factory floor"),
    ("Sky Fisher", "cast a line from a cloud to catch birds for points"),
];

pub const SURPRISE_CATEGORIES: &[&str] = &["Arcade", "Puzzle", "Action", "Strategy", "Casual", "Platformer"];

#[derive(Debug, Clone, PartialEq)]
pub struct SurpriseTheme {
    pub title: &'static str,
    pub pitch: &'static str,
    pub constraints: GameConstraints,
}

pub fn pick_surprise<R: Rng + ?Sized>(rng: &mut R) -> SurpriseTheme {
    let (title, pitch) = SURPRISE_THEMES.choose(rng).copied().unwrap_or(SURPRISE_THEMES[0]);
    let category = SURPRISE_CATEGORIES.choose(rng).copied().unwrap_or("Arcade");
    let game_type = if rng.gen_bool(0.25) { GameType::ThreeD } else { GameType::TwoD };
    let players = if rng.gen_bool(0.2) { 2 } else { 1 };
    SurpriseTheme {
        title,
        pitch,
        constraints: GameConstraints::new(game_type, players, vec![category.to_string()]),
    }
}

pub fn constraints_block(constraints: &GameConstraints) -> String {
    let mut block = String::from("Constraints:\n");
    match constraints.game_type {
        GameType::TwoD => block.push_str("- 2D game drawn on a <canvas> with the 2D context.\n"),
        GameType::ThreeD => block.push_str("- 3D game rendered with WebGL on a <canvas>, no external libraries.\n"),
    }
    if constraints.players == 2 {
        block.push_str("- Two players on one keyboard: WASD for player one, arrow keys for player two.\n");
    } else {
        block.push_str("- Single player.\n");
    }
    if !constraints.categories.is_empty() {
        block.push_str(&format!("- Genre: {}.\n", constraints.categories.join(", ")));
    }
    block
}

pub fn one_shot_prompt(prompt: &str, constraints: &GameConstraints) -> String {
    format!("Make this game: {}\n\n{}", prompt.trim(), constraints_block(constraints))
}

pub fn surprise_prompt(theme: &SurpriseTheme) -> String {
    format!(
        "Surprise the player with an original game called \"{}\": {}.\n\n{}",
        theme.title,
        theme.pitch,
        constraints_block(&theme.constraints)
    )
}

pub fn for_you_prompt(prompt: Option<&str>, profile: &LibraryProfile, constraints: &GameConstraints) -> String {
    let wish = match prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => format!("The player asks for: {}", p),
        None => "Invent a new game this player will enjoy.".to_string(),
    };
    format!(
        "{}\n\nWhat their library says about them: {}\nBuild on what they like without copying an existing game.\n\n{}",
        wish,
        profile.summary(),
        constraints_block(constraints)
    )
}

pub fn edit_prompt(instruction: &str, entry_file: &str, source: &str) -> String {
    format!(
        "Change request: {}\n\nCurrent contents of {}:\n```html\n{}\n```",
        instruction.trim(),
        entry_file,
        source
    )
}
