// src/game/mod.rs
pub mod assets;
pub mod index;
pub mod info;
pub mod template;

pub use assets::{determine_asset_type, AssetInfo, AssetType};
pub use index::LibraryIndex;
pub use info::{
    is_html_file, validate_entry_file, GameEntry, GameMetadata, GameType, MetadataPatch,
    DEFAULT_ENTRY_FILE, MAX_MAIN_CATEGORIES,
};

/// Folder-safe version of a game name.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    if cleaned.is_empty() {
        "game".to_string()
    } else {
        cleaned
    }
}
