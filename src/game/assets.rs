// src/game/assets.rs
use std::path::Path;
use serde::{Deserialize, Serialize};

/// A file shipped with a game, as recorded in an export manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub path: String,
    pub checksum: String,
    pub size: u64,
    pub asset_type: AssetType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Page,
    Script,
    Style,
    Image,
    Audio,
    Font,
    Data,
    Binary,
}

impl AssetType {
    /// Text files the code editor may open.
    pub fn is_editable(self) -> bool {
        matches!(self, AssetType::Page | AssetType::Script | AssetType::Style | AssetType::Data)
    }
}

pub fn determine_asset_type(path: &Path) -> Option<AssetType> {
    let extension = path.extension()?.to_str()?.to_lowercase();

    match extension.as_str() {
        "html" | "htm" => Some(AssetType::Page),
        "js" | "mjs" => Some(AssetType::Script),
        "css" => Some(AssetType::Style),
        "png" | "jpg" | "jpeg" | "bmp" | "gif" | "svg" | "webp" | "ico" => Some(AssetType::Image),
        "wav" | "ogg" | "mp3" | "flac" | "m4a" => Some(AssetType::Audio),
        "ttf" | "otf" | "woff" | "woff2" => Some(AssetType::Font),
        "json" | "xml" | "txt" | "csv" | "glsl" | "frag" | "vert" => Some(AssetType::Data),
        "wasm" | "bin" => Some(AssetType::Binary),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_web_assets() {
        assert_eq!(determine_asset_type(Path::new("index.HTML")), Some(AssetType::Page));
        assert_eq!(determine_asset_type(Path::new("js/game.js")), Some(AssetType::Script));
        assert_eq!(determine_asset_type(Path::new("sfx/jump.ogg")), Some(AssetType::Audio));
        assert_eq!(determine_asset_type(Path::new("README")), None);
        assert_eq!(determine_asset_type(Path::new("setup.exe")), None);
    }

    #[test]
    fn only_text_assets_are_editable() {
        assert!(AssetType::Script.is_editable());
        assert!(AssetType::Page.is_editable());
        assert!(!AssetType::Image.is_editable());
        assert_eq!(determine_asset_type(Path::new("engine.wasm")), Some(AssetType::Binary));
        assert!(!AssetType::Binary.is_editable());
    }
}
