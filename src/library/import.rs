// src/library/import.rs
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};
use uuid::Uuid;

use super::LibraryManager;
use crate::{
    errors::GameBoxError,
    game::{determine_asset_type, is_html_file, GameEntry, GameMetadata, GameType},
};

pub const MAX_IMPORT_FILES: usize = 512;
const MAX_SCAN_DEPTH: usize = 3;
const IMPORTED_CATEGORY: &str = "Imported";

impl LibraryManager {
    /// Imports a game from an `.html` entry file (plus the web assets found
    /// next to it) or from a `.zip` written by `export_game`. Without
    /// `metadata`, names and categories come from the archive manifest or the
    /// file name.
    pub fn import_game(&mut self, source: &Path, metadata: Option<GameMetadata>) -> Result<GameEntry, GameBoxError> {
        if !source.exists() {
            return Err(GameBoxError::ImportError(format!("{} does not exist", source.display())));
        }
        // a bare "pong.html" has an empty parent folder
        let resolved = source
            .canonicalize()
            .map_err(|e| GameBoxError::ImportError(format!("Failed to resolve {}: {}", source.display(), e)))?;
        let source = resolved.as_path();
        if is_archive(source) {
            return self.import_archive(source, metadata);
        }
        if !source.is_file() || !is_html_file(source) {
            return Err(GameBoxError::ImportError(format!(
                "{} is not an .html entry file or a GameBox archive",
                source.display()
            )));
        }

        let entry_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| GameBoxError::ImportError(format!("{} has no file name", source.display())))?;
        let mut metadata = metadata.unwrap_or_else(|| default_metadata(source));
        metadata.entry_file = Some(entry_name.clone());
        GameEntry::from_metadata(Uuid::nil(), String::new(), metadata.clone()).validate()?;

        let root = source
            .parent()
            .ok_or_else(|| GameBoxError::ImportError(format!("{} has no parent folder", source.display())))?;
        let games_dir = self.games_dir();
        let games_dir = games_dir.canonicalize().unwrap_or(games_dir);
        let assets = discover_assets(root, Path::new(&entry_name), &games_dir);
        log::info!("Importing {} with {} files from {}", source.display(), assets.len(), root.display());

        let staging = self.create_staging()?;
        let copied = (|| -> std::io::Result<()> {
            for relative in &assets {
                let target = staging.join(relative);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(root.join(relative), &target)?;
            }
            Ok(())
        })();
        if let Err(e) = copied {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(GameBoxError::ImportError(format!("Failed to copy game files: {}", e)));
        }

        self.commit_staged(staging, metadata)
    }

    pub(crate) fn create_staging(&self) -> Result<PathBuf, GameBoxError> {
        let staging = self.games_dir().join(format!(".staging-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&staging)
            .map_err(|e| GameBoxError::ImportError(format!("Failed to create staging folder: {}", e)))?;
        Ok(staging)
    }

    /// Moves a fully populated staging folder into place and records the entry.
    /// The staging folder is removed on every failure path.
    pub(crate) fn commit_staged(&mut self, staging: PathBuf, metadata: GameMetadata) -> Result<GameEntry, GameBoxError> {
        let id = self.allocate_id();
        let folder = self.allocate_folder(&metadata.name, &id);
        let entry = GameEntry::from_metadata(id, folder, metadata);

        let checked = entry.validate().and_then(|_| {
            if staging.join(&entry.entry_file).is_file() {
                Ok(())
            } else {
                Err(GameBoxError::ImportError(format!("entry file '{}' was not imported", entry.entry_file)))
            }
        });
        if let Err(e) = checked {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }

        let target = self.folder_of(&entry);
        if let Err(e) = std::fs::rename(&staging, &target) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(GameBoxError::ImportError(format!("Failed to move imported files into place: {}", e)));
        }

        self.insert_and_persist(entry.clone(), &target)?;
        log::info!("Imported game '{}' ({}) into {}", entry.name, entry.id, target.display());
        Ok(entry)
    }
}

pub fn is_archive(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("zip"))
}

fn default_metadata(source: &Path) -> GameMetadata {
    let stem = source.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    // "index.html" says nothing, the folder name usually does
    let name = if stem.eq_ignore_ascii_case("index") {
        source
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or(stem)
    } else {
        stem
    };
    GameMetadata::new(name, GameType::TwoD, 1, vec![IMPORTED_CATEGORY.to_string()])
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().map_or(false, |s| s.starts_with('.'))
}

/// Web assets under `root`, relative to it, always starting with `entry`.
/// Hidden files and the library's own games folder are skipped.
fn discover_assets(root: &Path, entry: &Path, games_dir: &Path) -> Vec<PathBuf> {
    let mut found = vec![entry.to_path_buf()];
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(MAX_SCAN_DEPTH)
        .follow_links(false)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
        .into_iter()
        .filter_entry(|e| !is_hidden(e) && e.path() != games_dir);

    for item in walker {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                log::warn!("Skipping unreadable path while importing from {}: {}", root.display(), e);
                continue;
            }
        };
        if !item.file_type().is_file() || determine_asset_type(item.path()).is_none() {
            continue;
        }
        let Ok(relative) = item.path().strip_prefix(root) else {
            continue;
        };
        if relative == entry {
            continue;
        }
        if found.len() == MAX_IMPORT_FILES {
            log::warn!("Stopped collecting assets after {} files in {}", MAX_IMPORT_FILES, root.display());
            break;
        }
        found.push(relative.to_path_buf());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppPaths;

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn imports_html_with_sibling_assets() {
        let data = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        let src = source.path().join("breakout");
        write(&src.join("index.html"), "<html><script src=\"js/game.js\"></script></html>");
        write(&src.join("js/game.js"), "let x = 1;");
        write(&src.join("img/ball.png"), "png");
        write(&src.join("notes.docx"), "ignored");
        write(&src.join(".git/config"), "ignored");

        let mut library = LibraryManager::open(AppPaths::new(data.path())).unwrap();
        let entry = library.import_game(&src.join("index.html"), None).unwrap();

        assert_eq!(entry.name, "breakout");
        assert_eq!(entry.entry_file, "index.html");
        let folder = library.game_folder(&entry.id).unwrap();
        assert!(folder.join("js/game.js").is_file());
        assert!(folder.join("img/ball.png").is_file());
        assert!(!folder.join("notes.docx").exists());
        assert!(!folder.join(".git").exists());
    }

    #[test]
    fn relative_entry_path_imports_from_working_dir() {
        let data = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        write(&source.path().join("pong.html"), "<html><canvas></canvas></html>");
        write(&source.path().join("pong.js"), "let paddle = 0;");

        let mut library = LibraryManager::open(AppPaths::new(data.path())).unwrap();
        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(source.path()).unwrap();
        let imported = library.import_game(Path::new("pong.html"), None);
        std::env::set_current_dir(previous).unwrap();

        let entry = imported.unwrap();
        assert_eq!(entry.name, "pong");
        let folder = library.game_folder(&entry.id).unwrap();
        assert!(folder.join("pong.html").is_file());
        assert!(folder.join("pong.js").is_file());
    }

    #[test]
    fn entry_file_survives_a_crowded_folder() {
        let data = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        for i in 0..MAX_IMPORT_FILES + 88 {
            write(&source.path().join(format!("a{:04}.js", i)), "");
        }
        write(&source.path().join("zgame.html"), "<html><canvas></canvas></html>");

        let mut library = LibraryManager::open(AppPaths::new(data.path())).unwrap();
        let entry = library.import_game(&source.path().join("zgame.html"), None).unwrap();

        let folder = library.game_folder(&entry.id).unwrap();
        assert!(folder.join("zgame.html").is_file());
        assert_eq!(std::fs::read_dir(&folder).unwrap().count(), MAX_IMPORT_FILES);
    }

    #[test]
    fn missing_source_is_import_error() {
        let data = tempfile::tempdir().unwrap();
        let mut library = LibraryManager::open(AppPaths::new(data.path())).unwrap();
        let err = library.import_game(Path::new("/definitely/not/here.html"), None).unwrap_err();
        assert!(matches!(err, GameBoxError::ImportError(_)));
    }

    #[test]
    fn non_html_source_is_import_error_and_leaves_nothing() {
        let data = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        let script = source.path().join("game.js");
        write(&script, "alert(1)");

        let mut library = LibraryManager::open(AppPaths::new(data.path())).unwrap();
        let err = library.import_game(&script, None).unwrap_err();
        assert!(matches!(err, GameBoxError::ImportError(_)));
        assert!(library.is_empty());
        assert_eq!(std::fs::read_dir(library.games_dir()).unwrap().count(), 0);
    }

    #[test]
    fn invalid_metadata_leaves_nothing() {
        let data = tempfile::tempdir().unwrap();
        let source = tempfile::tempdir().unwrap();
        let page = source.path().join("pong.html");
        write(&page, "<html></html>");

        let mut library = LibraryManager::open(AppPaths::new(data.path())).unwrap();
        let metadata = GameMetadata::new("Pong", GameType::TwoD, 7, vec!["Arcade".to_string()]);
        assert!(library.import_game(&page, Some(metadata)).unwrap_err().is_validation());
        assert_eq!(std::fs::read_dir(library.games_dir()).unwrap().count(), 0);
    }
}
