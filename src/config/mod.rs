// src/config/mod.rs
use std::path::{Path, PathBuf};
use crate::errors::GameBoxError;

/// Overrides the data root, mostly for tests and portable installs.
pub const HOME_ENV_VAR: &str = "GAMEBOX_HOME";

const LIBRARY_FILE: &str = "library.json";
const AI_CONFIG_FILE: &str = "ai_config.json";
const SECRET_KEY_FILE: &str = ".secret_key";

/// Where everything GameBox keeps on disk lives.
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$GAMEBOX_HOME`, else the platform data dir, else `./gamebox-data`.
    pub fn discover() -> Self {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR) {
            return Self::new(PathBuf::from(home));
        }
        match dirs::data_dir() {
            Some(dir) => Self::new(dir.join("gamebox")),
            None => Self::new(PathBuf::from("gamebox-data")),
        }
    }

    pub fn ensure_dirs(&self) -> Result<(), GameBoxError> {
        std::fs::create_dir_all(self.games_dir())?;
        std::fs::create_dir_all(self.exports_dir())?;
        log::info!("Games directory: {}", self.games_dir().display());
        log::info!("Exports directory: {}", self.exports_dir().display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn library_file(&self) -> PathBuf {
        self.root.join(LIBRARY_FILE)
    }

    pub fn games_dir(&self) -> PathBuf {
        self.root.join("games")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    pub fn ai_config_file(&self) -> PathBuf {
        self.root.join(AI_CONFIG_FILE)
    }

    pub fn secret_key_file(&self) -> PathBuf {
        self.root.join(SECRET_KEY_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted() {
        let paths = AppPaths::new("/tmp/gb");
        assert_eq!(paths.library_file(), PathBuf::from("/tmp/gb/library.json"));
        assert_eq!(paths.games_dir(), PathBuf::from("/tmp/gb/games"));
        assert_eq!(paths.exports_dir(), PathBuf::from("/tmp/gb/exports"));
        assert_eq!(paths.ai_config_file(), PathBuf::from("/tmp/gb/ai_config.json"));
    }

    #[test]
    fn ensure_dirs_creates_folders() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::new(dir.path().join("data"));
        paths.ensure_dirs().unwrap();
        assert!(paths.games_dir().is_dir());
        assert!(paths.exports_dir().is_dir());
    }
}
