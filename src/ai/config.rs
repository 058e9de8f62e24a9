// src/ai/config.rs - Provider settings, API key encrypted at rest
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    config::AppPaths,
    crypto::{decrypt_data, encrypt_data, from_hex, load_or_create_key, replace_key, to_hex},
    errors::GameBoxError,
    store::write_atomic,
};

pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// The `ai_config.json` document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Hex of nonce + AES-256-GCM ciphertext.
    pub encrypted_api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            encrypted_api_key: None,
        }
    }
}

impl AiConfig {
    /// Reads the document, writing a default one on first run. A damaged
    /// document is reported and replaced by defaults in memory only.
    pub fn load_or_create(path: &Path) -> Result<Self, GameBoxError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            log::info!("Created default AI config at {}", path.display());
            return Ok(config);
        }

        let data = std::fs::read(path)?;
        match serde_json::from_slice(&data) {
            Ok(config) => Ok(config),
            Err(e) => {
                log::warn!("Ignoring unreadable AI config {}: {}", path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), GameBoxError> {
        let data = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &data)
            .map_err(|e| GameBoxError::StorageError(format!("Failed to save AI config: {}", e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn api_key(&self, secret: &[u8; 32]) -> Result<Option<String>, GameBoxError> {
        let Some(hex) = self.encrypted_api_key.as_deref() else {
            return Ok(None);
        };
        let plain = decrypt_data(&from_hex(hex)?, secret)?;
        let key = String::from_utf8(plain)
            .map_err(|_| GameBoxError::CryptoError("Stored API key is not valid UTF-8".to_string()))?;
        Ok(Some(key))
    }

    /// Stores `key` encrypted. A blank key removes it.
    pub fn set_api_key(&mut self, key: Option<&str>, secret: &[u8; 32]) -> Result<(), GameBoxError> {
        self.encrypted_api_key = match key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Some(to_hex(&encrypt_data(key.as_bytes(), secret)?)),
            None => None,
        };
        Ok(())
    }
}

/// Decrypted view handed to readers and to `save_user_changes`.
#[derive(Clone, PartialEq)]
pub struct AiSettings {
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub api_key: Option<String>,
}

impl AiSettings {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AiSettings")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

struct AiConfigState {
    path: PathBuf,
    key_path: PathBuf,
    /// `None` when the key file could not be read; a new one is written on
    /// the next user save.
    secret: Option<[u8; 32]>,
    config: AiConfig,
    api_key: Option<String>,
}

impl AiConfigState {
    fn load(paths: &AppPaths) -> Result<Self, GameBoxError> {
        let key_path = paths.secret_key_file();
        let secret = match load_or_create_key(&key_path) {
            Ok(secret) => Some(secret),
            Err(e) => {
                log::warn!("Ignoring unusable key file {}: {}", key_path.display(), e);
                None
            }
        };
        let path = paths.ai_config_file();
        let config = AiConfig::load_or_create(&path)?;
        let api_key = match (&secret, config.encrypted_api_key.is_some()) {
            (Some(secret), true) => config.api_key(secret).unwrap_or_else(|e| {
                log::warn!("Stored API key could not be decrypted, treating it as absent: {}", e);
                None
            }),
            (None, true) => {
                log::warn!("Stored API key cannot be read without the key file, treating it as absent");
                None
            }
            (_, false) => None,
        };
        Ok(Self { path, key_path, secret, config, api_key })
    }

    fn settings(&self) -> AiSettings {
        AiSettings {
            model: self.config.model.clone(),
            endpoint: self.config.endpoint.clone(),
            timeout_secs: self.config.timeout_secs,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            api_key: self.api_key.clone(),
        }
    }

    fn secret(&mut self) -> Result<[u8; 32], GameBoxError> {
        if let Some(secret) = self.secret {
            return Ok(secret);
        }
        let secret = replace_key(&self.key_path)?;
        self.secret = Some(secret);
        Ok(secret)
    }
}

static STATE: OnceLock<RwLock<Option<AiConfigState>>> = OnceLock::new();

fn state() -> &'static RwLock<Option<AiConfigState>> {
    STATE.get_or_init(|| RwLock::new(None))
}

/// Loads the AI config for this process. Called once at startup; calling it
/// again replaces the loaded state. A key that no longer decrypts is treated
/// as absent and the document is left alone until the next user save.
pub fn init(paths: &AppPaths) -> Result<AiSettings, GameBoxError> {
    std::fs::create_dir_all(paths.root())?;
    let loaded = AiConfigState::load(paths)?;
    let settings = loaded.settings();

    let mut guard = state().write().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(loaded);
    Ok(settings)
}

pub fn snapshot() -> Result<AiSettings, GameBoxError> {
    let guard = state().read().unwrap_or_else(|poisoned| poisoned.into_inner());
    match guard.as_ref() {
        Some(loaded) => Ok(loaded.settings()),
        None => Err(GameBoxError::StorageError("AI config has not been loaded".to_string())),
    }
}

/// The only way to change the AI config. The change is written to disk
/// before it becomes visible to readers.
pub fn save_user_changes<F>(change: F) -> Result<AiSettings, GameBoxError>
where
    F: FnOnce(&mut AiSettings),
{
    let mut guard = state().write().unwrap_or_else(|poisoned| poisoned.into_inner());
    let loaded = guard
        .as_mut()
        .ok_or_else(|| GameBoxError::StorageError("AI config has not been loaded".to_string()))?;

    let mut settings = loaded.settings();
    change(&mut settings);
    if settings.model.trim().is_empty() {
        return Err(GameBoxError::ValidationError("Model must not be empty".to_string()));
    }

    let mut next = AiConfig {
        model: settings.model.trim().to_string(),
        endpoint: settings.endpoint.trim().to_string(),
        timeout_secs: settings.timeout_secs,
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
        encrypted_api_key: None,
    };
    let api_key = settings.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty());
    if api_key.is_some() {
        let secret = loaded.secret()?;
        next.set_api_key(api_key, &secret)?;
    }
    next.save(&loaded.path)?;
    loaded.api_key = api_key.map(str::to_string);
    loaded.config = next;
    log::info!("AI settings saved (model {})", loaded.config.model);
    Ok(loaded.settings())
}
