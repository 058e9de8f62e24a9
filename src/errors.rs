// src/errors.rs
use std::fmt;
use uuid::Uuid;

/// Why a call to the AI provider did not produce usable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AiFailure {
    NotConfigured,
    Network(String),
    Auth(String),
    RateLimited,
    Timeout,
    Http { status: u16, body: String },
    Malformed(String),
}

impl fmt::Display for AiFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AiFailure::NotConfigured => write!(f, "no API key configured, add one in the AI settings"),
            AiFailure::Network(msg) => write!(f, "network error: {}", msg),
            AiFailure::Auth(msg) => write!(f, "the provider rejected the API key: {}", msg),
            AiFailure::RateLimited => write!(f, "rate limited by the provider, try again in a moment"),
            AiFailure::Timeout => write!(f, "the provider did not answer in time"),
            AiFailure::Http { status, body } => write!(f, "provider returned HTTP {}: {}", status, body),
            AiFailure::Malformed(msg) => write!(f, "unusable response: {}", msg),
        }
    }
}

#[derive(Debug)]
pub enum GameBoxError {
    IoError(std::io::Error),
    ValidationError(String),
    StorageError(String),
    ImportError(String),
    ExportError(String),
    AiProviderError(AiFailure),
    NotFound(Uuid),
    Busy,
    Cancelled,
    CryptoError(String),
    RuntimeError(String),
    EditorError(String),
}

impl fmt::Display for GameBoxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GameBoxError::IoError(err) => write!(f, "IO Error: {}", err),
            GameBoxError::ValidationError(msg) => write!(f, "Invalid input: {}", msg),
            GameBoxError::StorageError(msg) => write!(f, "Storage Error: {}", msg),
            GameBoxError::ImportError(msg) => write!(f, "Import failed: {}", msg),
            GameBoxError::ExportError(msg) => write!(f, "Export failed: {}", msg),
            GameBoxError::AiProviderError(failure) => write!(f, "AI request failed: {}", failure),
            GameBoxError::NotFound(id) => write!(f, "No game with id {} in the library", id),
            GameBoxError::Busy => write!(f, "A generation request is already running, wait for it or cancel it"),
            GameBoxError::Cancelled => write!(f, "The request was cancelled"),
            GameBoxError::CryptoError(msg) => write!(f, "Crypto Error: {}", msg),
            GameBoxError::RuntimeError(msg) => write!(f, "Runtime Error: {}", msg),
            GameBoxError::EditorError(msg) => write!(f, "Editor Error: {}", msg),
        }
    }
}

impl std::error::Error for GameBoxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GameBoxError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GameBoxError {
    fn from(err: std::io::Error) -> Self {
        GameBoxError::IoError(err)
    }
}

impl From<serde_json::Error> for GameBoxError {
    fn from(err: serde_json::Error) -> Self {
        GameBoxError::StorageError(format!("JSON: {}", err))
    }
}

impl From<AiFailure> for GameBoxError {
    fn from(failure: AiFailure) -> Self {
        GameBoxError::AiProviderError(failure)
    }
}

impl GameBoxError {
    /// Whether the user can fix this by changing what they typed.
    pub fn is_validation(&self) -> bool {
        matches!(self, GameBoxError::ValidationError(_))
    }
}

pub type Result<T> = std::result::Result<T, GameBoxError>;
