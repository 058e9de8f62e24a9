// ============================================================================
// FILE: src/lib.rs - Library Root
// ============================================================================
pub mod ai;
pub mod config;
pub mod crypto;
pub mod editor;
pub mod errors;
pub mod game;
pub mod library;
pub mod runtime;
pub mod store;

pub use ai::{Gamai, GenerationHandle, GenerationRequest, GenerationResult};
pub use config::AppPaths;
pub use editor::{CodeEditorBridge, FileChanged};
pub use errors::{AiFailure, GameBoxError};
pub use game::{GameEntry, GameMetadata, GameType, MetadataPatch};
pub use library::LibraryManager;
pub use runtime::{GameRuntime, Renderer, RendererEvent};
pub use store::MetadataStore;
