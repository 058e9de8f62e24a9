// src/ai/mod.rs - GAMAI, turns prompts into games
//
// Generation runs on a tokio worker. The worker only produces a
// `GenerationResult`; files are written later by `Gamai::apply` on the
// caller's thread, through the library and the editor bridge.
pub mod config;
pub mod prompts;
pub mod provider;
pub mod request;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use config::{AiConfig, AiSettings};
pub use provider::{AiProvider, ChatMessage, OpenRouterProvider, ProviderRequest, Role};
pub use request::{
    GameConstraints, GeneratedContent, GenerationMode, GenerationOutcome, GenerationRequest,
    GenerationResult, GenerationStatus,
};

use crate::{
    editor::{CodeEditorBridge, EditOrigin},
    errors::{AiFailure, GameBoxError},
    game::{GameEntry, GameMetadata},
    library::LibraryManager,
};

pub const MAX_CONVERSATION_TURNS: usize = 40;
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(config::DEFAULT_TIMEOUT_SECS);

/// Called on the worker once a result is ready to be taken from the handle.
pub type CompletionCallback = Box<dyn FnOnce(GenerationStatus) + Send + 'static>;

/// What `apply` changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Created(GameEntry),
    Edited(GameEntry),
    Replied(String),
}

/// How a raw response becomes content.
enum Target {
    NewGame { metadata: GameMetadata },
    Edit { game_id: Uuid, entry_file: String },
    Reply { message: String },
}

impl Target {
    fn finish(self, text: String) -> Result<GeneratedContent, AiFailure> {
        match self {
            Target::NewGame { mut metadata } => {
                let source = request::validate_game_source(&text)?;
                if let Some(title) = request::extract_title(&source) {
                    metadata.name = title;
                }
                Ok(GeneratedContent::NewGame { metadata, source })
            }
            Target::Edit { game_id, entry_file } => {
                let source = request::validate_game_source(&text)?;
                Ok(GeneratedContent::Edit { game_id, entry_file, source })
            }
            Target::Reply { message } => {
                let reply = request::validate_reply(&text)?;
                Ok(GeneratedContent::Reply { message, reply })
            }
        }
    }
}

/// Frees the orchestrator's single slot when the worker ends, however it ends.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Gamai {
    provider: Arc<dyn AiProvider>,
    runtime: Handle,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
    busy: Arc<AtomicBool>,
    conversation: VecDeque<ChatMessage>,
}

impl Gamai {
    pub fn new(provider: Arc<dyn AiProvider>, runtime: Handle) -> Self {
        Self {
            provider,
            runtime,
            timeout: DEFAULT_GENERATION_TIMEOUT,
            max_tokens: config::DEFAULT_MAX_TOKENS,
            temperature: config::DEFAULT_TEMPERATURE,
            busy: Arc::new(AtomicBool::new(false)),
            conversation: VecDeque::new(),
        }
    }

    /// Uses the hosted provider described by `settings`.
    pub fn from_settings(settings: &AiSettings, runtime: Handle) -> Result<Self, GameBoxError> {
        let provider = OpenRouterProvider::from_settings(settings)?;
        Ok(Self::new(Arc::new(provider), runtime)
            .with_timeout(settings.timeout())
            .with_sampling(settings.max_tokens, settings.temperature))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> + '_ {
        self.conversation.iter()
    }

    pub fn clear_conversation(&mut self) {
        self.conversation.clear();
    }

    /// Starts a generation on the worker and returns at once. Only one
    /// request runs at a time; another submit meanwhile gets `Busy`.
    pub fn submit(
        &self,
        request: GenerationRequest,
        library: &LibraryManager,
        editor: &CodeEditorBridge,
        on_complete: Option<CompletionCallback>,
    ) -> Result<GenerationHandle, GameBoxError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GameBoxError::Busy);
        }
        let guard = InFlightGuard(self.busy.clone());
        let (provider_request, target) = self.prepare(&request, library, editor)?;

        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let (sender, receiver) = oneshot::channel();
        log::info!("Submitting {} generation {} to {}", request.mode.label(), id, self.provider.name());

        let provider = self.provider.clone();
        let timeout = self.timeout;
        let worker_token = token.clone();
        let worker_request = request.clone();
        self.runtime.spawn(async move {
            let started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = worker_token.cancelled() => GenerationOutcome::Cancelled,
                response = tokio::time::timeout(timeout, provider.generate(&provider_request)) => match response {
                    Err(_) => GenerationOutcome::Failed(AiFailure::Timeout),
                    Ok(Err(failure)) => GenerationOutcome::Failed(failure),
                    Ok(Ok(text)) => match target.finish(text) {
                        Ok(content) => GenerationOutcome::Ready(content),
                        Err(failure) => GenerationOutcome::Failed(failure),
                    },
                },
            };

            let result = GenerationResult {
                id,
                request: worker_request,
                outcome,
                elapsed: started.elapsed(),
            };
            match &result.outcome {
                GenerationOutcome::Ready(_) => log::info!("Generation {} finished in {:?}", id, result.elapsed),
                GenerationOutcome::Failed(failure) => log::warn!("Generation {} failed: {}", id, failure),
                GenerationOutcome::Cancelled => log::info!("Generation {} cancelled", id),
            }

            drop(guard);
            let status = result.status();
            // The handle may already be gone.
            let _ = sender.send(result);
            if let Some(callback) = on_complete {
                callback(status);
            }
        });

        Ok(GenerationHandle {
            id,
            request,
            token,
            receiver,
            finished: false,
        })
    }

    /// Materializes a successful result. Failed and cancelled results change
    /// nothing and come back as errors.
    pub fn apply(
        &mut self,
        result: GenerationResult,
        library: &mut LibraryManager,
        editor: &CodeEditorBridge,
    ) -> Result<Applied, GameBoxError> {
        let content = match result.outcome {
            GenerationOutcome::Ready(content) => content,
            GenerationOutcome::Failed(failure) => return Err(GameBoxError::AiProviderError(failure)),
            GenerationOutcome::Cancelled => return Err(GameBoxError::Cancelled),
        };

        match content {
            GeneratedContent::NewGame { metadata, source } => {
                let entry = library.create_game_with_source(metadata, &source)?;
                log::info!("Generated game '{}' ({}) added to the library", entry.name, entry.id);
                Ok(Applied::Created(entry))
            }
            GeneratedContent::Edit { game_id, entry_file, source } => {
                editor.save_edit(library, &game_id, &entry_file, &source, EditOrigin::Assistant)?;
                let entry = library.get(&game_id).cloned().ok_or(GameBoxError::NotFound(game_id))?;
                log::info!("Applied generated edit to '{}' ({})", entry.name, entry.id);
                Ok(Applied::Edited(entry))
            }
            GeneratedContent::Reply { message, reply } => {
                self.push_turn(ChatMessage::user(message));
                self.push_turn(ChatMessage::assistant(reply.clone()));
                Ok(Applied::Replied(reply))
            }
        }
    }

    fn push_turn(&mut self, message: ChatMessage) {
        self.conversation.push_back(message);
        while self.conversation.len() > MAX_CONVERSATION_TURNS {
            self.conversation.pop_front();
        }
    }

    fn prepare(
        &self,
        request: &GenerationRequest,
        library: &LibraryManager,
        editor: &CodeEditorBridge,
    ) -> Result<(ProviderRequest, Target), GameBoxError> {
        let (messages, target) = match &request.mode {
            GenerationMode::OneShot { prompt, constraints } => {
                let prompt = non_empty(prompt, "Describe the game you want")?;
                constraints.validate()?;
                let metadata = constraints
                    .metadata(&request::name_from_prompt(prompt))
                    .with_description(prompt);
                (
                    vec![
                        ChatMessage::system(prompts::GAME_SYSTEM_PROMPT),
                        ChatMessage::user(prompts::one_shot_prompt(prompt, constraints)),
                    ],
                    Target::NewGame { metadata },
                )
            }
            GenerationMode::Surprise => {
                let theme = prompts::pick_surprise(&mut rand::thread_rng());
                let metadata = theme.constraints.metadata(theme.title).with_description(theme.pitch);
                (
                    vec![
                        ChatMessage::system(prompts::GAME_SYSTEM_PROMPT),
                        ChatMessage::user(prompts::surprise_prompt(&theme)),
                    ],
                    Target::NewGame { metadata },
                )
            }
            GenerationMode::ForYou { prompt, constraints } => {
                constraints.validate()?;
                let profile = library.library_profile();
                let name = prompt
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .map(request::name_from_prompt)
                    .unwrap_or_else(|| "For You".to_string());
                let metadata = constraints
                    .metadata(&name)
                    .with_description(prompt.clone().unwrap_or_default());
                (
                    vec![
                        ChatMessage::system(prompts::GAME_SYSTEM_PROMPT),
                        ChatMessage::user(prompts::for_you_prompt(prompt.as_deref(), &profile, constraints)),
                    ],
                    Target::NewGame { metadata },
                )
            }
            GenerationMode::Chat { message } => {
                let message = non_empty(message, "Type a message first")?;
                let mut messages = Vec::with_capacity(self.conversation.len() + 2);
                messages.push(ChatMessage::system(prompts::CHAT_SYSTEM_PROMPT));
                messages.extend(self.conversation.iter().cloned());
                messages.push(ChatMessage::user(message));
                (messages, Target::Reply { message: message.to_string() })
            }
            GenerationMode::Edit { game_id, instruction } => {
                let instruction = non_empty(instruction, "Describe the change you want")?;
                let entry = library.get(game_id).ok_or(GameBoxError::NotFound(*game_id))?;
                let source = editor.read_source(entry, &entry.entry_file)?;
                (
                    vec![
                        ChatMessage::system(prompts::EDIT_SYSTEM_PROMPT),
                        ChatMessage::user(prompts::edit_prompt(instruction, &entry.entry_file, &source)),
                    ],
                    Target::Edit { game_id: *game_id, entry_file: entry.entry_file.clone() },
                )
            }
        };

        Ok((
            ProviderRequest {
                messages,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            },
            target,
        ))
    }
}

fn non_empty<'a>(text: &'a str, hint: &str) -> Result<&'a str, GameBoxError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GameBoxError::ValidationError(hint.to_string()));
    }
    Ok(text)
}

/// The caller's side of a running generation.
pub struct GenerationHandle {
    id: Uuid,
    request: GenerationRequest,
    token: CancellationToken,
    receiver: oneshot::Receiver<GenerationResult>,
    finished: bool,
}

impl GenerationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Stops the worker and discards whatever it produces. A result already
    /// taken from this handle is not affected.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            log::info!("Cancelling generation {}", self.id);
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Non-blocking poll. Yields the result once, then `None`.
    pub fn try_result(&mut self) -> Option<GenerationResult> {
        if self.finished {
            return None;
        }
        let result = match self.receiver.try_recv() {
            Ok(result) => self.seal(result),
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => self.lost(),
        };
        self.finished = true;
        Some(result)
    }

    pub async fn wait(mut self) -> GenerationResult {
        match (&mut self.receiver).await {
            Ok(result) => self.seal(result),
            Err(_) => self.lost(),
        }
    }

    /// A result that arrives after cancellation is dropped.
    fn seal(&self, mut result: GenerationResult) -> GenerationResult {
        if self.token.is_cancelled() && !matches!(result.outcome, GenerationOutcome::Cancelled) {
            log::info!("Discarding result of cancelled generation {}", self.id);
            result.outcome = GenerationOutcome::Cancelled;
        }
        result
    }

    fn lost(&self) -> GenerationResult {
        let outcome = if self.token.is_cancelled() {
            GenerationOutcome::Cancelled
        } else {
            GenerationOutcome::Failed(AiFailure::Network("the generation worker stopped unexpectedly".to_string()))
        };
        GenerationResult {
            id: self.id,
            request: self.request.clone(),
            outcome,
            elapsed: Duration::ZERO,
        }
    }
}
