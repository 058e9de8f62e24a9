// src/runtime/mod.rs
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

use crate::{
    editor::FileChanged,
    errors::GameBoxError,
    library::LibraryManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenTarget {
    /// Only the game view.
    Viewport,
    /// The whole application window.
    Window,
}

/// The embedded web view that actually runs a game.
pub trait Renderer {
    fn load(&mut self, path: &Path) -> Result<(), GameBoxError>;
    fn reload(&mut self) -> Result<(), GameBoxError>;
    fn set_fullscreen(&mut self, target: FullscreenTarget, fullscreen: bool);
}

/// What the renderer reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEvent {
    LoadFinished,
    LoadFailed(String),
    Navigated(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Idle,
    Loading,
    Playing,
    PausedForEdit,
    Stopped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub viewport_fullscreen: bool,
    pub window_fullscreen: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub game_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Play time of one session. Time spent loading or in the editor is not
/// counted.
#[derive(Debug)]
struct PlaySession {
    started_at: DateTime<Utc>,
    accrued: Duration,
    running_since: Option<Instant>,
}

impl PlaySession {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            accrued: Duration::ZERO,
            running_since: Some(Instant::now()),
        }
    }

    fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accrued += since.elapsed();
        }
    }

    fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    fn elapsed(&self) -> Duration {
        self.accrued + self.running_since.map_or(Duration::ZERO, |since| since.elapsed())
    }
}

pub struct GameRuntime<R: Renderer> {
    renderer: R,
    state: RuntimeState,
    game_id: Option<Uuid>,
    entry_path: Option<PathBuf>,
    session: Option<PlaySession>,
    display: DisplayState,
    pending_reload: bool,
    last_error: Option<String>,
}

impl<R: Renderer> GameRuntime<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            state: RuntimeState::Idle,
            game_id: None,
            entry_path: None,
            session: None,
            display: DisplayState::default(),
            pending_reload: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn current_game(&self) -> Option<Uuid> {
        self.game_id
    }

    /// Entry file handed to the renderer by the last launch.
    pub fn entry_path(&self) -> Option<&Path> {
        self.entry_path.as_deref()
    }

    pub fn display(&self) -> DisplayState {
        self.display
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Play time accrued in the current session.
    pub fn elapsed(&self) -> Duration {
        self.session.as_ref().map_or(Duration::ZERO, |s| s.elapsed())
    }

    /// Hands the game's entry file to the renderer.
    pub fn launch(&mut self, library: &LibraryManager, id: &Uuid) -> Result<(), GameBoxError> {
        match self.state {
            RuntimeState::Idle | RuntimeState::Stopped => {}
            other => {
                return Err(GameBoxError::RuntimeError(format!(
                    "cannot launch while {:?}, stop the current game first",
                    other
                )));
            }
        }

        let path = library.entry_path(id)?;
        self.renderer.load(&path)?;

        log::info!("Launching {}", path.display());
        self.game_id = Some(*id);
        self.entry_path = Some(path);
        self.session = None;
        self.pending_reload = false;
        self.last_error = None;
        self.transition(RuntimeState::Loading);
        Ok(())
    }

    pub fn handle_event(&mut self, event: RendererEvent) {
        match event {
            RendererEvent::LoadFinished => {
                if self.state != RuntimeState::Loading {
                    return;
                }
                match self.session.as_mut() {
                    Some(session) => session.resume(),
                    None => self.session = Some(PlaySession::start()),
                }
                self.transition(RuntimeState::Playing);
            }
            RendererEvent::LoadFailed(reason) => {
                log::warn!("Game failed to load: {}", reason);
                if let Some(session) = self.session.as_mut() {
                    session.pause();
                }
                self.last_error = Some(reason);
                if matches!(self.state, RuntimeState::Loading | RuntimeState::Playing) {
                    self.transition(RuntimeState::Stopped);
                }
            }
            RendererEvent::Navigated(url) => {
                log::debug!("Renderer navigated to {}", url);
            }
        }
    }

    /// Pauses the game and its timer while the instant editor is open.
    pub fn open_editor(&mut self) -> Result<(), GameBoxError> {
        if self.state != RuntimeState::Playing {
            return Err(GameBoxError::RuntimeError(format!(
                "the editor can only be opened while playing, not while {:?}",
                self.state
            )));
        }
        if let Some(session) = self.session.as_mut() {
            session.pause();
        }
        self.transition(RuntimeState::PausedForEdit);
        Ok(())
    }

    /// Leaves the editor and reloads the entry file. The session timer picks
    /// up where it stopped once the reload finishes.
    pub fn close_editor(&mut self) -> Result<(), GameBoxError> {
        if self.state != RuntimeState::PausedForEdit {
            return Err(GameBoxError::RuntimeError(format!(
                "the editor is not open (state {:?})",
                self.state
            )));
        }
        self.pending_reload = false;
        self.renderer.reload()?;
        self.transition(RuntimeState::Loading);
        Ok(())
    }

    /// Reacts to an edit of the running game. Returns whether a reload was
    /// started.
    pub fn on_file_changed(&mut self, change: &FileChanged) -> Result<bool, GameBoxError> {
        if self.game_id != Some(change.game_id) {
            return Ok(false);
        }
        match self.state {
            RuntimeState::Playing => {
                if let Some(session) = self.session.as_mut() {
                    session.pause();
                }
                self.renderer.reload()?;
                self.transition(RuntimeState::Loading);
                Ok(true)
            }
            RuntimeState::PausedForEdit => {
                self.pending_reload = true;
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Drains queued change notifications. A lagged receiver reloads once.
    pub fn poll_changes(&mut self, changes: &mut broadcast::Receiver<FileChanged>) -> Result<usize, GameBoxError> {
        let mut reloads = 0;
        loop {
            match changes.try_recv() {
                Ok(change) => {
                    if self.on_file_changed(&change)? {
                        reloads += 1;
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    log::warn!("Missed {} file change notifications", skipped);
                    if let Some(game_id) = self.game_id {
                        let change = FileChanged {
                            game_id,
                            path: PathBuf::new(),
                            origin: crate::editor::EditOrigin::Manual,
                        };
                        if self.on_file_changed(&change)? {
                            reloads += 1;
                        }
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        Ok(reloads)
    }

    /// Whether an edit arrived while the editor was open.
    pub fn has_pending_reload(&self) -> bool {
        self.pending_reload
    }

    /// Ends the session and returns how long it ran.
    pub fn stop(&mut self) -> Option<SessionSummary> {
        if self.state == RuntimeState::Idle {
            return None;
        }
        self.transition(RuntimeState::Stopped);
        let game_id = self.game_id?;
        let mut session = self.session.take()?;
        session.pause();
        Some(SessionSummary {
            game_id,
            started_at: session.started_at,
            elapsed: session.accrued,
        })
    }

    /// Stops and adds the session to the game's play time.
    pub fn stop_and_record(&mut self, library: &mut LibraryManager) -> Result<Option<SessionSummary>, GameBoxError> {
        let summary = self.stop();
        if let Some(summary) = &summary {
            library.record_play_session(&summary.game_id, summary.elapsed)?;
        }
        Ok(summary)
    }

    pub fn toggle_viewport_fullscreen(&mut self) -> bool {
        self.display.viewport_fullscreen = !self.display.viewport_fullscreen;
        self.renderer.set_fullscreen(FullscreenTarget::Viewport, self.display.viewport_fullscreen);
        self.display.viewport_fullscreen
    }

    pub fn toggle_window_fullscreen(&mut self) -> bool {
        self.display.window_fullscreen = !self.display.window_fullscreen;
        self.renderer.set_fullscreen(FullscreenTarget::Window, self.display.window_fullscreen);
        self.display.window_fullscreen
    }

    fn transition(&mut self, next: RuntimeState) {
        log::debug!("Runtime {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppPaths;
    use crate::editor::EditOrigin;
    use crate::game::{GameMetadata, GameType};

    #[derive(Default)]
    struct RecordingRenderer {
        calls: Vec<String>,
        fail_load: bool,
    }

    impl Renderer for RecordingRenderer {
        fn load(&mut self, path: &Path) -> Result<(), GameBoxError> {
            if self.fail_load {
                return Err(GameBoxError::RuntimeError("no web view".to_string()));
            }
            self.calls.push(format!("load {}", path.file_name().unwrap().to_string_lossy()));
            Ok(())
        }

        fn reload(&mut self) -> Result<(), GameBoxError> {
            self.calls.push("reload".to_string());
            Ok(())
        }

        fn set_fullscreen(&mut self, target: FullscreenTarget, fullscreen: bool) {
            self.calls.push(format!("fullscreen {:?} {}", target, fullscreen));
        }
    }

    fn setup() -> (tempfile::TempDir, LibraryManager, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let mut library = LibraryManager::open(AppPaths::new(dir.path())).unwrap();
        let entry = library
            .create_game(GameMetadata::new("Maze", GameType::TwoD, 1, vec!["Puzzle".to_string()]))
            .unwrap();
        (dir, library, entry.id)
    }

    fn change(game_id: Uuid) -> FileChanged {
        FileChanged { game_id, path: PathBuf::from("index.html"), origin: EditOrigin::Assistant }
    }

    #[test]
    fn launch_load_play_stop() {
        let (_dir, mut library, id) = setup();
        let mut runtime = GameRuntime::new(RecordingRenderer::default());
        assert_eq!(runtime.state(), RuntimeState::Idle);

        runtime.launch(&library, &id).unwrap();
        assert_eq!(runtime.state(), RuntimeState::Loading);
        assert_eq!(runtime.renderer().calls, vec!["load index.html"]);

        runtime.handle_event(RendererEvent::LoadFinished);
        assert_eq!(runtime.state(), RuntimeState::Playing);
        std::thread::sleep(Duration::from_millis(5));

        let summary = runtime.stop_and_record(&mut library).unwrap().unwrap();
        assert_eq!(summary.game_id, id);
        assert!(summary.elapsed >= Duration::from_millis(5));
        assert_eq!(runtime.state(), RuntimeState::Stopped);
        assert!(library.get(&id).unwrap().last_played.is_some());
    }

    #[test]
    fn editor_round_trip_reloads_and_keeps_time() {
        let (_dir, library, id) = setup();
        let mut runtime = GameRuntime::new(RecordingRenderer::default());
        runtime.launch(&library, &id).unwrap();
        runtime.handle_event(RendererEvent::LoadFinished);
        std::thread::sleep(Duration::from_millis(5));

        runtime.open_editor().unwrap();
        assert_eq!(runtime.state(), RuntimeState::PausedForEdit);
        let before = runtime.elapsed();
        assert!(before >= Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(runtime.elapsed(), before);

        runtime.on_file_changed(&change(id)).unwrap();
        assert!(runtime.has_pending_reload());

        runtime.close_editor().unwrap();
        assert_eq!(runtime.state(), RuntimeState::Loading);
        runtime.handle_event(RendererEvent::LoadFinished);
        assert_eq!(runtime.state(), RuntimeState::Playing);
        assert!(runtime.elapsed() >= before);
        assert_eq!(runtime.renderer().calls.last().unwrap(), "reload");
    }

    #[test]
    fn live_edit_while_playing_reloads() {
        let (_dir, library, id) = setup();
        let mut runtime = GameRuntime::new(RecordingRenderer::default());
        runtime.launch(&library, &id).unwrap();
        runtime.handle_event(RendererEvent::LoadFinished);

        let (tx, mut rx) = broadcast::channel(4);
        tx.send(change(Uuid::new_v4())).unwrap();
        tx.send(change(id)).unwrap();
        assert_eq!(runtime.poll_changes(&mut rx).unwrap(), 1);
        assert_eq!(runtime.state(), RuntimeState::Loading);
    }

    #[test]
    fn illegal_transitions_are_errors() {
        let (_dir, library, id) = setup();
        let mut runtime = GameRuntime::new(RecordingRenderer::default());
        assert!(runtime.open_editor().is_err());
        assert!(runtime.close_editor().is_err());
        assert!(runtime.stop().is_none());

        runtime.launch(&library, &id).unwrap();
        assert!(matches!(runtime.launch(&library, &id), Err(GameBoxError::RuntimeError(_))));
    }

    #[test]
    fn load_failure_stops() {
        let (_dir, library, id) = setup();
        let mut runtime = GameRuntime::new(RecordingRenderer::default());
        runtime.launch(&library, &id).unwrap();
        runtime.handle_event(RendererEvent::LoadFailed("syntax error".to_string()));
        assert_eq!(runtime.state(), RuntimeState::Stopped);
        assert_eq!(runtime.last_error(), Some("syntax error"));
        runtime.launch(&library, &id).unwrap();
    }

    #[test]
    fn renderer_refusal_keeps_idle() {
        let (_dir, library, id) = setup();
        let mut runtime = GameRuntime::new(RecordingRenderer { fail_load: true, ..Default::default() });
        assert!(runtime.launch(&library, &id).is_err());
        assert_eq!(runtime.state(), RuntimeState::Idle);
    }

    #[test]
    fn fullscreen_toggles_are_independent() {
        let mut runtime = GameRuntime::new(RecordingRenderer::default());
        assert!(runtime.toggle_viewport_fullscreen());
        assert!(runtime.toggle_window_fullscreen());
        assert!(!runtime.toggle_viewport_fullscreen());
        assert_eq!(runtime.display(), DisplayState { viewport_fullscreen: false, window_fullscreen: true });
    }
}
