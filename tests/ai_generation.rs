use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::runtime::Handle;

use gamebox::{
    ai::{AiProvider, Applied, GenerationOutcome, ProviderRequest},
    AiFailure, AppPaths, CodeEditorBridge, Gamai, GameBoxError, GameMetadata, GameType,
    GenerationRequest, LibraryManager,
};

struct Scripted {
    reply: Result<String, AiFailure>,
    delay: Duration,
}

#[async_trait]
impl AiProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _request: &ProviderRequest) -> Result<String, AiFailure> {
        tokio::time::sleep(self.delay).await;
        self.reply.clone()
    }
}

fn snapshot(dir: &std::path::Path) -> Vec<(std::path::PathBuf, Vec<u8>)> {
    let mut files: Vec<_> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| (e.path().to_path_buf(), std::fs::read(e.path()).unwrap()))
        .collect();
    files.sort();
    files
}

#[tokio::test]
async fn provider_failures_leave_every_file_identical() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = LibraryManager::open(AppPaths::new(dir.path())).unwrap();
    let game = library
        .create_game(GameMetadata::new("Maze", GameType::TwoD, 1, vec!["Puzzle".to_string()]))
        .unwrap();
    let editor = CodeEditorBridge::for_library(&library);
    let before = snapshot(dir.path());

    let failures = vec![
        Err(AiFailure::Network("connection reset".to_string())),
        Err(AiFailure::Auth("invalid key".to_string())),
        Err(AiFailure::RateLimited),
        Ok(String::new()),
        Ok("no markup at all".to_string()),
    ];
    for reply in failures {
        let mut gamai = Gamai::new(Arc::new(Scripted { reply, delay: Duration::ZERO }), Handle::current());
        for request in [GenerationRequest::edit(game.id, "add levels"), GenerationRequest::surprise()] {
            let result = gamai.submit(request, &library, &editor, None).unwrap().wait().await;
            assert!(matches!(result.outcome, GenerationOutcome::Failed(_)));
            let err = gamai.apply(result, &mut library, &editor).unwrap_err();
            assert!(matches!(err, GameBoxError::AiProviderError(_)));
        }
    }

    assert_eq!(snapshot(dir.path()), before);
    assert_eq!(library.len(), 1);
}

#[tokio::test]
async fn cancel_releases_the_worker_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = LibraryManager::open(AppPaths::new(dir.path())).unwrap();
    let game = library
        .create_game(GameMetadata::new("Maze", GameType::TwoD, 1, vec!["Puzzle".to_string()]))
        .unwrap();
    let editor = CodeEditorBridge::for_library(&library);
    let before = snapshot(dir.path());

    let provider = Scripted {
        reply: Ok("<html><canvas></canvas></html>".to_string()),
        delay: Duration::from_secs(30),
    };
    let mut gamai = Gamai::new(Arc::new(provider), Handle::current());
    let handle = gamai.submit(GenerationRequest::edit(game.id, "add levels"), &library, &editor, None).unwrap();
    handle.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle.wait()).await.unwrap();
    assert_eq!(result.outcome, GenerationOutcome::Cancelled);
    assert!(!gamai.is_busy());
    assert!(matches!(gamai.apply(result, &mut library, &editor), Err(GameBoxError::Cancelled)));
    assert_eq!(snapshot(dir.path()), before);
}

#[tokio::test]
async fn surprise_adds_a_playable_game() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = LibraryManager::open(AppPaths::new(dir.path())).unwrap();
    let editor = CodeEditorBridge::for_library(&library);
    let provider = Scripted {
        reply: Ok("<!doctype html><html><head><title>Moth Lights</title></head><canvas></canvas></html>".to_string()),
        delay: Duration::ZERO,
    };
    let mut gamai = Gamai::new(Arc::new(provider), Handle::current());

    let result = gamai.submit(GenerationRequest::surprise(), &library, &editor, None).unwrap().wait().await;
    let Applied::Created(entry) = gamai.apply(result, &mut library, &editor).unwrap() else {
        panic!("expected a new game");
    };
    assert_eq!(entry.name, "Moth Lights");
    assert!(library.entry_path(&entry.id).unwrap().is_file());
    assert!(entry.has_tag("ai"));
}
