use std::sync::{Arc, Barrier};
use std::thread;
use tokio::sync::broadcast::error::TryRecvError;

use gamebox::{
    editor::EditOrigin, AppPaths, CodeEditorBridge, GameMetadata, GameType, LibraryManager,
};

const WRITERS: usize = 8;
const ROUNDS: usize = 25;

/// A large body made of one repeated marker, so any interleaving shows up as
/// a mix of markers.
fn body(writer: usize, round: usize) -> String {
    let marker = format!("<!-- writer {} round {} -->\n", writer, round);
    marker.repeat(2_000)
}

#[test]
fn racing_writers_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = LibraryManager::open(AppPaths::new(dir.path())).unwrap();
    let entry = library
        .create_game(GameMetadata::new("Race", GameType::TwoD, 2, vec!["Arcade".to_string()]))
        .unwrap();
    let bridge = Arc::new(CodeEditorBridge::for_library(&library));
    let mut changes = bridge.subscribe();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let workers: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let bridge = bridge.clone();
            let barrier = barrier.clone();
            let entry = entry.clone();
            let origin = if writer % 2 == 0 { EditOrigin::Manual } else { EditOrigin::Assistant };
            thread::spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    bridge.write_source(&entry, "index.html", &body(writer, round), origin).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let contents = bridge.read_source(&entry, "index.html").unwrap();
    let first_line = contents.lines().next().unwrap().to_string();
    assert!(contents.lines().all(|line| line == first_line));
    assert_eq!(contents.lines().count(), 2_000);

    let mut notified = 0;
    loop {
        match changes.try_recv() {
            Ok(_) => notified += 1,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    // The channel keeps the newest 64 notifications.
    assert!(notified > 0);

    // No temp files are left next to the entry file.
    let folder = library.game_folder(&entry.id).unwrap();
    let leftovers = std::fs::read_dir(folder).unwrap().count();
    assert_eq!(leftovers, 1);
}
