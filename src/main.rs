// src/main.rs
use std::path::PathBuf;
use std::time::Duration;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use gamebox::{
    ai::{self, Applied, GameConstraints},
    library::{SearchFilters, SortOrder},
    AppPaths, CodeEditorBridge, Gamai, GameBoxError, GameEntry, GameMetadata, GameType,
    GenerationRequest, LibraryManager,
};

#[derive(Parser)]
#[command(name = "gamebox")]
#[command(about = "GameBox - a library of small web games with an AI game maker", long_about = None)]
struct Cli {
    /// Data folder (defaults to $GAMEBOX_HOME or the platform data dir)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every game
    List {
        #[arg(long, value_enum, default_value_t = SortArg::Name)]
        sort: SortArg,
    },
    /// Search by name with optional filters
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        players: Option<u8>,
        #[arg(long)]
        min_rating: Option<u8>,
    },
    /// Create an empty game from the starter template
    Create {
        name: String,
        #[arg(long, default_value = "2D")]
        game_type: GameType,
        #[arg(long, default_value_t = 1)]
        players: u8,
        #[arg(long = "category", required = true)]
        categories: Vec<String>,
    },
    /// Import an .html entry file or an exported .zip
    Import { source: PathBuf },
    /// Export a game to a .zip
    Export {
        id: Uuid,
        #[arg(long)]
        to: Option<PathBuf>,
    },
    /// Delete a game and its files
    Delete { id: Uuid },
    /// Show one game
    Info { id: Uuid },
    /// Add play time to a game
    PlayTime { id: Uuid, seconds: u64 },
    /// Show or change the AI settings
    Config {
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Ask GAMAI for a game, an edit or a chat reply
    Generate {
        #[command(subcommand)]
        mode: GenerateMode,
    },
}

#[derive(Subcommand)]
enum GenerateMode {
    OneShot {
        prompt: String,
        #[arg(long, default_value = "2D")]
        game_type: GameType,
        #[arg(long, default_value_t = 1)]
        players: u8,
        #[arg(long = "category")]
        categories: Vec<String>,
    },
    Surprise,
    ForYou { prompt: Option<String> },
    Chat { message: String },
    Edit { id: Uuid, instruction: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SortArg {
    Name,
    LastPlayed,
    Playtime,
    Rating,
    Recent,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortOrder::Name,
            SortArg::LastPlayed => SortOrder::LastPlayed,
            SortArg::Playtime => SortOrder::Playtime,
            SortArg::Rating => SortOrder::Rating,
            SortArg::Recent => SortOrder::RecentlyCreated,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let paths = match cli.home {
        Some(home) => AppPaths::new(home),
        None => AppPaths::discover(),
    };
    log::info!("Starting GameBox in {}", paths.root().display());

    let mut library = LibraryManager::open(paths.clone())?;
    let settings = ai::config::init(&paths)?;

    match cli.command {
        Commands::List { sort } => {
            let filters = SearchFilters::default();
            for entry in library.search_sorted("", &filters, sort.into()) {
                print_line(entry);
            }
        }
        Commands::Search { query, category, tag, players, min_rating } => {
            let mut filters = SearchFilters::default();
            filters.main_category = category;
            filters.tag = tag;
            filters.players = players;
            filters.min_rating = min_rating;
            for entry in library.search(&query, &filters) {
                print_line(entry);
            }
        }
        Commands::Create { name, game_type, players, categories } => {
            let entry = library.create_game(GameMetadata::new(name, game_type, players, categories))?;
            println!("Created {} in {}", entry.id, library.folder_of(&entry).display());
        }
        Commands::Import { source } => {
            let entry = library.import_game(&source, None)?;
            println!("Imported '{}' as {}", entry.name, entry.id);
        }
        Commands::Export { id, to } => {
            let destination = to.unwrap_or_else(|| paths.exports_dir());
            let archive = library.export_game(&id, &destination)?;
            println!("Exported to {}", archive.display());
        }
        Commands::Delete { id } => {
            library.delete_game(&id)?;
            println!("Deleted {}", id);
        }
        Commands::Info { id } => {
            let entry = library.get(&id).ok_or(GameBoxError::NotFound(id))?;
            println!("{}", serde_json::to_string_pretty(entry)?);
        }
        Commands::PlayTime { id, seconds } => {
            library.record_play_session(&id, Duration::from_secs(seconds))?;
        }
        Commands::Config { model, api_key, timeout_secs } => {
            let settings = if model.is_none() && api_key.is_none() && timeout_secs.is_none() {
                settings
            } else {
                ai::config::save_user_changes(|s| {
                    if let Some(model) = model {
                        s.model = model;
                    }
                    if let Some(key) = api_key {
                        s.api_key = Some(key);
                    }
                    if let Some(secs) = timeout_secs {
                        s.timeout_secs = secs;
                    }
                })?
            };
            println!("{:#?}", settings);
        }
        Commands::Generate { mode } => {
            let request = match mode {
                GenerateMode::OneShot { prompt, game_type, players, categories } => {
                    GenerationRequest::one_shot(prompt, GameConstraints::new(game_type, players, categories))
                }
                GenerateMode::Surprise => GenerationRequest::surprise(),
                GenerateMode::ForYou { prompt } => GenerationRequest::for_you(prompt, GameConstraints::default()),
                GenerateMode::Chat { message } => GenerationRequest::chat(message),
                GenerateMode::Edit { id, instruction } => GenerationRequest::edit(id, instruction),
            };
            generate(&mut library, request).await?;
        }
    }

    Ok(())
}

async fn generate(library: &mut LibraryManager, request: GenerationRequest) -> Result<(), GameBoxError> {
    let settings = ai::config::snapshot()?;
    let mut gamai = Gamai::from_settings(&settings, tokio::runtime::Handle::current())?;
    let editor = CodeEditorBridge::for_library(library);

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let on_complete: ai::CompletionCallback = Box::new(move |status| {
        let _ = done_tx.send(status);
    });
    let mut handle = gamai.submit(request, library, &editor, Some(on_complete))?;
    println!("Waiting for {} (Ctrl+C cancels)...", gamai.provider_name());

    tokio::select! {
        _ = done_rx => {}
        _ = tokio::signal::ctrl_c() => {
            handle.cancel();
            println!("Cancelled, nothing was changed.");
            return Ok(());
        }
    }
    let result = handle.try_result().ok_or(GameBoxError::Cancelled)?;

    match gamai.apply(result, library, &editor)? {
        Applied::Created(entry) => println!("Created '{}' ({})", entry.name, entry.id),
        Applied::Edited(entry) => println!("Updated '{}' ({} edits)", entry.name, entry.edit_count),
        Applied::Replied(reply) => println!("{}", reply),
    }
    Ok(())
}

fn print_line(entry: &GameEntry) {
    let rating = entry.rating.map(|r| "*".repeat(r as usize)).unwrap_or_default();
    println!(
        "{}  {:<30} {:<3} {}p  {:<24} {:>6}s {}",
        entry.id,
        entry.name,
        entry.game_type,
        entry.players,
        entry.main_categories.join(", "),
        entry.playtime_secs,
        rating
    );
}
