use clap::{Parser, ValueEnum};
use log::{error, info};
use server::config::EngineConfig;
use server::engine::GameEngine;
use server::network::Server;
use server::sink::{HistoryStore, JsonLinesStore, LogStore, SideChannel};
use shared::{Difficulty, RaceSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TextDifficulty {
    Easy,
    Medium,
    Hard,
}

impl From<TextDifficulty> for Difficulty {
    fn from(value: TextDifficulty) -> Self {
        match value {
            TextDifficulty::Easy => Difficulty::Easy,
            TextDifficulty::Medium => Difficulty::Medium,
            TextDifficulty::Hard => Difficulty::Hard,
        }
    }
}

// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Seconds a finished tic-tac-toe or connect-four session stays queryable
    #[clap(long, default_value = "60")]
    board_grace_secs: u64,
    /// Seconds a finished typing race stays queryable
    #[clap(long, default_value = "120")]
    race_grace_secs: u64,
    /// Upper bound on the length of a typing race, in seconds
    #[clap(long, default_value = "180")]
    race_duration_secs: u64,
    /// Countdown ticks before a race starts
    #[clap(long, default_value = "3")]
    countdown: u32,
    /// Default text difficulty for typing races
    #[clap(long, value_enum, default_value = "medium")]
    difficulty: TextDifficulty,
    /// Append action history and snapshots to this JSON-lines file
    #[clap(long)]
    history_file: Option<PathBuf>,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            board_game_grace: Duration::from_secs(self.board_grace_secs),
            race_grace: Duration::from_secs(self.race_grace_secs),
            race: RaceSettings {
                difficulty: self.difficulty.into(),
                max_duration_secs: self.race_duration_secs,
            },
            countdown_from: self.countdown,
            ..EngineConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let store: Arc<dyn HistoryStore> = match &args.history_file {
        Some(path) => {
            info!("Writing history to {}", path.display());
            Arc::new(JsonLinesStore::open(path)?)
        }
        None => Arc::new(LogStore),
    };
    let (sinks, writer) = SideChannel::spawn(store);
    let engine = GameEngine::new(args.engine_config(), sinks.clone());

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, engine).await?;

    tokio::select! {
        _ = server.run() => {}
        result = writer => {
            if let Err(e) = result {
                error!("History writer panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    sinks.flush().await;
    Ok(())
}
