//! Weiqi: play Go against an analysis engine, or explore positions with it.
//!
//! ## Usage
//!
//! - `weiqi` - Show a demo of the rules engine
//! - `weiqi play` - Play against the engine on the console
//! - `weiqi explore` - Explore and import positions with engine analysis
//!
//! The engine is located through `--katago`, `--model` and `--config`, or the
//! `WEIQI_KATAGO_BIN`, `WEIQI_KATAGO_MODEL` and `WEIQI_KATAGO_CONFIG`
//! environment variables. Log verbosity follows `RUST_LOG`.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use weiqi::board::Color;
use weiqi::config::{EngineConfig, GameSettings, Rules};
use weiqi::console::{Console, Session};
use weiqi::exploration::Exploration;
use weiqi::game::Game;

/// Weiqi: Go against an external analysis engine
#[derive(Parser)]
#[command(name = "weiqi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Engine binary (path or name on PATH)
    #[arg(long, global = true)]
    katago: Option<PathBuf>,

    /// Neural network model file
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Analysis config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Compensation points for White
    #[arg(long, global = true, default_value_t = weiqi::constants::DEFAULT_KOMI)]
    komi: f64,

    #[arg(long, global = true, value_enum, default_value_t = Rules::Chinese)]
    rules: Rules,

    /// Your color when playing (B or W)
    #[arg(long, global = true, default_value = "B")]
    color: Color,

    /// Engine thinking budget; 1.0 is 100 visits
    #[arg(long, global = true, default_value_t = weiqi::constants::DEFAULT_AI_TIME_LIMIT)]
    strength: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Play against the engine
    Play,
    /// Explore positions: no engine replies, suggestions and import
    Explore,
    /// Run a short demo of the rules engine (no engine needed)
    Demo,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weiqi=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut engine = EngineConfig::from_env();
    if let Some(binary) = cli.katago {
        engine.binary = binary;
    }
    if let Some(model) = cli.model {
        engine.model = model;
    }
    if let Some(config) = cli.config {
        engine.config = config;
    }

    let mut settings = GameSettings {
        player_color: cli.color,
        komi: cli.komi,
        rules: cli.rules,
        ..GameSettings::default()
    };
    anyhow::ensure!(
        settings.komi.is_finite(),
        "komi must be a number, got {}",
        settings.komi
    );
    anyhow::ensure!(
        cli.strength.is_finite() && cli.strength > 0.0,
        "strength must be positive, got {}",
        cli.strength
    );
    settings.ai_time_limit = cli.strength;

    let session = match cli.command {
        Some(Commands::Play) => Session::Play(Game::new(settings, engine)),
        Some(Commands::Explore) => Session::Explore(Exploration::new(settings, engine)),
        Some(Commands::Demo) | None => return run_demo(),
    };

    let stdin = io::stdin();
    Console::new(session)
        .run(stdin.lock(), io::stdout())
        .context("console I/O failed")
}

fn run_demo() -> Result<()> {
    println!("Weiqi: Go rules and analysis-engine bridge\n");

    let offline = EngineConfig::default();

    println!("=== Capture Demo ===");
    let mut game = Game::new(GameSettings::default(), offline.clone());
    for mv in ["D4", "D5", "A1", "C4", "A2", "E4", "A3", "D3"] {
        game.play(mv)
            .with_context(|| format!("demo move {mv} rejected"))?;
    }
    println!("{}", game.board());
    println!("White has taken {} stone(s)\n", game.captures().taken_by(Color::White));

    println!("=== Ko Demo ===");
    let mut game = Game::new(GameSettings::default(), offline);
    for mv in ["C4", "E5", "D5", "E3", "D3", "F4", "pass", "D4", "E4"] {
        game.play(mv)
            .with_context(|| format!("demo move {mv} rejected"))?;
    }
    println!("{}", game.board());
    match game.play("D4") {
        Ok(()) => println!("White retook the ko?!"),
        Err(e) => println!("White D4: {e}"),
    }
    Ok(())
}
