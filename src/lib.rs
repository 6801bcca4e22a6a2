//! Weiqi: Go rules, game sessions and a bridge to an external analysis engine.
//!
//! The rules engine ([`position`]) enforces captures, suicide and simple ko on
//! a 19x19 [`board`]. A [`game::Game`] keeps the move record, undo and time
//! travel, and talks to the engine through [`bridge`], a line-delimited JSON
//! client for a KataGo-style `analysis` subprocess.
//!
//! ## Modules
//!
//! - [`constants`] - Board dimensions, visit budgets and timeouts
//! - [`board`] - Coordinates, moves and the board grid
//! - [`position`] - Rule engine (captures, suicide, ko)
//! - [`game`] - Game state machine
//! - [`exploration`] - Exploration mode and sequence import
//! - [`analysis`] - Engine protocol messages
//! - [`bridge`] - Engine process and request correlation
//! - [`scoring`] - Ownership maps and territory counts
//! - [`telemetry`] - Per-move reports for observers
//! - [`config`] - Engine and game settings
//! - [`console`] - Text front end
//!
//! ## Example
//!
//! ```
//! use weiqi::config::{EngineConfig, GameSettings};
//! use weiqi::game::Game;
//!
//! let mut game = Game::new(GameSettings::default(), EngineConfig::default());
//! game.play("D4").unwrap();
//! game.play("Q16").unwrap();
//! assert_eq!(game.moves().len(), 2);
//! println!("{}", game.board());
//! ```

pub mod analysis;
pub mod board;
pub mod bridge;
pub mod config;
pub mod console;
pub mod constants;
pub mod exploration;
pub mod game;
pub mod position;
pub mod scoring;
pub mod telemetry;
