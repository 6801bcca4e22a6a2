//! Free-form exploration: no automatic replies, raw suggestions and
//! sequence import.

use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::{AnalysisResponse, Candidate};
use crate::board::{Board, Color, Move, Point, Vertex};
use crate::bridge::EngineError;
use crate::config::{EngineConfig, GameSettings, Rules};
use crate::constants::{ANALYSIS_VISITS, N};
use crate::game::Game;
use crate::position::MoveError;

/// Metadata accompanying an imported sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportHeader {
    pub board_size: Option<u32>,
    pub komi: Option<f64>,
    /// Free-form ruleset name, e.g. `"Chinese"` or `"jp"`
    pub rules: Option<String>,
}

/// One imported move. `coord` is `(column, row)` with row 0 at the top; `None`
/// is a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportMove {
    pub color: Color,
    pub coord: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum ImportError {
    #[error("only 19x19 boards are supported, got {0}x{0}")]
    UnsupportedBoardSize(u32),
    #[error("line {line}: cannot parse {text:?}")]
    Parse { line: usize, text: String },
}

/// A session for exploring positions.
pub struct Exploration {
    game: Game,
}

impl Exploration {
    pub fn new(settings: GameSettings, engine: EngineConfig) -> Self {
        Self {
            game: Game::branched(settings, engine),
        }
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game {
        &mut self.game
    }

    /// Play text input for the side to move; nothing answers it.
    pub fn play(&mut self, text: &str) -> Result<(), MoveError> {
        self.game.play(text)
    }

    /// Ranked candidates for the side to move, without committing anything.
    pub fn suggest(&mut self, n: usize) -> Result<Vec<Candidate>, EngineError> {
        self.game.suggestions(n)
    }

    /// The full analysis of the current position.
    pub fn analysis_only(&mut self) -> Result<AnalysisResponse, EngineError> {
        self.game.analyze(ANALYSIS_VISITS)
    }

    /// Hand the move to `color` regardless of turn order.
    pub fn switch_player(&mut self, color: Color) {
        self.game.set_to_move(color);
    }

    pub fn reset(&mut self) {
        self.game.reset();
    }

    /// Replace the session with an imported sequence.
    ///
    /// Each move is played for the color it was tagged with. Moves the rules
    /// reject are skipped with a warning. `on_move` sees every applied move
    /// together with the resulting board.
    pub fn import(
        &mut self,
        header: &ImportHeader,
        moves: &[ImportMove],
        mut on_move: impl FnMut(usize, &Move, &Board),
    ) -> Result<ImportSummary, ImportError> {
        if let Some(size) = header.board_size {
            if size as usize != N {
                return Err(ImportError::UnsupportedBoardSize(size));
            }
        }

        self.game.reset();
        if let Some(komi) = header.komi {
            if !self.game.change_komi(komi) {
                warn!(komi, "ignoring imported komi");
            }
        }
        if let Some(hint) = header.rules.as_deref() {
            match Rules::from_hint(hint) {
                Some(rules) => self.game.set_rules(rules),
                None => warn!(hint, "unrecognized ruleset; keeping current rules"),
            }
        }

        let mut summary = ImportSummary::default();
        for (i, m) in moves.iter().enumerate() {
            let vertex = match m.coord {
                None => Vertex::Pass,
                Some((col, row)) => match Point::from_import(col, row) {
                    Some(pt) => Vertex::Play(pt),
                    None => {
                        warn!(index = i, col, row, "skipping off-board imported move");
                        summary.skipped += 1;
                        continue;
                    }
                },
            };
            match self.game.apply_quiet(m.color, vertex) {
                Ok(()) => {
                    summary.applied += 1;
                    on_move(summary.applied, &Move::new(m.color, vertex), self.game.board());
                }
                Err(e) => {
                    warn!(index = i, color = %m.color, %vertex, error = %e, "skipping imported move");
                    summary.skipped += 1;
                }
            }
        }
        info!(applied = summary.applied, skipped = summary.skipped, "sequence imported");
        Ok(summary)
    }
}

/// Parse a plain-text record.
///
/// Blank lines and `#` comments are ignored. Header lines are `size 19`,
/// `komi 7.5` and `rules japanese`; every other line is a move such as `B D4`
/// or `W pass`.
pub fn parse_record(text: &str) -> Result<(ImportHeader, Vec<ImportMove>), ImportError> {
    let mut header = ImportHeader::default();
    let mut moves = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let err = || ImportError::Parse {
            line: i + 1,
            text: raw.to_string(),
        };
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(err());
        };
        match key.to_ascii_lowercase().as_str() {
            "size" => header.board_size = Some(value.parse().map_err(|_| err())?),
            "komi" => header.komi = Some(value.parse().map_err(|_| err())?),
            "rules" => header.rules = Some(value.to_string()),
            _ => {
                let color: Color = key.parse().map_err(|_| err())?;
                let coord = match Vertex::parse(value).ok_or_else(err)? {
                    Vertex::Pass => None,
                    Vertex::Play(pt) => Some(pt.to_import()),
                };
                moves.push(ImportMove { color, coord });
            }
        }
    }
    Ok((header, moves))
}
