//! Territory estimates from the engine's ownership map.

use std::fmt;

use thiserror::Error;

use crate::board::{Color, Point};
use crate::constants::{BOARD_POINTS, N, OWNERSHIP_THRESHOLD};
use crate::position::Captures;

#[derive(Debug, Error, PartialEq)]
pub enum OwnershipError {
    #[error("ownership has {actual} values, expected {expected}")]
    Length { expected: usize, actual: usize },
}

/// Per-point ownership in `[-1, 1]`, positive favoring Black.
///
/// Stored row-major with the top row first, as the engine emits it.
#[derive(Debug, Clone, PartialEq)]
pub struct Ownership {
    values: Vec<f64>,
}

impl Ownership {
    pub fn new(values: Vec<f64>) -> Result<Self, OwnershipError> {
        if values.len() != BOARD_POINTS {
            return Err(OwnershipError::Length {
                expected: BOARD_POINTS,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn at(&self, pt: Point) -> f64 {
        self.values[(N - 1 - pt.row) * N + pt.col]
    }

    /// The map as rows, top row first.
    pub fn grid(&self) -> Vec<Vec<f64>> {
        self.values.chunks(N).map(<[f64]>::to_vec).collect()
    }

    /// Settled owner of a point, if the estimate is confident enough.
    pub fn owner(&self, pt: Point) -> Option<Color> {
        classify(self.at(pt))
    }
}

fn classify(value: f64) -> Option<Color> {
    if value > OWNERSHIP_THRESHOLD {
        Some(Color::Black)
    } else if value < -OWNERSHIP_THRESHOLD {
        Some(Color::White)
    } else {
        None
    }
}

/// Owner of one point in a territory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Territory {
    Black,
    White,
    Disputed,
}

impl fmt::Display for Territory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Territory::Black => 'B',
            Territory::White => 'W',
            Territory::Disputed => '?',
        };
        write!(f, "{c}")
    }
}

/// Area count of a finished game.
#[derive(Debug, Clone, PartialEq)]
pub struct TerritoryScore {
    pub black_territory: u32,
    pub white_territory: u32,
    pub black_prisoners: u32,
    pub white_prisoners: u32,
    pub black_score: f64,
    pub white_score: f64,
    pub komi: f64,
    /// Absolute margin, rounded to 0.1
    pub difference: f64,
    pub winner: Color,
    /// The engine's own score lead for the side to move
    pub engine_score_lead: f64,
    /// Rows from the top edge down
    pub territory_map: Vec<Vec<Territory>>,
}

impl TerritoryScore {
    pub fn compute(
        ownership: &Ownership,
        captures: Captures,
        komi: f64,
        engine_score_lead: f64,
    ) -> Self {
        let mut black_territory = 0;
        let mut white_territory = 0;
        let territory_map: Vec<Vec<Territory>> = ownership
            .grid()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&v| match classify(v) {
                        Some(Color::Black) => {
                            black_territory += 1;
                            Territory::Black
                        }
                        Some(Color::White) => {
                            white_territory += 1;
                            Territory::White
                        }
                        None => Territory::Disputed,
                    })
                    .collect()
            })
            .collect();

        let black_prisoners = captures.taken_by(Color::Black);
        let white_prisoners = captures.taken_by(Color::White);
        let black_score = f64::from(black_territory + black_prisoners);
        let white_score = f64::from(white_territory + white_prisoners) + komi;
        let margin = black_score - white_score;

        Self {
            black_territory,
            white_territory,
            black_prisoners,
            white_prisoners,
            black_score: round1(black_score),
            white_score: round1(white_score),
            komi,
            difference: round1(margin.abs()),
            winner: if margin > 0.0 { Color::Black } else { Color::White },
            engine_score_lead: round1(engine_score_lead),
            territory_map,
        }
    }
}

/// Round to one decimal place.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
