//! Rule engine: stone placement, captures, suicide and simple ko.
//!
//! A [`Position`] is the derived cache of a game record: the board, the
//! capture counters and the current ko point. All mutation goes through
//! [`Position::apply_move`], which either succeeds completely or leaves the
//! position untouched.

use std::collections::BTreeSet;
use std::fmt;

use crate::board::{Board, Color, Point};

/// Why a move was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// Unparseable or off-board input
    Invalid,
    /// Point already holds one of the mover's stones
    OwnStone,
    /// Point holds an opponent stone
    Occupied,
    /// Move retakes the ko
    Ko,
    /// Move would leave its own group without liberties
    Suicide,
    /// The game has already ended
    GameOver,
    /// The human tried to move for the engine
    NotYourTurn,
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::Invalid => write!(f, "Illegal move: invalid coordinate"),
            MoveError::OwnStone => write!(f, "Illegal move: point holds your own stone"),
            MoveError::Occupied => write!(f, "Illegal move: point not EMPTY"),
            MoveError::Ko => write!(f, "Illegal move: retakes ko"),
            MoveError::Suicide => write!(f, "Illegal move: suicide"),
            MoveError::GameOver => write!(f, "Illegal move: game is over"),
            MoveError::NotYourTurn => write!(f, "Not your turn"),
        }
    }
}

impl std::error::Error for MoveError {}

/// Stones removed from the board, per color of the removed stones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Captures {
    /// Black stones captured by White
    pub black: u32,
    /// White stones captured by Black
    pub white: u32,
}

impl Captures {
    fn add(&mut self, victim: Color, n: u32) {
        match victim {
            Color::Black => self.black += n,
            Color::White => self.white += n,
        }
    }

    fn remove(&mut self, victim: Color, n: u32) {
        match victim {
            Color::Black => self.black -= n,
            Color::White => self.white -= n,
        }
    }

    /// Stones taken by `color` (its prisoners).
    pub fn taken_by(&self, color: Color) -> u32 {
        match color {
            Color::Black => self.white,
            Color::White => self.black,
        }
    }
}

/// Outcome of a successful placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Opponent stones removed by the move
    pub captured: Vec<Point>,
    /// Ko point created by the move, if any
    pub ko: Option<Point>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Position {
    pub board: Board,
    pub captures: Captures,
    /// Point barred by simple ko, and the color it is barred for
    pub ko: Option<(Point, Color)>,
}

impl Position {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `color` playing at `pt` would retake the ko.
    pub fn is_ko(&self, pt: Point, color: Color) -> bool {
        self.ko == Some((pt, color))
    }

    /// Check whether `color` may play at `pt`, without touching the board.
    ///
    /// Works on a copy: opponent groups left without liberties are removed
    /// first, then the mover's own group must still have a liberty.
    pub fn is_valid_move(&self, pt: Point, color: Color) -> bool {
        if self.board.get(pt).is_some() {
            return false;
        }
        let mut board = self.board.clone();
        board.set(pt, Some(color));
        for group in dead_neighbor_groups(&board, pt, color.opponent()) {
            for p in group {
                board.set(p, None);
            }
        }
        let own = board.group(pt);
        !board.liberties(&own).is_empty()
    }

    /// Place a stone, resolve captures and update the ko point.
    ///
    /// On suicide the board and capture counters are restored exactly and
    /// `MoveError::Suicide` is returned. The ko point is not checked here;
    /// that is the caller's turn-order concern.
    pub fn apply_move(&mut self, pt: Point, color: Color) -> Result<Placement, MoveError> {
        match self.board.get(pt) {
            Some(c) if c == color => return Err(MoveError::OwnStone),
            Some(_) => return Err(MoveError::Occupied),
            None => {}
        }

        let board_before = self.board.clone();
        let opponent = color.opponent();
        self.board.set(pt, Some(color));

        let dead = dead_neighbor_groups(&self.board, pt, opponent);
        let mut captured = Vec::new();
        for group in &dead {
            for &p in group {
                self.board.set(p, None);
                captured.push(p);
            }
            self.captures.add(opponent, group.len() as u32);
        }

        let own = self.board.group(pt);
        let own_liberties = self.board.liberties(&own);
        if own_liberties.is_empty() {
            self.board = board_before;
            self.captures.remove(opponent, captured.len() as u32);
            return Err(MoveError::Suicide);
        }

        // Simple ko: one stone from one group, and the capturing stone is
        // left in atari.
        self.ko = if dead.len() == 1 && captured.len() == 1 && own_liberties.len() == 1 {
            Some((captured[0], opponent))
        } else {
            None
        };

        Ok(Placement {
            captured,
            ko: self.ko.map(|(p, _)| p),
        })
    }

    /// A pass never touches the board but always clears the ko.
    pub fn pass(&mut self) {
        self.ko = None;
    }
}

/// Opponent groups adjacent to `pt` that have no liberties, deduplicated.
fn dead_neighbor_groups(board: &Board, pt: Point, opponent: Color) -> Vec<BTreeSet<Point>> {
    let mut dead: Vec<BTreeSet<Point>> = Vec::new();
    for n in Board::neighbors(pt) {
        if board.get(n) != Some(opponent) || dead.iter().any(|g| g.contains(&n)) {
            continue;
        }
        let group = board.group(n);
        if board.liberties(&group).is_empty() {
            dead.push(group);
        }
    }
    dead
}
