//! 2D board representation, coordinates and group queries.
//!
//! Points are addressed by `(row, col)` with row 0 on the bottom line, so
//! `D4` is `row 3, col 3`. The engine's text convention (`A`-`T` skipping `I`,
//! rows 1-19 bottom to top) is produced by `Point`'s `Display`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{BOARD_POINTS, COLUMN_LETTERS, N};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "B")]
    Black,
    #[serde(rename = "W")]
    White,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Color::Black => 'B',
            Color::White => 'W',
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "B" | "BLACK" => Ok(Color::Black),
            "W" | "WHITE" => Ok(Color::White),
            other => Err(format!("unknown color: {other}")),
        }
    }
}

/// An on-board intersection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
    pub row: usize,
    pub col: usize,
}

impl Point {
    /// Create a point, or `None` if it lies off the board.
    pub fn new(row: usize, col: usize) -> Option<Self> {
        (row < N && col < N).then_some(Point { row, col })
    }

    /// Parse engine-style text such as `"D4"` or `"q16"`.
    ///
    /// Returns `None` for an unknown column letter (including `I`), a row
    /// outside 1-19, or any trailing garbage.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars();
        let col_char = chars.next()?.to_ascii_uppercase();
        let col = COLUMN_LETTERS.iter().position(|&c| c as char == col_char)?;

        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let row: usize = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Point::new(row - 1, col)
    }

    /// Convert from the import convention: 0-indexed `(column, row)` with
    /// row 0 at the top edge.
    pub fn from_import(col: usize, row_from_top: usize) -> Option<Self> {
        if row_from_top >= N {
            return None;
        }
        Point::new(N - 1 - row_from_top, col)
    }

    /// The inverse of [`Point::from_import`].
    pub fn to_import(self) -> (usize, usize) {
        (self.col, N - 1 - self.row)
    }

    #[inline]
    fn index(self) -> usize {
        self.row * N + self.col
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", COLUMN_LETTERS[self.col] as char, self.row + 1)
    }
}

/// Where a move goes: a point, or nowhere.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Vertex {
    Play(Point),
    Pass,
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vertex::Play(pt) => write!(f, "{pt}"),
            Vertex::Pass => write!(f, "pass"),
        }
    }
}

impl Vertex {
    /// Parse engine output (`"Q16"`, `"pass"`).
    pub fn parse(s: &str) -> Option<Self> {
        if s.trim().eq_ignore_ascii_case("pass") {
            return Some(Vertex::Pass);
        }
        Point::parse(s).map(Vertex::Play)
    }
}

/// One entry of the game record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub color: Color,
    pub vertex: Vertex,
}

impl Move {
    pub fn new(color: Color, vertex: Vertex) -> Self {
        Self { color, vertex }
    }

    pub fn is_pass(&self) -> bool {
        self.vertex == Vertex::Pass
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.color, self.vertex)
    }
}

/// The 19x19 grid of stones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    cells: Vec<Option<Color>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: vec![None; BOARD_POINTS],
        }
    }

    pub fn get(&self, pt: Point) -> Option<Color> {
        self.cells[pt.index()]
    }

    pub(crate) fn set(&mut self, pt: Point, stone: Option<Color>) {
        self.cells[pt.index()] = stone;
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Number of stones of `color` on the board.
    pub fn count(&self, color: Color) -> usize {
        self.cells.iter().filter(|&&c| c == Some(color)).count()
    }

    /// Every point, bottom row first.
    pub fn points() -> impl Iterator<Item = Point> {
        (0..N).flat_map(|row| (0..N).map(move |col| Point { row, col }))
    }

    /// Rows from the top edge down, as the engine and observers see them.
    pub fn rows(&self) -> Vec<Vec<Option<Color>>> {
        (0..N)
            .rev()
            .map(|row| (0..N).map(|col| self.get(Point { row, col })).collect())
            .collect()
    }

    /// The in-bounds orthogonal neighbors of a point.
    pub fn neighbors(pt: Point) -> impl Iterator<Item = Point> {
        let Point { row, col } = pt;
        let mut v = Vec::with_capacity(4);
        if row > 0 {
            v.push(Point { row: row - 1, col });
        }
        if row + 1 < N {
            v.push(Point { row: row + 1, col });
        }
        if col > 0 {
            v.push(Point { row, col: col - 1 });
        }
        if col + 1 < N {
            v.push(Point { row, col: col + 1 });
        }
        v.into_iter()
    }

    /// Collect the group containing `pt` with an explicit stack.
    ///
    /// Returns an empty set if the point is empty.
    pub fn group(&self, pt: Point) -> BTreeSet<Point> {
        let mut group = BTreeSet::new();
        let Some(color) = self.get(pt) else {
            return group;
        };
        let mut stack = vec![pt];
        while let Some(p) = stack.pop() {
            if !group.insert(p) {
                continue;
            }
            for n in Self::neighbors(p) {
                if self.get(n) == Some(color) && !group.contains(&n) {
                    stack.push(n);
                }
            }
        }
        group
    }

    /// Empty points adjacent to any stone of `group`.
    pub fn liberties(&self, group: &BTreeSet<Point>) -> BTreeSet<Point> {
        group
            .iter()
            .flat_map(|&p| Self::neighbors(p))
            .filter(|&n| self.get(n).is_none())
            .collect()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "   ")?;
        for &c in COLUMN_LETTERS {
            write!(f, "{} ", c as char)?;
        }
        writeln!(f)?;
        for row in (0..N).rev() {
            write!(f, "{:>2} ", row + 1)?;
            for col in 0..N {
                let ch = match self.get(Point { row, col }) {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
