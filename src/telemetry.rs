//! One-way move reports for external observers.
//!
//! Reports are produced after a move is committed. Observers cannot fail or
//! delay the move beyond their own call.

use std::sync::{Arc, Mutex, PoisonError};

use crate::analysis::Candidate;
use crate::board::{Board, Move};
use crate::scoring::Ownership;

/// Win rates from Black's and White's side, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinrateSample {
    pub move_number: usize,
    pub black_winrate: f64,
    pub white_winrate: f64,
    pub score_lead: f64,
}

#[derive(Debug, Clone)]
pub struct MoveReport {
    pub move_number: usize,
    pub mv: Move,
    pub board: Board,
    pub winrate: Option<WinrateSample>,
    pub candidates: Vec<Candidate>,
    pub ownership: Option<Ownership>,
}

pub trait MoveObserver: Send {
    fn on_move(&mut self, report: &MoveReport);
}

/// Discards every report.
#[derive(Debug, Default)]
pub struct NullObserver;

impl MoveObserver for NullObserver {
    fn on_move(&mut self, _report: &MoveReport) {}
}

/// Keeps every report in memory; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemoryObserver {
    reports: Arc<Mutex<Vec<MoveReport>>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<MoveReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MoveObserver for MemoryObserver {
    fn on_move(&mut self, report: &MoveReport) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
    }
}
