//! Game state machine: turn order, move history, undo and time travel.
//!
//! A [`Game`] owns the canonical move record, the derived [`Position`] cache
//! and, lazily, the analysis engine used for replies, suggestions, win-rate
//! tracking and scoring. Rule failures are ordinary `Result`s; engine failures
//! are separate error types so that manual play keeps working without an
//! engine.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::analysis::{AnalysisRequest, AnalysisResponse, Candidate};
use crate::board::{Board, Color, Move, Point, Vertex};
use crate::bridge::{EngineError, LazyBridge};
use crate::config::{EngineConfig, GameSettings, Rules};
use crate::constants::{
    ANALYSIS_VISITS, BOARD_HISTORY_LEN, DEFAULT_SUGGESTIONS, REALTIME_TOP_N,
    REPORT_DURING_SEARCH_EVERY, SCORING_VISITS, WINRATE_VISITS,
};
use crate::position::{Captures, MoveError, Position};
use crate::scoring::{Ownership, OwnershipError, TerritoryScore, round1};
use crate::telemetry::{MoveObserver, MoveReport, NullObserver, WinrateSample};

/// Normalized text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedMove {
    Play(Point),
    Pass,
    Quit,
}

/// Parse user input such as `"d4"`, `" Q16 "`, `"pass"` or `"quit"`.
///
/// Returns `None` for anything malformed or off the board.
pub fn parse_move(text: &str) -> Option<ParsedMove> {
    let text = text.trim();
    match text.to_ascii_uppercase().as_str() {
        "PASS" | "P" => return Some(ParsedMove::Pass),
        "QUIT" | "Q" | "RESIGN" => return Some(ParsedMove::Quit),
        _ => {}
    }
    Point::parse(text).map(ParsedMove::Play)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    NoMoves,
    InProgress,
    Terminal,
}

/// How the move record relates to the board, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum History {
    /// The board always reflects the whole record; time travel truncates it.
    Linear,
    /// The board reflects `moves[..cursor]`; later moves stay recorded until a
    /// new move overwrites them.
    Branched { cursor: usize },
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("engine move {vertex} rejected: {source}")]
    Rejected { vertex: Vertex, source: MoveError },
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("the game is not finished; both sides must pass first")]
    NotFinished,
    #[error("engine returned no ownership map")]
    NoOwnership,
    #[error(transparent)]
    Ownership(#[from] OwnershipError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// One game session.
pub struct Game {
    position: Position,
    moves: Vec<Move>,
    history: History,
    to_move: Color,
    terminal: bool,
    board_history: VecDeque<Board>,
    winrates: Vec<WinrateSample>,
    settings: GameSettings,
    engine: LazyBridge,
    observer: Box<dyn MoveObserver>,
    replaying: bool,
    requests: u64,
}

impl Game {
    /// A game against the engine with a linear history.
    pub fn new(settings: GameSettings, engine: EngineConfig) -> Self {
        Self::with_history(settings, engine, History::Linear)
    }

    /// A game whose history keeps the tail after time travel.
    pub fn branched(settings: GameSettings, engine: EngineConfig) -> Self {
        Self::with_history(settings, engine, History::Branched { cursor: 0 })
    }

    fn with_history(settings: GameSettings, engine: EngineConfig, history: History) -> Self {
        Self {
            position: Position::new(),
            moves: Vec::new(),
            history,
            to_move: Color::Black,
            terminal: false,
            board_history: VecDeque::with_capacity(BOARD_HISTORY_LEN),
            winrates: Vec::new(),
            settings,
            engine: LazyBridge::new(engine),
            observer: Box::new(NullObserver),
            replaying: false,
            requests: 0,
        }
    }

    pub fn set_observer(&mut self, observer: Box<dyn MoveObserver>) {
        self.observer = observer;
    }

    // -------------------------------------------------------------------------
    // State queries
    // -------------------------------------------------------------------------

    pub fn board(&self) -> &Board {
        &self.position.board
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn captures(&self) -> Captures {
        self.position.captures
    }

    pub fn ko_point(&self) -> Option<Point> {
        self.position.ko.map(|(pt, _)| pt)
    }

    pub fn to_move(&self) -> Color {
        self.to_move
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn status(&self) -> GameStatus {
        if self.terminal {
            GameStatus::Terminal
        } else if self.committed() == 0 {
            GameStatus::NoMoves
        } else {
            GameStatus::InProgress
        }
    }

    pub fn history(&self) -> History {
        self.history
    }

    /// Number of moves reflected on the board.
    pub fn committed(&self) -> usize {
        match self.history {
            History::Linear => self.moves.len(),
            History::Branched { cursor } => cursor,
        }
    }

    /// The moves reflected on the board.
    pub fn moves(&self) -> &[Move] {
        &self.moves[..self.committed()]
    }

    /// Every recorded move, including a branch tail beyond the board.
    pub fn recorded_moves(&self) -> &[Move] {
        &self.moves
    }

    /// Boards before each of the most recent moves, oldest first.
    pub fn board_history(&self) -> &VecDeque<Board> {
        &self.board_history
    }

    pub fn winrate_history(&self) -> &[WinrateSample] {
        &self.winrates
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    // -------------------------------------------------------------------------
    // Moves
    // -------------------------------------------------------------------------

    /// Parse and play text input for the side to move. `quit` ends the game.
    pub fn play(&mut self, text: &str) -> Result<(), MoveError> {
        match parse_move(text).ok_or(MoveError::Invalid)? {
            ParsedMove::Quit => {
                self.quit();
                Ok(())
            }
            ParsedMove::Pass => self.make_move(Vertex::Pass),
            ParsedMove::Play(pt) => self.make_move(Vertex::Play(pt)),
        }
    }

    /// Play text input as the human, who may only move on their own turn.
    pub fn human_move(&mut self, text: &str) -> Result<(), MoveError> {
        if self.terminal {
            return Err(MoveError::GameOver);
        }
        if self.to_move != self.settings.player_color {
            return Err(MoveError::NotYourTurn);
        }
        self.play(text)
    }

    /// Play for the side to move.
    pub fn make_move(&mut self, vertex: Vertex) -> Result<(), MoveError> {
        self.apply(self.to_move, vertex)
    }

    /// End the game immediately (quit or resign).
    pub fn quit(&mut self) {
        info!(moves = self.committed(), "game ended by quit");
        self.terminal = true;
    }

    /// Apply a move for an explicit color. Nothing changes on failure.
    pub(crate) fn apply(&mut self, color: Color, vertex: Vertex) -> Result<(), MoveError> {
        if self.terminal {
            return Err(MoveError::GameOver);
        }
        match vertex {
            Vertex::Pass => self.position.pass(),
            Vertex::Play(pt) => {
                if self.position.board.get(pt) == Some(color) {
                    return Err(MoveError::OwnStone);
                }
                if self.position.is_ko(pt, color) {
                    return Err(MoveError::Ko);
                }
                let before = self.position.board.clone();
                let placement = self.position.apply_move(pt, color)?;
                if !placement.captured.is_empty() {
                    debug!(%pt, captured = placement.captured.len(), "stones captured");
                }
                if self.board_history.len() == BOARD_HISTORY_LEN {
                    self.board_history.pop_front();
                }
                self.board_history.push_back(before);
            }
        }

        let mv = Move::new(color, vertex);
        self.commit(mv);
        self.to_move = color.opponent();

        // Only a linear game ends on two passes; a branched record is open.
        let double_pass = self.history == History::Linear
            && matches!(
                self.moves(),
                [.., a, b] if a.is_pass() && b.is_pass() && a.color != b.color
            );
        if double_pass {
            info!(moves = self.committed(), "both sides passed; game over");
            self.terminal = true;
        }

        if !self.replaying {
            self.after_move(mv);
        }
        Ok(())
    }

    /// Apply a move without the engine refresh or observer report.
    pub(crate) fn apply_quiet(&mut self, color: Color, vertex: Vertex) -> Result<(), MoveError> {
        self.replaying = true;
        let result = self.apply(color, vertex);
        self.replaying = false;
        result
    }

    /// Append to the record, first dropping any branch tail.
    fn commit(&mut self, mv: Move) {
        if let History::Branched { cursor } = self.history {
            if cursor < self.moves.len() {
                debug!(at = cursor, dropped = self.moves.len() - cursor, "overwriting branch");
                self.moves.truncate(cursor);
                self.winrates.retain(|s| s.move_number <= cursor);
            }
        }
        self.moves.push(mv);
        if let History::Branched { cursor } = &mut self.history {
            *cursor = self.moves.len();
        }
    }

    /// Take back the last move.
    ///
    /// The stone is lifted and the turn returns to its owner, but stones it
    /// captured are not put back; [`Game::goto_move`] replays exactly.
    /// The ko point is cleared too, so a ban that held before the undone
    /// move is only restored by a replay.
    pub fn undo_last_move(&mut self) -> bool {
        let committed = self.committed();
        if committed == 0 {
            return false;
        }
        self.moves.truncate(committed);
        let Some(last) = self.moves.pop() else {
            return false;
        };
        if let History::Branched { cursor } = &mut self.history {
            *cursor = self.moves.len();
        }

        if let Vertex::Play(pt) = last.vertex {
            self.position.board.set(pt, None);
            self.board_history.pop_back();
        }
        self.position.ko = None;
        self.to_move = last.color;
        self.terminal = false;
        let remaining = self.moves.len();
        self.winrates.retain(|s| s.move_number <= remaining);
        debug!(mv = %last, remaining, "undid move");
        true
    }

    /// Rebuild the board from empty by replaying the first `index` moves.
    ///
    /// A linear history is truncated to `index`; a branched one keeps its
    /// tail until the next move overwrites it.
    pub fn goto_move(&mut self, index: usize) -> bool {
        if index > self.moves.len() {
            return false;
        }
        let recorded = std::mem::take(&mut self.moves);

        self.position = Position::new();
        self.to_move = Color::Black;
        self.terminal = false;
        self.board_history.clear();
        if let History::Branched { cursor } = &mut self.history {
            *cursor = 0;
        }

        self.replaying = true;
        let mut replayed = 0;
        for mv in &recorded[..index] {
            if let Err(e) = self.apply(mv.color, mv.vertex) {
                warn!(mv = %mv, error = %e, "replay stopped at illegal move");
                break;
            }
            replayed += 1;
        }
        self.replaying = false;

        if let History::Branched { cursor } = &mut self.history {
            self.moves = recorded;
            *cursor = replayed;
        }
        self.winrates.retain(|s| s.move_number <= replayed);
        debug!(index, replayed, "jumped to move");
        replayed == index
    }

    /// Clear the board and record, keeping settings.
    pub fn reset(&mut self) {
        self.position = Position::new();
        self.moves.clear();
        if let History::Branched { cursor } = &mut self.history {
            *cursor = 0;
        }
        self.to_move = Color::Black;
        self.terminal = false;
        self.board_history.clear();
        self.winrates.clear();
    }

    pub(crate) fn set_to_move(&mut self, color: Color) {
        self.to_move = color;
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    pub fn change_player_color(&mut self, color: &str) -> bool {
        match color.parse::<Color>() {
            Ok(c) => {
                self.settings.player_color = c;
                true
            }
            Err(_) => false,
        }
    }

    pub fn change_komi(&mut self, komi: f64) -> bool {
        if !komi.is_finite() {
            return false;
        }
        self.settings.komi = komi;
        true
    }

    pub fn change_rules(&mut self, rules: &str) -> bool {
        match rules.parse::<Rules>() {
            Ok(r) => {
                self.settings.rules = r;
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn set_rules(&mut self, rules: Rules) {
        self.settings.rules = rules;
    }

    /// Set the opponent's thinking budget; must be positive.
    pub fn change_ai_strength(&mut self, time_limit: f64) -> bool {
        if !time_limit.is_finite() || time_limit <= 0.0 {
            return false;
        }
        self.settings.ai_time_limit = time_limit;
        true
    }

    /// Set the realtime suggestion strength (1..=10).
    pub fn change_suggestion_strength(&mut self, strength: u32) -> bool {
        if !(1..=10).contains(&strength) {
            return false;
        }
        self.settings.suggestion_strength = strength;
        true
    }

    // -------------------------------------------------------------------------
    // Engine
    // -------------------------------------------------------------------------

    /// Fresh id for a synchronous query. A late reply to an abandoned query
    /// never matches a newer one.
    fn request_id(&mut self) -> String {
        self.requests += 1;
        format!("move_{}_{}", self.committed(), self.requests)
    }

    fn request(&self, id: String, visits: u32) -> AnalysisRequest {
        AnalysisRequest::new(id, self.settings.komi, self.moves(), visits)
    }

    /// Whether the engine has been started and is still alive.
    pub fn engine_running(&mut self) -> bool {
        self.engine.is_running()
    }

    /// Analyze the current position, starting the engine if needed.
    pub fn analyze(&mut self, visits: u32) -> Result<AnalysisResponse, EngineError> {
        let id = self.request_id();
        let req = self.request(id, visits);
        self.engine.get()?.analyze(&req)
    }

    /// The engine's choice for the side to move, or pass if it has none.
    pub fn engine_move(&mut self) -> Result<Vertex, EngineError> {
        let resp = self.analyze(self.settings.ai_visits())?;
        for (i, c) in resp.top(3).iter().enumerate() {
            debug!(
                rank = i + 1,
                mv = %c.mv,
                winrate = c.winrate,
                score_lead = c.score_lead,
                "engine candidate"
            );
        }
        let vertex = match resp.best() {
            Some(best) => Vertex::parse(&best.mv).unwrap_or_else(|| {
                warn!(mv = %best.mv, "unparseable engine move; passing");
                Vertex::Pass
            }),
            None => Vertex::Pass,
        };
        Ok(vertex)
    }

    /// Ask the engine for a move and play it for the side to move.
    pub fn engine_reply(&mut self) -> Result<Vertex, ReplyError> {
        let vertex = self.engine_move()?;
        self.make_move(vertex)
            .map_err(|source| ReplyError::Rejected { vertex, source })?;
        Ok(vertex)
    }

    /// One-shot ranked candidates for the side to move.
    pub fn suggestions(&mut self, n: usize) -> Result<Vec<Candidate>, EngineError> {
        Ok(self.analyze(ANALYSIS_VISITS)?.top(n).to_vec())
    }

    /// Stream ranked candidates to `callback` until the search finishes or
    /// [`Game::stop_realtime_suggestions`] is called.
    pub fn start_realtime_suggestions<F>(&mut self, callback: F) -> Result<(), EngineError>
    where
        F: FnMut(Vec<Candidate>) + Send + 'static,
    {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let id = format!("realtime_{}_{}_{:08x}", self.committed(), secs, fastrand::u32(..));
        let req = self
            .request(id, self.settings.suggestion_visits())
            .streaming(REPORT_DURING_SEARCH_EVERY);
        self.engine
            .get()?
            .start_realtime_analysis(&req, REALTIME_TOP_N, callback)
    }

    pub fn stop_realtime_suggestions(&mut self) {
        if let Some(bridge) = self.engine.running() {
            bridge.stop_realtime_analysis();
        }
    }

    pub fn realtime_active(&mut self) -> bool {
        self.engine.running().is_some_and(|b| b.realtime_active())
    }

    /// Record the win rate of the current position, falling back to an even
    /// estimate when the engine is unavailable.
    pub fn record_initial_winrate(&mut self) -> WinrateSample {
        let move_number = self.committed();
        let sample = match self.analyze(WINRATE_VISITS) {
            Ok(resp) => self.sample(&resp, move_number),
            Err(e) => {
                warn!(error = %e, "initial win rate unavailable");
                None
            }
        }
        .unwrap_or(WinrateSample {
            move_number,
            black_winrate: 50.0,
            white_winrate: 50.0,
            score_lead: 0.0,
        });
        self.winrates.push(sample);
        sample
    }

    /// Convert a side-to-move evaluation into Black/White percentages.
    fn sample(&self, resp: &AnalysisResponse, move_number: usize) -> Option<WinrateSample> {
        let (winrate, score_lead) = resp.evaluation()?;
        let black = match self.to_move {
            Color::Black => winrate * 100.0,
            Color::White => (1.0 - winrate) * 100.0,
        };
        let black = round1(black);
        Some(WinrateSample {
            move_number,
            black_winrate: black,
            white_winrate: round1(100.0 - black),
            score_lead: round1(score_lead),
        })
    }

    /// Refresh the win rate if the engine is running, then notify the observer.
    fn after_move(&mut self, mv: Move) {
        let move_number = self.committed();
        let id = self.request_id();
        let req = self.request(id, WINRATE_VISITS);
        let result = self.engine.running().map(|bridge| bridge.analyze(&req));

        let mut report = MoveReport {
            move_number,
            mv,
            board: self.position.board.clone(),
            winrate: None,
            candidates: Vec::new(),
            ownership: None,
        };
        match result {
            Some(Ok(resp)) => {
                if let Some(sample) = self.sample(&resp, move_number) {
                    self.winrates.push(sample);
                    report.winrate = Some(sample);
                }
                report.candidates = resp.top(DEFAULT_SUGGESTIONS).to_vec();
                report.ownership = resp.ownership.and_then(|v| Ownership::new(v).ok());
            }
            Some(Err(e)) => warn!(error = %e, move_number, "win-rate refresh failed"),
            None => {}
        }
        self.observer.on_move(&report);
    }

    /// Score a finished game from the engine's ownership map.
    pub fn territory_score(&mut self) -> Result<TerritoryScore, ScoreError> {
        if !self.terminal {
            return Err(ScoreError::NotFinished);
        }
        let resp = self.analyze(SCORING_VISITS)?;
        let lead = resp.best().map(|c| c.score_lead).unwrap_or_default();
        let ownership = Ownership::new(resp.ownership.ok_or(ScoreError::NoOwnership)?)?;
        Ok(TerritoryScore::compute(
            &ownership,
            self.position.captures,
            self.settings.komi,
            lead,
        ))
    }

    /// The current ownership estimate, finished or not.
    pub fn territory_preview(&mut self) -> Result<Ownership, ScoreError> {
        let resp = self.analyze(ANALYSIS_VISITS)?;
        Ok(Ownership::new(resp.ownership.ok_or(ScoreError::NoOwnership)?)?)
    }

    /// Stop streaming and tear the engine down.
    pub fn shutdown(&mut self) {
        self.engine.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn offline() -> EngineConfig {
        EngineConfig {
            binary: PathBuf::from("/nonexistent/katago"),
            ..EngineConfig::default()
        }
    }

    fn game() -> Game {
        Game::new(GameSettings::default(), offline())
    }

    fn pt(s: &str) -> Point {
        Point::parse(s).unwrap()
    }

    #[test]
    fn test_parse_move() {
        assert_eq!(parse_move(" d4 "), Some(ParsedMove::Play(pt("D4"))));
        assert_eq!(parse_move("Pass"), Some(ParsedMove::Pass));
        assert_eq!(parse_move("p"), Some(ParsedMove::Pass));
        assert_eq!(parse_move("Q"), Some(ParsedMove::Quit));
        assert_eq!(parse_move("resign"), Some(ParsedMove::Quit));
        assert_eq!(parse_move("Z1"), None);
        assert_eq!(parse_move("D25"), None);
        assert_eq!(parse_move(""), None);
    }

    #[test]
    fn test_first_move() {
        let mut g = game();
        assert_eq!(g.status(), GameStatus::NoMoves);
        g.play("D4").unwrap();
        assert_eq!(g.board().get(Point { row: 3, col: 3 }), Some(Color::Black));
        assert_eq!(g.captures(), Captures::default());
        assert_eq!(g.to_move(), Color::White);
        assert_eq!(g.status(), GameStatus::InProgress);
        assert_eq!(g.board_history().len(), 1);
    }

    #[test]
    fn test_failed_move_changes_nothing() {
        let mut g = game();
        g.play("D4").unwrap();
        g.play("pass").unwrap();
        assert_eq!(g.play("D4"), Err(MoveError::OwnStone));
        assert_eq!(g.play("nonsense"), Err(MoveError::Invalid));
        assert_eq!(g.moves().len(), 2);
        assert_eq!(g.to_move(), Color::Black);
    }

    #[test]
    fn test_two_passes_end_the_game() {
        let mut g = game();
        g.play("pass").unwrap();
        assert!(!g.is_terminal());
        g.play("pass").unwrap();
        assert!(g.is_terminal());
        assert_eq!(g.status(), GameStatus::Terminal);
        assert_eq!(g.play("D4"), Err(MoveError::GameOver));
    }

    #[test]
    fn test_quit_is_immediate() {
        let mut g = game();
        g.play("quit").unwrap();
        assert!(g.is_terminal());
        assert!(g.moves().is_empty());
    }

    #[test]
    fn test_human_turn_enforced() {
        let mut g = game();
        g.human_move("D4").unwrap();
        assert_eq!(g.human_move("Q16"), Err(MoveError::NotYourTurn));
        assert!(g.change_player_color("W"));
        g.human_move("Q16").unwrap();
    }

    #[test]
    fn test_undo_restores_turn_not_captures() {
        let mut g = game();
        for mv in ["D4", "D5", "A1", "C4", "A2", "E4", "A3", "D3"] {
            g.play(mv).unwrap();
        }
        assert_eq!(g.board().get(pt("D4")), None);
        assert_eq!(g.captures().black, 1);

        assert!(g.undo_last_move());
        assert_eq!(g.board().get(pt("D3")), None);
        assert_eq!(g.board().get(pt("D4")), None);
        assert_eq!(g.to_move(), Color::White);
        assert_eq!(g.moves().len(), 7);
    }

    #[test]
    fn test_undo_on_empty_game() {
        let mut g = game();
        assert!(!g.undo_last_move());
    }

    #[test]
    fn test_goto_move_replays_exactly() {
        let mut g = game();
        for mv in ["D4", "D5", "A1", "C4", "A2", "E4", "A3", "D3"] {
            g.play(mv).unwrap();
        }
        assert!(g.goto_move(7));
        assert_eq!(g.board().get(pt("D4")), Some(Color::Black));
        assert_eq!(g.captures().black, 0);
        assert_eq!(g.moves().len(), 7);
        assert_eq!(g.to_move(), Color::White);

        let snapshot = g.position().clone();
        assert!(g.goto_move(7));
        assert_eq!(g.position(), &snapshot);
        assert!(!g.goto_move(8));
    }

    #[test]
    fn test_branched_goto_keeps_tail_until_overwritten() {
        let mut g = Game::branched(GameSettings::default(), offline());
        for mv in ["D4", "Q16", "D16", "Q4"] {
            g.play(mv).unwrap();
        }
        assert!(g.goto_move(2));
        assert_eq!(g.moves().len(), 2);
        assert_eq!(g.recorded_moves().len(), 4);
        assert_eq!(g.board().get(pt("D16")), None);

        // Forward again along the recorded line.
        assert!(g.goto_move(4));
        assert_eq!(g.board().get(pt("Q4")), Some(Color::White));

        assert!(g.goto_move(2));
        g.play("K10").unwrap();
        assert_eq!(g.recorded_moves().len(), 3);
        assert_eq!(g.history(), History::Branched { cursor: 3 });
    }

    #[test]
    fn test_linear_goto_truncates() {
        let mut g = game();
        for mv in ["D4", "Q16", "D16", "Q4"] {
            g.play(mv).unwrap();
        }
        assert!(g.goto_move(1));
        assert_eq!(g.recorded_moves().len(), 1);
    }

    #[test]
    fn test_board_history_is_bounded() {
        let mut g = game();
        for col in ["A", "B", "C", "D", "E", "F"] {
            g.play(&format!("{col}1")).unwrap();
            g.play(&format!("{col}19")).unwrap();
        }
        assert_eq!(g.board_history().len(), BOARD_HISTORY_LEN);
        assert_eq!(g.board_history().back().map(|b| b.count(Color::Black)), Some(6));
    }

    #[test]
    fn test_settings_validation() {
        let mut g = game();
        assert!(g.change_komi(7.5));
        assert!(!g.change_komi(f64::NAN));
        assert!(g.change_rules("japanese"));
        assert!(!g.change_rules("ing"));
        assert!(g.change_ai_strength(5.0));
        assert!(!g.change_ai_strength(0.0));
        assert!(g.change_suggestion_strength(3));
        assert!(!g.change_suggestion_strength(11));
        assert!(!g.change_player_color("red"));

        let s = g.settings();
        assert_eq!(s.komi, 7.5);
        assert_eq!(s.rules, Rules::Japanese);
        assert_eq!(s.ai_visits(), 500);
        assert_eq!(s.suggestion_visits(), 300);
    }

    #[test]
    fn test_engine_failures_do_not_block_play() {
        let mut g = game();
        assert!(matches!(g.engine_move(), Err(EngineError::ResourceMissing { .. })));
        assert!(matches!(g.suggestions(5), Err(EngineError::ResourceMissing { .. })));
        let sample = g.record_initial_winrate();
        assert_eq!(sample.black_winrate, 50.0);
        g.play("D4").unwrap();
        assert!(!g.engine_running());
    }

    #[test]
    fn test_scoring_requires_finished_game() {
        let mut g = game();
        assert!(matches!(g.territory_score(), Err(ScoreError::NotFinished)));
    }
}
