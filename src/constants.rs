//! Constants for board geometry, engine budgets and bridge timing.
//!
//! The board is always 19x19: the analysis engine is driven with full-size
//! games only, and imported games of other sizes are rejected.

use std::time::Duration;

// =============================================================================
// Board Geometry
// =============================================================================

/// Board size (NxN).
pub const N: usize = 19;

/// Total number of points on the board.
pub const BOARD_POINTS: usize = N * N;

/// Column letters in display order. `I` is skipped to avoid confusion with `J`.
pub const COLUMN_LETTERS: &[u8; N] = b"ABCDEFGHJKLMNOPQRST";

/// Number of pre-move boards kept in the session's history ring.
pub const BOARD_HISTORY_LEN: usize = 10;

// =============================================================================
// Game Defaults
// =============================================================================

/// Default komi (compensation points for White).
pub const DEFAULT_KOMI: f64 = 6.5;

/// Default thinking budget of the opponent engine, in "seconds".
pub const DEFAULT_AI_TIME_LIMIT: f64 = 3.0;

/// Default strength of the suggestion analysis (1..=10).
pub const DEFAULT_SUGGESTION_STRENGTH: u32 = 10;

/// Visits granted per unit of time limit or suggestion strength.
pub const VISITS_PER_UNIT: f64 = 100.0;

// =============================================================================
// Analysis Budgets
// =============================================================================

/// Ruleset literal sent with every analysis request.
///
/// The session keeps its own configurable ruleset; requests still carry this
/// fixed value.
pub const ENGINE_RULES: &str = "Chinese";

/// Visits used for the win-rate refresh after each move.
pub const WINRATE_VISITS: u32 = 50;

/// Visits used for one-shot suggestions and analysis-only requests.
pub const ANALYSIS_VISITS: u32 = 200;

/// Visits used when scoring a finished game from ownership.
pub const SCORING_VISITS: u32 = 500;

/// Number of ranked candidates returned by a one-shot suggestion.
pub const DEFAULT_SUGGESTIONS: usize = 5;

/// Number of ranked candidates forwarded by the realtime stream.
pub const REALTIME_TOP_N: usize = 7;

/// Progress report interval requested for realtime analysis, in seconds.
pub const REPORT_DURING_SEARCH_EVERY: f64 = 0.5;

/// Ownership magnitude above which a point counts as settled territory.
pub const OWNERSHIP_THRESHOLD: f64 = 0.7;

// =============================================================================
// Bridge Timing
// =============================================================================

/// Wall-clock budget for a single `analyze()` call.
pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(20);

/// How long consumers block on the response channel before re-checking state.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long the engine gets to fail before it is considered started.
pub const STARTUP_GRACE: Duration = Duration::from_secs(2);

/// Bounded join when cancelling a realtime stream.
pub const STREAM_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How long teardown waits for the engine to exit after stdin is closed.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of recent stderr lines kept for diagnostics.
pub const STDERR_TAIL_LINES: usize = 20;
