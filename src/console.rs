//! Line-oriented text front end.
//!
//! Each input line is a command with whitespace-separated arguments, or a bare
//! move such as `D4`, `pass` or `quit`. Replies use the GTP framing:
//! `= <message>` on success and `? <message>` on failure.
//!
//! ## Commands
//!
//! - `play <move>` - Play a move (a bare move works too)
//! - `undo [n]` - Take back `n` moves
//! - `goto <n>` - Jump to the position after `n` moves
//! - `board` - Show the board
//! - `moves` - List the moves on the board
//! - `suggest [n]` - Rank candidate moves for the side to move
//! - `winrate` - Show the latest win-rate sample
//! - `score` - Count a finished game
//! - `ownership` - Show the current ownership estimate
//! - `komi <v>`, `rules <r>`, `color <c>`, `strength <secs>`, `suggestion_strength <1-10>`
//! - `reset` - Start over with the same settings
//! - `switch`, `analyze`, `import <file>` - Exploration only
//! - `help`, `quit`

use std::fmt::Write as _;
use std::fs;
use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

use crate::analysis::Candidate;
use crate::board::{Color, Vertex};
use crate::constants::DEFAULT_SUGGESTIONS;
use crate::exploration::{Exploration, parse_record};
use crate::game::{Game, ParsedMove, parse_move};

const KNOWN_COMMANDS: &[&str] = &[
    "analyze",
    "board",
    "color",
    "goto",
    "help",
    "import",
    "komi",
    "moves",
    "ownership",
    "play",
    "quit",
    "reset",
    "rules",
    "score",
    "strength",
    "suggest",
    "suggestion_strength",
    "switch",
    "undo",
    "winrate",
];

/// What the console is driving.
pub enum Session {
    /// A game against the engine, which answers every human move.
    Play(Game),
    Explore(Exploration),
}

pub struct Console {
    session: Session,
}

impl Console {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn game(&self) -> &Game {
        match &self.session {
            Session::Play(game) => game,
            Session::Explore(ex) => ex.game(),
        }
    }

    fn game_mut(&mut self) -> &mut Game {
        match &mut self.session {
            Session::Play(game) => game,
            Session::Explore(ex) => ex.game_mut(),
        }
    }

    /// Read commands until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        if let Some(opening) = self.engine_opening() {
            writeln!(output, "= {opening}\n")?;
        }
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            let command = parts[0].to_lowercase();
            let args = &parts[1..];

            let quitting = parse_move(&command) == Some(ParsedMove::Quit)
                || (command == "play"
                    && args.first().and_then(|a| parse_move(a)) == Some(ParsedMove::Quit));

            let (success, message) = self.execute(&command, args);
            let prefix = if success { '=' } else { '?' };
            writeln!(output, "{prefix} {message}\n")?;
            output.flush()?;

            if quitting {
                break;
            }
        }
        self.game_mut().shutdown();
        Ok(())
    }

    /// In a game where the human holds White, the engine opens.
    fn engine_opening(&mut self) -> Option<String> {
        let Session::Play(game) = &mut self.session else {
            return None;
        };
        if game.moves().is_empty() && game.to_move() != game.settings().player_color {
            return Some(engine_turn(game));
        }
        None
    }

    /// Execute one command and return (success, response).
    pub fn execute(&mut self, command: &str, args: &[&str]) -> (bool, String) {
        debug!(command, ?args, "console command");
        match command {
            "help" => (true, KNOWN_COMMANDS.join(" ")),

            "play" => match args.first() {
                Some(mv) => self.play(mv),
                None => (false, "missing argument".to_string()),
            },

            "undo" => {
                let n = match args.first().map(|a| a.parse::<usize>()) {
                    None => 1,
                    Some(Ok(n)) => n,
                    Some(Err(_)) => return (false, "invalid count".to_string()),
                };
                let game = self.game_mut();
                let undone = (0..n).take_while(|_| game.undo_last_move()).count();
                (undone > 0, format!("undid {undone} move(s)\n{}", game.board()))
            }

            "goto" => {
                let Some(Ok(n)) = args.first().map(|a| a.parse::<usize>()) else {
                    return (false, "usage: goto <move number>".to_string());
                };
                let game = self.game_mut();
                if game.goto_move(n) {
                    (true, format!("at move {n}\n{}", game.board()))
                } else {
                    (false, format!("no move {n} in the record"))
                }
            }

            "board" => (true, self.describe()),

            "moves" => {
                let moves = self
                    .game()
                    .moves()
                    .iter()
                    .enumerate()
                    .map(|(i, m)| format!("{}. {m}", i + 1))
                    .collect::<Vec<_>>();
                (true, moves.join("\n"))
            }

            "suggest" => {
                let n = args
                    .first()
                    .and_then(|a| a.parse().ok())
                    .unwrap_or(DEFAULT_SUGGESTIONS);
                let result = match &mut self.session {
                    Session::Explore(ex) => ex.suggest(n),
                    Session::Play(game) => game.suggestions(n),
                };
                match result {
                    Ok(candidates) => (true, format_candidates(&candidates)),
                    Err(e) => (false, format!("analysis unavailable: {e}")),
                }
            }

            "winrate" => match self.game().winrate_history().last() {
                Some(s) => (
                    true,
                    format!(
                        "move {}: black {:.1}% white {:.1}% lead {:+.1}",
                        s.move_number, s.black_winrate, s.white_winrate, s.score_lead
                    ),
                ),
                None => (false, "no win-rate samples yet".to_string()),
            },

            "score" => match self.game_mut().territory_score() {
                Ok(score) => {
                    let mut out = String::new();
                    for row in &score.territory_map {
                        let line: String = row.iter().map(|t| t.to_string()).collect();
                        let _ = writeln!(out, "{line}");
                    }
                    let _ = write!(
                        out,
                        "black {} (territory {} + prisoners {})\nwhite {} (territory {} + prisoners {} + komi {})\n{} wins by {}",
                        score.black_score,
                        score.black_territory,
                        score.black_prisoners,
                        score.white_score,
                        score.white_territory,
                        score.white_prisoners,
                        score.komi,
                        score.winner,
                        score.difference
                    );
                    (true, out)
                }
                Err(e) => (false, e.to_string()),
            },

            "ownership" => match self.game_mut().territory_preview() {
                Ok(own) => {
                    let rows = own
                        .grid()
                        .iter()
                        .map(|row| {
                            row.iter()
                                .map(|v| format!("{v:+.1}"))
                                .collect::<Vec<_>>()
                                .join(" ")
                        })
                        .collect::<Vec<_>>();
                    (true, rows.join("\n"))
                }
                Err(e) => (false, e.to_string()),
            },

            "komi" => match args.first().and_then(|a| a.parse::<f64>().ok()) {
                Some(komi) if self.game_mut().change_komi(komi) => (true, format!("komi {komi}")),
                _ => (false, "invalid komi".to_string()),
            },

            "rules" => match args.first() {
                Some(r) if self.game_mut().change_rules(r) => (true, format!("rules {r}")),
                _ => (false, "rules must be chinese, japanese or korean".to_string()),
            },

            "color" => match args.first() {
                Some(c) if self.game_mut().change_player_color(c) => {
                    let color = self.game().settings().player_color;
                    (true, format!("you play {color}"))
                }
                _ => (false, "color must be B or W".to_string()),
            },

            "strength" => match args.first().and_then(|a| a.parse::<f64>().ok()) {
                Some(t) if self.game_mut().change_ai_strength(t) => {
                    (true, format!("engine uses {} visits", self.game().settings().ai_visits()))
                }
                _ => (false, "strength must be a positive number".to_string()),
            },

            "suggestion_strength" => match args.first().and_then(|a| a.parse::<u32>().ok()) {
                Some(s) if self.game_mut().change_suggestion_strength(s) => {
                    (true, format!("suggestion strength {s}"))
                }
                _ => (false, "suggestion strength must be 1 to 10".to_string()),
            },

            "reset" => {
                let game = self.game_mut();
                game.reset();
                (true, game.board().to_string())
            }

            "switch" => match &mut self.session {
                Session::Explore(ex) => {
                    let next = ex.game().to_move().opponent();
                    ex.switch_player(next);
                    (true, format!("{next} to move"))
                }
                Session::Play(_) => (false, "switch is only available when exploring".to_string()),
            },

            "analyze" => match &mut self.session {
                Session::Explore(ex) => match ex.analysis_only() {
                    Ok(resp) => {
                        let mut out = format_candidates(resp.top(DEFAULT_SUGGESTIONS));
                        if let Some((winrate, lead)) = resp.evaluation() {
                            let _ = write!(out, "\nside to move: {:.1}% lead {lead:+.1}", winrate * 100.0);
                        }
                        (true, out)
                    }
                    Err(e) => (false, format!("analysis unavailable: {e}")),
                },
                Session::Play(_) => (false, "analyze is only available when exploring".to_string()),
            },

            "import" => match &mut self.session {
                Session::Explore(ex) => {
                    let Some(path) = args.first() else {
                        return (false, "usage: import <file>".to_string());
                    };
                    let text = match fs::read_to_string(path) {
                        Ok(text) => text,
                        Err(e) => return (false, format!("cannot read {path}: {e}")),
                    };
                    let result = parse_record(&text)
                        .and_then(|(header, moves)| ex.import(&header, &moves, |_, _, _| {}));
                    match result {
                        Ok(summary) => (
                            true,
                            format!(
                                "imported {} move(s), skipped {}\n{}",
                                summary.applied,
                                summary.skipped,
                                ex.game().board()
                            ),
                        ),
                        Err(e) => (false, e.to_string()),
                    }
                }
                Session::Play(_) => (false, "import is only available when exploring".to_string()),
            },

            _ => match parse_move(command) {
                Some(_) => self.play(command),
                None => (false, format!("unknown command: {command}")),
            },
        }
    }

    fn play(&mut self, text: &str) -> (bool, String) {
        let quitting = parse_move(text) == Some(ParsedMove::Quit);
        match &mut self.session {
            Session::Explore(ex) => match ex.play(text) {
                Ok(()) if quitting => (true, "bye".to_string()),
                Ok(()) => (true, self.describe()),
                Err(e) => (false, e.to_string()),
            },
            Session::Play(game) => {
                if let Err(e) = game.human_move(text) {
                    return (false, e.to_string());
                }
                if quitting {
                    return (true, "you resigned".to_string());
                }
                let mut reply = String::new();
                if !game.is_terminal() {
                    reply = engine_turn(game);
                }
                (true, format!("{reply}\n{}", self.describe()))
            }
        }
    }

    fn describe(&self) -> String {
        let game = self.game();
        let captures = game.captures();
        let status = if game.is_terminal() {
            "game over".to_string()
        } else {
            format!("{} to move", game.to_move())
        };
        format!(
            "{}move {} | {status} | prisoners B {} W {}",
            game.board(),
            game.moves().len(),
            captures.taken_by(Color::Black),
            captures.taken_by(Color::White),
        )
    }
}

/// Let the engine move; if it cannot, it passes so play can go on.
fn engine_turn(game: &mut Game) -> String {
    match game.engine_reply() {
        Ok(vertex) => format!("engine plays {vertex}"),
        Err(e) => {
            warn!(error = %e, "engine move failed; engine passes");
            match game.make_move(Vertex::Pass) {
                Ok(()) => format!("engine unavailable ({e}); engine passes"),
                Err(pass_err) => format!("engine unavailable ({e}): {pass_err}"),
            }
        }
    }
}

fn format_candidates(candidates: &[Candidate]) -> String {
    if candidates.is_empty() {
        return "no candidates".to_string();
    }
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "{}. {} winrate {:.1}% lead {:+.1} visits {}",
                i + 1,
                c.mv,
                c.winrate * 100.0,
                c.score_lead,
                c.visits
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
