//! Engine bridge tests against scripted stand-in engines.
//!
//! Each stand-in is a `/bin/sh` script that reads request lines and prints
//! canned response lines with the request's id.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use weiqi::analysis::{AnalysisRequest, Candidate};
use weiqi::board::Color;
use weiqi::bridge::{AnalysisBridge, EngineError};
use weiqi::config::{EngineConfig, GameSettings};
use weiqi::game::{Game, ScoreError};
use weiqi::telemetry::MemoryObserver;

// =============================================================================
// Stand-in engines
// =============================================================================

/// Pulls the id out of a request line.
const READ_ID: &str = r#"id=$(printf '%s\n' "$line" | sed 's/.*"id":"\([^"]*\)".*/\1/')"#;

/// One progress line, then a final line with root info and ownership
/// (top ten rows Black, the rest White).
const ANSWERING: &str = r#"
own=$(awk 'BEGIN { for (i = 0; i < 361; i++) printf "%s%s", (i ? "," : ""), (i < 190 ? "0.9" : "-0.9") }')
while IFS= read -r line; do
  READ_ID
  printf '{"id":"%s","isDuringSearch":true,"moveInfos":[{"move":"C3","winrate":0.4,"scoreLead":-1.0,"visits":5}]}\n' "$id"
  printf '{"id":"%s","isDuringSearch":false,"moveInfos":[{"move":"Q16","winrate":0.55,"scoreLead":0.8,"visits":50},{"move":"D4","winrate":0.5,"scoreLead":0.1,"visits":20}],"rootInfo":{"winrate":0.55,"scoreMean":0.7,"scoreLead":0.8},"ownership":[%s]}\n' "$id" "$own"
done
"#;

/// Scripts are written and spawned one test at a time: a script still open
/// for writing in one thread cannot be executed by a child forked in another.
static SPAWN_LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SPAWN_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

struct MockEngine {
    _dir: TempDir,
    config: EngineConfig,
}

fn mock_engine(body: &str) -> MockEngine {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("katago");
    fs::write(&script, format!("#!/bin/sh\n{}", body.replace("READ_ID", READ_ID))).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    let model = dir.path().join("model.bin.gz");
    let config = dir.path().join("analysis.cfg");
    fs::write(&model, b"").unwrap();
    fs::write(&config, b"").unwrap();

    MockEngine {
        config: EngineConfig {
            binary: script,
            model,
            config,
            startup_grace: Duration::from_millis(200),
            request_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
        },
        _dir: dir,
    }
}

fn request(id: &str) -> AnalysisRequest {
    AnalysisRequest::new(id, 6.5, &[], 10)
}

fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while !done() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
    true
}

// =============================================================================
// Synchronous analysis
// =============================================================================

#[test]
fn test_analyze_returns_final_message_only() {
    let _guard = serial();
    let engine = mock_engine(ANSWERING);
    let mut bridge = AnalysisBridge::start(engine.config.clone()).unwrap();

    let resp = bridge.analyze(&request("move_0")).unwrap();
    assert_eq!(resp.id, "move_0");
    assert!(resp.is_final());
    assert_eq!(resp.best().map(|c| c.mv.as_str()), Some("Q16"));
    assert_eq!(resp.evaluation(), Some((0.55, 0.8)));
    assert_eq!(resp.ownership.as_ref().map(Vec::len), Some(361));

    // The bridge stays usable for the next request.
    let again = bridge.analyze(&request("move_1")).unwrap();
    assert_eq!(again.id, "move_1");
    bridge.shutdown();
}

#[test]
fn test_stale_and_malformed_lines_are_ignored() {
    let _guard = serial();
    let engine = mock_engine(
        r#"
while IFS= read -r line; do
  READ_ID
  echo 'KataGo analysis engine starting...'
  printf '{"id":"stale","isDuringSearch":false,"moveInfos":[{"move":"A1","winrate":0.1,"scoreLead":-9.0,"visits":1}]}\n'
  printf '{"id":"%s","isDuringSearch":false,"moveInfos":[{"move":"K10","winrate":0.5,"scoreLead":0.0,"visits":1}]}\n' "$id"
done
"#,
    );
    let mut bridge = AnalysisBridge::start(engine.config.clone()).unwrap();
    let resp = bridge.analyze(&request("move_3")).unwrap();
    assert_eq!(resp.best().map(|c| c.mv.as_str()), Some("K10"));
}

#[test]
fn test_rejected_query_is_recoverable() {
    let _guard = serial();
    let engine = mock_engine(
        r#"
while IFS= read -r line; do
  READ_ID
  printf '{"id":"%s","error":"Illegal move 1: Z9"}\n' "$id"
done
"#,
    );
    let mut bridge = AnalysisBridge::start(engine.config.clone()).unwrap();
    match bridge.analyze(&request("bad")) {
        Err(e @ EngineError::Rejected { .. }) => {
            assert!(!e.is_fatal());
            assert!(e.to_string().contains("Z9"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(bridge.is_alive());
}

#[test]
fn test_silent_engine_times_out() {
    let _guard = serial();
    let mut engine = mock_engine("while IFS= read -r line; do :; done\n");
    engine.config.request_timeout = Duration::from_millis(300);
    let mut bridge = AnalysisBridge::start(engine.config.clone()).unwrap();

    let started = Instant::now();
    match bridge.analyze(&request("slow")) {
        Err(EngineError::AnalysisTimeout { id, .. }) => assert_eq!(id, "slow"),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(bridge.is_alive());
}

// =============================================================================
// Process failures
// =============================================================================

#[test]
fn test_start_failure_reports_diagnostics() {
    let _guard = serial();
    let engine = mock_engine("echo 'failed to load model' >&2\nexit 1\n");
    match AnalysisBridge::start(engine.config.clone()) {
        Err(EngineError::ProcessStartFailure { stderr, status }) => {
            assert!(stderr.contains("failed to load model"));
            assert!(!status.success());
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("engine should have failed to start"),
    }
}

#[test]
fn test_dead_process_fails_every_request() {
    let _guard = serial();
    let engine = mock_engine("read -r line\necho 'CUDA error: out of memory' >&2\nexit 3\n");
    let mut bridge = AnalysisBridge::start(engine.config.clone()).unwrap();

    let first = bridge.analyze(&request("move_0"));
    assert!(matches!(first, Err(EngineError::ProcessDied { .. })), "{first:?}");
    assert!(!bridge.is_alive());

    let started = Instant::now();
    let second = bridge.analyze(&request("move_1"));
    assert!(matches!(second, Err(EngineError::ProcessDied { .. })));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_missing_model_is_reported_before_spawn() {
    let _guard = serial();
    let mut engine = mock_engine(ANSWERING);
    engine.config.model = engine.config.model.with_file_name("missing.bin.gz");
    match AnalysisBridge::start(engine.config.clone()) {
        Err(EngineError::ResourceMissing { kind, .. }) => assert_eq!(kind, "model"),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("engine should not start"),
    }
}

// =============================================================================
// Streaming
// =============================================================================

#[test]
fn test_realtime_delivers_every_report_until_final() {
    let _guard = serial();
    let engine = mock_engine(
        r#"
while IFS= read -r line; do
  READ_ID
  for v in 10 20 30; do
    printf '{"id":"%s","isDuringSearch":true,"moveInfos":[{"move":"Q16","winrate":0.5,"scoreLead":0.0,"visits":%s},{"move":"D4","winrate":0.49,"scoreLead":-0.1,"visits":1},{"move":"C3","winrate":0.3,"scoreLead":-2.0,"visits":1}]}\n' "$id" "$v"
    sleep 0.05
  done
  printf '{"id":"%s","isDuringSearch":false,"moveInfos":[{"move":"Q16","winrate":0.5,"scoreLead":0.0,"visits":40}]}\n' "$id"
done
"#,
    );
    let mut bridge = AnalysisBridge::start(engine.config.clone()).unwrap();

    let batches: Arc<Mutex<Vec<Vec<Candidate>>>> = Arc::default();
    let sink = Arc::clone(&batches);
    let req = request("realtime_0_1").streaming(0.05);
    bridge
        .start_realtime_analysis(&req, 2, move |top| sink.lock().unwrap().push(top))
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || !bridge.realtime_active()));
    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 4);
    assert!(batches[..3].iter().all(|b| b.len() == 2));
    assert_eq!(batches[2][0].visits, 30);
    assert_eq!(batches[3].len(), 1);
}

#[test]
fn test_realtime_stops_on_cancel() {
    let _guard = serial();
    let engine = mock_engine(
        r#"
read -r line
READ_ID
i=0
while [ $i -lt 40 ]; do
  printf '{"id":"%s","isDuringSearch":true,"moveInfos":[{"move":"Q16","winrate":0.5,"scoreLead":0.0,"visits":%s}]}\n' "$id" "$i"
  sleep 0.05
  i=$((i + 1))
done
"#,
    );
    let mut bridge = AnalysisBridge::start(engine.config.clone()).unwrap();

    let count = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&count);
    bridge
        .start_realtime_analysis(&request("realtime_0_2").streaming(0.05), 5, move |_| {
            *sink.lock().unwrap() += 1;
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || *count.lock().unwrap() >= 2));
    bridge.stop_realtime_analysis();
    assert!(!bridge.realtime_active());

    let stopped_at = *count.lock().unwrap();
    thread::sleep(Duration::from_millis(250));
    assert_eq!(*count.lock().unwrap(), stopped_at);
}

// =============================================================================
// Game with an engine
// =============================================================================

#[test]
fn test_game_reply_winrate_and_score() {
    let _guard = serial();
    let engine = mock_engine(ANSWERING);
    let observer = MemoryObserver::new();
    let mut game = Game::new(GameSettings::default(), engine.config.clone());
    game.set_observer(Box::new(observer.clone()));

    game.human_move("D4").unwrap();
    assert!(game.winrate_history().is_empty());

    let reply = game.engine_reply().unwrap();
    assert_eq!(reply.to_string(), "Q16");
    assert_eq!(game.to_move(), Color::Black);

    game.human_move("D16").unwrap();
    let samples = game.winrate_history();
    assert_eq!(samples.len(), 2);
    // Black to move after Q16: the engine's 55% is Black's.
    assert_eq!(samples[0].move_number, 2);
    assert_eq!(samples[0].black_winrate, 55.0);
    // White to move after D16: Black has the other 45%.
    assert_eq!(samples[1].black_winrate, 45.0);
    assert_eq!(samples[1].white_winrate, 55.0);

    let suggestions = game.suggestions(1).unwrap();
    assert_eq!(suggestions.len(), 1);

    assert!(matches!(game.territory_score(), Err(ScoreError::NotFinished)));
    game.play("pass").unwrap();
    game.play("pass").unwrap();
    let score = game.territory_score().unwrap();
    assert_eq!(score.black_territory, 190);
    assert_eq!(score.white_territory, 171);
    assert_eq!(score.white_score, 177.5);
    assert_eq!(score.winner, Color::Black);
    assert_eq!(score.difference, 12.5);

    let reports = observer.reports();
    assert_eq!(reports.len(), 5);
    assert!(reports[0].winrate.is_none());
    assert!(reports[2].ownership.is_some());
    assert_eq!(reports[2].candidates.len(), 2);

    game.shutdown();
    assert!(!game.engine_running());
}

/// Answers the first query a second late with a lopsided evaluation, then
/// every later query at once.
const LATE_FIRST: &str = r#"
n=0
while IFS= read -r line; do
  READ_ID
  n=$((n + 1))
  if [ "$n" -eq 1 ]; then
    sleep 1
    printf '{"id":"%s","isDuringSearch":false,"moveInfos":[{"move":"Q16","winrate":0.1,"scoreLead":-30.0,"visits":50}],"rootInfo":{"winrate":0.1,"scoreMean":-30.0,"scoreLead":-30.0}}\n' "$id"
  else
    printf '{"id":"%s","isDuringSearch":false,"moveInfos":[{"move":"D4","winrate":0.55,"scoreLead":0.8,"visits":50}],"rootInfo":{"winrate":0.55,"scoreMean":0.7,"scoreLead":0.8}}\n' "$id"
  fi
done
"#;

#[test]
fn test_late_reply_does_not_answer_a_new_position() {
    let _guard = serial();
    let mut engine = mock_engine(LATE_FIRST);
    engine.config.request_timeout = Duration::from_millis(300);
    let mut game = Game::new(GameSettings::default(), engine.config.clone());

    game.play("D4").unwrap();
    assert!(matches!(
        game.analyze(10),
        Err(EngineError::AnalysisTimeout { .. })
    ));
    // Let the abandoned reply land in the queue.
    thread::sleep(Duration::from_millis(1200));

    assert!(game.undo_last_move());
    game.play("Q16").unwrap();
    let samples = game.winrate_history();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].move_number, 1);
    // White to move after Q16: the engine's 55% is White's.
    assert_eq!(samples[0].black_winrate, 45.0);
    assert_eq!(samples[0].score_lead, 0.8);
    game.shutdown();
}

#[test]
fn test_game_realtime_suggestions() {
    let _guard = serial();
    let engine = mock_engine(ANSWERING);
    let mut game = Game::new(GameSettings::default(), engine.config.clone());
    game.play("D4").unwrap();

    let batches: Arc<Mutex<Vec<Vec<Candidate>>>> = Arc::default();
    let sink = Arc::clone(&batches);
    game.start_realtime_suggestions(move |top| sink.lock().unwrap().push(top))
        .unwrap();
    assert!(wait_until(Duration::from_secs(5), || !game.realtime_active()));
    game.stop_realtime_suggestions();

    let batches = batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1][0].mv, "Q16");
}
