//! Client bridge to the external analysis engine.
//!
//! An [`AnalysisBridge`] owns one engine process. Two reader threads start
//! with it: the stdout reader parses each line as an [`AnalysisResponse`] and
//! pushes it onto a shared channel, and the stderr reader only logs. Consumers
//! (`analyze()` and the realtime worker) take responses off that channel and
//! filter by request id, so a stale response from a superseded request is
//! dropped.
//!
//! ```text
//!  stdin  <── analyze() / start_realtime_analysis()   (single writer)
//!  stdout ──> reader thread ──> channel ──> analyze() | realtime worker
//!  stderr ──> reader thread ──> tracing
//! ```

use std::collections::VecDeque;
use std::env;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::analysis::{AnalysisRequest, AnalysisResponse, Candidate};
use crate::config::EngineConfig;
use crate::constants::{SHUTDOWN_TIMEOUT, STDERR_TAIL_LINES, STREAM_JOIN_TIMEOUT};

/// Stderr noise the engine prints for every request field it does not use.
const STDERR_NOISE: &str = "Unexpected or unused field";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine {kind} not found: {}", .path.display())]
    ResourceMissing { kind: &'static str, path: PathBuf },
    #[error("failed to spawn engine: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine exited during startup ({status}): {stderr}")]
    ProcessStartFailure { status: ExitStatus, stderr: String },
    #[error("engine process is not running{}", tail_suffix(.stderr))]
    ProcessDied { stderr: String },
    #[error("analysis {id} timed out after {waited:?}")]
    AnalysisTimeout { id: String, waited: Duration },
    #[error("engine rejected query {id}: {message}")]
    Rejected { id: String, message: String },
    #[error("failed to write request: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to encode request: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn tail_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl EngineError {
    /// Whether the bridge that produced this error is unusable from now on.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EngineError::AnalysisTimeout { .. } | EngineError::Rejected { .. }
        )
    }
}

type SharedReceiver = Arc<Mutex<Receiver<AnalysisResponse>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A running realtime-suggestion worker.
struct RealtimeStream {
    id: String,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// One engine process and its I/O threads.
pub struct AnalysisBridge {
    config: EngineConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    responses: SharedReceiver,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    readers: Vec<JoinHandle<()>>,
    stream: Option<RealtimeStream>,
    dead: bool,
}

impl AnalysisBridge {
    /// Check resources, spawn `<binary> analysis -model <m> -config <c>`, and
    /// start the reader threads.
    pub fn start(config: EngineConfig) -> Result<Self, EngineError> {
        let binary = locate_binary(&config.binary).ok_or_else(|| EngineError::ResourceMissing {
            kind: "binary",
            path: config.binary.clone(),
        })?;
        for (kind, path) in [("model", &config.model), ("config", &config.config)] {
            if !path.exists() {
                return Err(EngineError::ResourceMissing {
                    kind,
                    path: path.clone(),
                });
            }
        }

        info!(
            binary = %binary.display(),
            model = %config.model.display(),
            config = %config.config.display(),
            "starting analysis engine"
        );
        let mut child = Command::new(&binary)
            .arg("analysis")
            .arg("-model")
            .arg(&config.model)
            .arg("-config")
            .arg(&config.config)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EngineError::Spawn)?;

        thread::sleep(config.startup_grace);
        if let Ok(Some(status)) = child.try_wait() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            error!(%status, "analysis engine exited during startup");
            return Err(EngineError::ProcessStartFailure {
                status,
                stderr: stderr.trim().to_string(),
            });
        }

        let stdin = child.stdin.take();
        let (tx, rx) = mpsc::channel();
        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(
                spawn_reader("weiqi-engine-stdout", move || read_responses(stdout, tx))
                    .map_err(EngineError::Spawn)?,
            );
        }
        if let Some(stderr) = child.stderr.take() {
            let tail = Arc::clone(&stderr_tail);
            readers.push(
                spawn_reader("weiqi-engine-stderr", move || read_diagnostics(stderr, tail))
                    .map_err(EngineError::Spawn)?,
            );
        }

        info!(pid = child.id(), "analysis engine started");
        Ok(Self {
            config,
            child,
            stdin,
            responses: Arc::new(Mutex::new(rx)),
            stderr_tail,
            readers,
            stream: None,
            dead: false,
        })
    }

    /// Whether the engine process is still running. Once it has exited the
    /// bridge stays dead.
    pub fn is_alive(&mut self) -> bool {
        if self.dead {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                error!(%status, "analysis engine exited");
                self.dead = true;
                false
            }
            Err(e) => {
                error!(error = %e, "failed to poll analysis engine");
                self.dead = true;
                false
            }
        }
    }

    fn died(&mut self) -> EngineError {
        self.dead = true;
        let stderr = lock(&self.stderr_tail)
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        EngineError::ProcessDied { stderr }
    }

    fn ensure_alive(&mut self) -> Result<(), EngineError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(self.died())
        }
    }

    fn send(&mut self, req: &AnalysisRequest) -> Result<(), EngineError> {
        let line = req.to_line()?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.died());
        };
        debug!(id = %req.id, visits = req.max_visits, moves = req.moves.len(), "sending analysis request");
        let written = stdin
            .write_all(line.as_bytes())
            .and_then(|()| stdin.flush());
        match written {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Err(self.died()),
            Err(e) => Err(EngineError::Write(e)),
        }
    }

    /// Run one query to completion and return its final response.
    ///
    /// Any active realtime stream is cancelled first, since only one request
    /// may be outstanding per bridge.
    pub fn analyze(&mut self, req: &AnalysisRequest) -> Result<AnalysisResponse, EngineError> {
        self.ensure_alive()?;
        self.stop_realtime_analysis();
        self.send(req)?;

        let started = Instant::now();
        let poll = self.config.poll_interval;
        let responses = Arc::clone(&self.responses);
        let rx = lock(&responses);
        loop {
            match rx.recv_timeout(poll) {
                Ok(msg) if msg.id != req.id => {
                    debug!(id = %msg.id, expected = %req.id, "discarding stale response");
                }
                Ok(mut msg) => {
                    if let Some(message) = msg.error.take() {
                        warn!(id = %req.id, %message, "engine rejected query");
                        return Err(EngineError::Rejected {
                            id: req.id.clone(),
                            message,
                        });
                    }
                    if msg.is_final() {
                        debug!(id = %req.id, elapsed = ?started.elapsed(), "analysis complete");
                        return Ok(msg);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.is_alive() {
                        return Err(self.died());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(self.died()),
            }
            let waited = started.elapsed();
            if waited >= self.config.request_timeout {
                warn!(id = %req.id, ?waited, "analysis timed out");
                return Err(EngineError::AnalysisTimeout {
                    id: req.id.clone(),
                    waited,
                });
            }
        }
    }

    /// Send a streaming query and forward the top `top_n` candidates of every
    /// progress report to `callback` from a worker thread.
    ///
    /// A previous stream is cancelled and joined first. The worker stops on
    /// the final response for this id or on cancellation.
    pub fn start_realtime_analysis<F>(
        &mut self,
        req: &AnalysisRequest,
        top_n: usize,
        mut callback: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(Vec<Candidate>) + Send + 'static,
    {
        self.ensure_alive()?;
        self.stop_realtime_analysis();
        self.send(req)?;

        let id = req.id.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let responses = Arc::clone(&self.responses);
        let poll = self.config.poll_interval;
        let worker_cancel = Arc::clone(&cancel);
        let worker_id = id.clone();

        let handle = thread::Builder::new()
            .name("weiqi-realtime".to_string())
            .spawn(move || {
                while !worker_cancel.load(Ordering::Acquire) {
                    let msg = lock(&responses).recv_timeout(poll);
                    match msg {
                        Ok(msg) if msg.id == worker_id => {
                            if !msg.move_infos.is_empty() {
                                callback(msg.top(top_n).to_vec());
                            }
                            if msg.is_final() {
                                debug!(id = %worker_id, "realtime analysis complete");
                                break;
                            }
                        }
                        Ok(msg) => debug!(id = %msg.id, "discarding stale response"),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            warn!(id = %worker_id, "engine output closed during realtime analysis");
                            break;
                        }
                    }
                }
            })
            .map_err(EngineError::Spawn)?;

        info!(%id, "realtime analysis started");
        self.stream = Some(RealtimeStream { id, cancel, handle });
        Ok(())
    }

    /// Whether a realtime worker is still delivering results.
    pub fn realtime_active(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Cancel the realtime worker and join it with a bounded wait. Nothing is
    /// sent to the engine; its late output is dropped by id.
    pub fn stop_realtime_analysis(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        stream.cancel.store(true, Ordering::Release);
        if join_within(stream.handle, STREAM_JOIN_TIMEOUT) {
            debug!(id = %stream.id, "realtime analysis stopped");
        } else {
            warn!(id = %stream.id, "realtime worker did not stop in time; detaching");
        }
    }

    /// Stop streaming, close stdin, and wait for the engine to exit, killing
    /// it if it lingers.
    pub fn shutdown(&mut self) {
        self.stop_realtime_analysis();
        drop(self.stdin.take());

        let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(%status, "analysis engine exited");
                    break;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(self.config.poll_interval),
                _ => {
                    warn!("analysis engine did not exit; killing it");
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
            }
        }
        self.dead = true;
        for reader in self.readers.drain(..) {
            join_within(reader, STREAM_JOIN_TIMEOUT);
        }
    }
}

impl Drop for AnalysisBridge {
    fn drop(&mut self) {
        if self.stdin.is_some() || self.stream.is_some() {
            self.shutdown();
        }
    }
}

/// A bridge that is started on first use and torn down explicitly.
pub struct LazyBridge {
    config: EngineConfig,
    bridge: Option<AnalysisBridge>,
}

impl LazyBridge {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            bridge: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the engine has been started and is still running.
    pub fn is_running(&mut self) -> bool {
        self.bridge.as_mut().is_some_and(AnalysisBridge::is_alive)
    }

    /// The running bridge, starting the engine if needed. A bridge whose
    /// process has died is torn down and replaced.
    pub fn get(&mut self) -> Result<&mut AnalysisBridge, EngineError> {
        if self.bridge.as_ref().is_some_and(|b| b.dead) {
            warn!("analysis engine is gone; restarting it");
            self.shutdown();
        }
        match self.bridge {
            Some(ref mut bridge) => Ok(bridge),
            None => Ok(self.bridge.insert(AnalysisBridge::start(self.config.clone())?)),
        }
    }

    /// The bridge only if it is already running.
    pub fn running(&mut self) -> Option<&mut AnalysisBridge> {
        self.bridge.as_mut().filter(|b| !b.dead)
    }

    pub fn shutdown(&mut self) {
        if let Some(mut bridge) = self.bridge.take() {
            bridge.shutdown();
        }
    }
}

fn spawn_reader(name: &str, f: impl FnOnce() + Send + 'static) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name(name.to_string()).spawn(f)
}

fn read_responses(stdout: impl Read, tx: Sender<AnalysisResponse>) {
    for line in BufReader::new(stdout).lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "failed to read engine output");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match AnalysisResponse::from_line(line) {
            Ok(msg) => {
                if tx.send(msg).is_err() {
                    break;
                }
            }
            Err(e) => warn!(error = %e, line, "dropping malformed engine line"),
        }
    }
    debug!("engine stdout closed");
}

fn read_diagnostics(stderr: impl Read, tail: Arc<Mutex<VecDeque<String>>>) {
    for line in BufReader::new(stderr).lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() || line.contains(STDERR_NOISE) {
            continue;
        }
        debug!(target: "weiqi::engine_stderr", "{line}");
        let mut tail = lock(&tail);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }
}

/// Join `handle` if it finishes within `timeout`; otherwise detach it.
fn join_within(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        warn!("engine worker thread panicked");
    }
    true
}

/// Resolve the engine binary: an explicit path must exist, a bare name is
/// searched on `PATH`.
fn locate_binary(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 || binary.is_absolute() {
        return binary.exists().then(|| binary.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}
