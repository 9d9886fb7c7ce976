//! Replay of recorded location samples.
//!
//! Reads samples from a file or stdin on a background thread and delivers
//! them over a bounded channel, the same shape a live geolocation feed has.

use crate::source::types::LocationSample;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Where samples are read from.
#[derive(Debug, Clone)]
pub enum ReplayInput {
    File(PathBuf),
    Stdin,
}

impl ReplayInput {
    /// `-` means stdin, anything else is a path.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            ReplayInput::Stdin
        } else {
            ReplayInput::File(PathBuf::from(arg))
        }
    }
}

/// Configuration for a replay source.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub input: ReplayInput,
    /// Pause between samples, emulating the device's fix interval
    pub interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            input: ReplayInput::Stdin,
            interval: Duration::ZERO,
        }
    }
}

/// Errors that can occur while replaying samples.
#[derive(Debug)]
pub enum SourceError {
    AlreadyRunning,
    Io(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::AlreadyRunning => write!(f, "Location source is already running"),
            SourceError::Io(e) => write!(f, "Location source IO error: {e}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// A location source replaying recorded samples.
pub struct ReplaySource {
    config: ReplayConfig,
    sender: Option<Sender<LocationSample>>,
    receiver: Receiver<LocationSample>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ReplaySource {
    pub fn new(config: ReplayConfig) -> Self {
        let (sender, receiver) = bounded(1_000);
        Self {
            config,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Start the reader thread.
    ///
    /// The channel disconnects once the input is exhausted or [`stop`](Self::stop)
    /// is called.
    pub fn start(&mut self) -> Result<(), SourceError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SourceError::AlreadyRunning);
        }
        let sender = self.sender.take().ok_or(SourceError::AlreadyRunning)?;

        let reader: Box<dyn Read + Send> = match &self.config.input {
            ReplayInput::File(path) => Box::new(
                std::fs::File::open(path)
                    .map_err(|e| SourceError::Io(format!("{}: {e}", path.display())))?,
            ),
            ReplayInput::Stdin => Box::new(std::io::stdin()),
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let interval = self.config.interval;

        self.worker = Some(thread::spawn(move || {
            replay_lines(BufReader::new(reader), sender, &running, interval);
            running.store(false, Ordering::SeqCst);
        }));

        Ok(())
    }

    /// Ask the reader thread to stop after its current line.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn receiver(&self) -> &Receiver<LocationSample> {
        &self.receiver
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        self.stop();
        // Stdin reads can block indefinitely; detach rather than join.
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}

fn replay_lines<R: BufRead>(
    reader: R,
    sender: Sender<LocationSample>,
    running: &AtomicBool,
    interval: Duration,
) {
    for (index, line) in reader.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Location input read failed: {e}");
                break;
            }
        };
        match LocationSample::parse_line(&line) {
            Ok(Some(sample)) => {
                if sender.send(sample).is_err() {
                    break;
                }
                if !interval.is_zero() {
                    thread::sleep(interval);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping location line {}: {}", index + 1, e),
        }
    }
}
