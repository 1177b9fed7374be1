//! # Status Poll Daemon
//!
//! Background process that polls the player once per second and prints a
//! now-playing position line. The blocking channel query runs on a worker
//! thread each tick so a slow or wedged player never stalls the tick loop;
//! a query that misses its tick is simply superseded by the next one. No
//! ordering is guaranteed between polls and user-triggered commands, and
//! none is needed.
//!
//! The daemon runs as a separate process managed through a PID file, with
//! start/stop/status wired up from the CLI.

use crate::library;
use crate::player::{self, ControlChannel};
use anyhow::{Context, Result};
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Give up after this many ticks in a row fail; a player that answers
/// nothing for this long is gone, not busy.
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Periodic status poller.
#[derive(Debug)]
pub struct StatusDaemon {
    pid_file: PathBuf,
    interval: Duration,
}

impl StatusDaemon {
    /// Create a daemon with the standard PID file location and a 1-second
    /// poll interval.
    pub fn new() -> Result<Self> {
        Ok(Self {
            pid_file: pid_file_path()?,
            interval: Duration::from_secs(1),
        })
    }

    /// Poll until the player stops answering, printing one position line per
    /// tick while something is playing.
    pub fn run<C>(&mut self, channel: C) -> Result<()>
    where
        C: ControlChannel + Clone + Send + 'static,
    {
        let pid = std::process::id();
        fs::write(&self.pid_file, pid.to_string())
            .with_context(|| format!("Failed to write PID file at {}", self.pid_file.display()))?;
        info!("Status daemon started with PID {pid}");

        let mut failures = 0u32;
        loop {
            let tick_started = Instant::now();

            // One-shot worker per tick. If the query outlives the tick the
            // thread finishes on its own and its answer is dropped.
            let (tx, rx) = mpsc::channel();
            let worker_channel = channel.clone();
            thread::spawn(move || {
                let _ = tx.send(poll_status(&worker_channel));
            });

            match rx.recv_timeout(self.interval) {
                Ok(Ok(Some(line))) => {
                    failures = 0;
                    println!("{line}");
                }
                Ok(Ok(None)) => {
                    failures = 0;
                    debug!("Player idle, nothing to report");
                }
                Ok(Err(e)) => {
                    failures += 1;
                    error!("Status poll failed ({failures}/{MAX_CONSECUTIVE_FAILURES}): {e:#}");
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        error!("Player unreachable, exiting status daemon");
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    debug!("Status poll superseded by next tick");
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    debug!("Status worker vanished before answering");
                }
            }

            if let Some(rest) = self.interval.checked_sub(tick_started.elapsed()) {
                thread::sleep(rest);
            }
        }

        let _ = fs::remove_file(&self.pid_file);
        Ok(())
    }
}

/// One blocking status query: the formatted position of the current track,
/// `None` while the player is stopped.
fn poll_status<C: ControlChannel>(channel: &C) -> Result<Option<String>> {
    match library::player_position(channel)? {
        Some(seconds) => Ok(Some(format!("♫ {}", player::format_position(seconds)))),
        None => Ok(None),
    }
}

fn pid_file_path() -> Result<PathBuf> {
    Ok(crate::config::data_dir()?.join("musicbar-daemon.pid"))
}

/// Check whether the status daemon is running.
pub fn is_daemon_running() -> Result<bool> {
    pid_file_alive(&pid_file_path()?)
}

fn pid_file_alive(pid_file: &Path) -> Result<bool> {
    if !pid_file.exists() {
        return Ok(false);
    }

    let pid_str = fs::read_to_string(pid_file)?;
    let pid: u32 = pid_str
        .trim()
        .parse()
        .context("Invalid PID in daemon file")?;

    // Signal 0 probes for process existence without touching it.
    match Command::new("kill").args(["-0", &pid.to_string()]).status() {
        Ok(status) => Ok(status.success()),
        Err(_) => Ok(false),
    }
}

/// Stop the running daemon.
pub fn stop_daemon() -> Result<()> {
    let pid_file = pid_file_path()?;
    if !pid_file.exists() {
        anyhow::bail!("Status daemon is not running");
    }

    let pid_str = fs::read_to_string(&pid_file)?;
    let pid: u32 = pid_str
        .trim()
        .parse()
        .context("Invalid PID in daemon file")?;

    Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .context("Failed to stop status daemon")?;

    fs::remove_file(&pid_file)?;
    info!("Status daemon stopped (PID: {pid})");
    Ok(())
}
