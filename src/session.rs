//! A running stopwatch together with everything that hangs off it

use std::path::PathBuf;

use chrono::FixedOffset;
use log::{debug, warn};
use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    config::Config,
    hooks::Hook,
    progress::ProgressClock,
    render::{self, Dot},
    status::{publish_status, StatusSink},
    stopwatch::Stopwatch,
    task::Task,
    time::{format_elapsed, ElapsedFormat},
    RunState,
};

/// Owns a stopwatch, its progress ring, and their background tasks.
///
/// Commands drive the stopwatch and the ring together. Dropping a session
/// cancels all of its tasks; [`Session::shutdown`] does the same and waits
/// for them to be gone.
///
/// Must be created inside a Tokio runtime.
#[derive(Debug)]
pub struct Session {
    stopwatch: Stopwatch,
    clock: ProgressClock,
    display_format: ElapsedFormat,
    offset: FixedOffset,
    hooks_directory: Option<PathBuf>,
    accumulation: Option<Task>,
    background: Vec<Task>,
    hook_runs: Vec<JoinHandle<()>>,
}

/// Everything a renderer needs to draw one frame
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Frame {
    pub state: RunState,
    pub elapsed_ms: u64,
    pub text: String,
    pub angle: i32,
    pub lap_count: u32,
    pub ring: Vec<Dot>,
}

impl Session {
    /// Create a session without hooks or a status sink
    pub fn new(config: &Config) -> Self {
        let stopwatch = Stopwatch::new(config.tick_interval);
        let clock = ProgressClock::new(config.sweep_interval);
        let background = vec![Task::spawn("progress clock", clock.run())];

        Self {
            stopwatch,
            clock,
            display_format: config.display_format.clone(),
            offset: config.offset(),
            hooks_directory: None,
            accumulation: None,
            background,
            hook_runs: Vec::new(),
        }
    }

    /// Run the hooks found in `directory` on every command
    pub fn with_hooks(mut self, directory: PathBuf) -> Self {
        self.hooks_directory = Some(directory);
        self
    }

    /// Publish the elapsed time to `sink` in `format` whenever the text changes
    pub fn with_status<S: StatusSink>(mut self, format: ElapsedFormat, sink: S) -> Self {
        let publisher = publish_status(self.stopwatch.elapsed_millis(), format, self.offset, sink);
        self.background.push(Task::spawn("status", publisher));
        self
    }

    pub fn start_stopwatch(&mut self) {
        if self.stopwatch.is_running() {
            debug!("Session already running");
            return;
        }

        self.accumulation = Some(Task::spawn("stopwatch", self.stopwatch.start()));
        self.clock.start();
        self.run_hook(Hook::StopwatchStart);
    }

    pub fn pause_stopwatch(&mut self) {
        if !self.stopwatch.is_running() {
            return;
        }

        self.stopwatch.pause();
        self.clock.pause();
        self.run_hook(Hook::StopwatchPause);
    }

    pub fn stop_and_reset_stopwatch(&mut self) {
        if self.stopwatch.state() == RunState::Reset {
            return;
        }

        self.stopwatch.reset();
        self.clock.stop_and_reset();
        self.run_hook(Hook::StopwatchReset);
    }

    /// Start when paused or reset, pause when running
    pub fn toggle(&mut self) {
        if self.stopwatch.is_running() {
            self.pause_stopwatch();
        } else {
            self.start_stopwatch();
        }
    }

    pub fn elapsed_millis(&self) -> watch::Receiver<u64> {
        self.stopwatch.elapsed_millis()
    }

    pub fn run_state(&self) -> watch::Receiver<RunState> {
        self.stopwatch.run_state()
    }

    pub fn angles(&self) -> watch::Receiver<i32> {
        self.clock.angles()
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn clock(&self) -> &ProgressClock {
        &self.clock
    }

    /// Format `millis` the way the display shows it
    pub fn display_text(&self, millis: u64) -> String {
        format_elapsed(millis, &self.display_format, self.offset)
    }

    /// The current state of everything drawn on screen
    pub fn frame(&self) -> Frame {
        let elapsed_ms = *self.stopwatch.elapsed_millis().borrow();
        let angle = *self.clock.angles().borrow();
        let ring = render::ring(angle, self.clock.is_reset());

        Frame {
            state: self.stopwatch.state(),
            elapsed_ms,
            text: self.display_text(elapsed_ms),
            angle,
            lap_count: self.clock.lap_count(),
            ring,
        }
    }

    /// Cancel every task and wait for them to finish, then wait for hooks
    /// that are still running.
    ///
    /// The elapsed time keeps its last committed value.
    pub async fn shutdown(mut self) {
        debug!("Shutting down session");

        for task in self.accumulation.iter().chain(&self.background) {
            task.cancel();
        }

        if let Some(task) = self.accumulation.take() {
            task.join().await;
        }

        for task in self.background.drain(..) {
            task.join().await;
        }

        for run in self.hook_runs.drain(..) {
            if let Err(e) = run.await {
                warn!("Hook task failed: {}", e);
            }
        }
    }

    fn run_hook(&mut self, hook: Hook) {
        let Some(dir) = self.hooks_directory.clone() else {
            return;
        };

        self.hook_runs.retain(|run| !run.is_finished());
        self.hook_runs.push(tokio::spawn(async move {
            if let Err(e) = hook.run(&dir).await {
                warn!("{:#}", e);
            }
        }));
    }
}
