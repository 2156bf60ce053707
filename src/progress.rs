//! The animated progress ring's clock
//!
//! The ring is decoration. It does not read the stopwatch; it runs on its own
//! fixed beat and only follows the same start/pause/reset commands.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Where every sweep starts, the top of the ring
pub const INITIAL_ANGLE: i32 = -90;
/// Where every sweep ends
pub const FINAL_ANGLE: i32 = 270;
/// Degrees between two dots
pub const STEP: i32 = 6;
/// Default delay between two emitted angles
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Signal {
    is_reset: bool,
    is_running: bool,
}

/// Saved form of a clock, used to rebuild one with [`ProgressClock::restore`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub is_running: bool,
    pub last_angle: i32,
}

/// Self-clocked angle sweeping around the ring
///
/// Clones share the same clock. Nothing moves until [`ProgressClock::run`]
/// is being polled; the angles it produces are read from
/// [`ProgressClock::angles`].
#[derive(Clone, Debug)]
pub struct ProgressClock {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    interval: Duration,
    signal_tx: watch::Sender<Signal>,
    angle_tx: watch::Sender<i32>,
    sweep: Mutex<Sweep>,
}

#[derive(Debug)]
struct Sweep {
    lap_count: u32,
    last_angle: i32,
}

impl Default for ProgressClock {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl ProgressClock {
    pub fn new(interval: Duration) -> Self {
        Self::with_state(
            interval,
            Signal {
                is_reset: true,
                is_running: false,
            },
            INITIAL_ANGLE,
        )
    }

    /// Rebuild a clock from a [`Snapshot`].
    ///
    /// A running snapshot continues sweeping from its angle as soon as the
    /// clock runs. A stopped one waits there, or sits in the reset state if
    /// it was at the initial angle.
    pub fn restore(interval: Duration, snapshot: Snapshot) -> Self {
        let offset = snapshot
            .last_angle
            .saturating_sub(INITIAL_ANGLE)
            .clamp(0, FINAL_ANGLE - INITIAL_ANGLE - STEP);
        let angle = INITIAL_ANGLE + offset - offset % STEP;
        let signal = Signal {
            is_reset: !snapshot.is_running && angle == INITIAL_ANGLE,
            is_running: snapshot.is_running,
        };

        Self::with_state(interval, signal, angle)
    }

    fn with_state(interval: Duration, signal: Signal, angle: i32) -> Self {
        let (signal_tx, _) = watch::channel(signal);
        let (angle_tx, _) = watch::channel(angle);

        Self {
            shared: Arc::new(Shared {
                interval,
                signal_tx,
                angle_tx,
                sweep: Mutex::new(Sweep {
                    lap_count: 0,
                    last_angle: angle,
                }),
            }),
        }
    }

    pub fn start(&self) {
        self.shared.set_signal(|signal| {
            signal.is_reset = false;
            signal.is_running = true;
        });
    }

    /// Stop sweeping. The angle is kept so the next start continues from it.
    pub fn pause(&self) {
        self.shared.set_signal(|signal| signal.is_running = false);
    }

    pub fn stop_and_reset(&self) {
        {
            let mut sweep = self.shared.lock();
            sweep.lap_count = 0;
            sweep.last_angle = INITIAL_ANGLE;
        }

        self.shared.set_signal(|signal| {
            signal.is_reset = true;
            signal.is_running = false;
        });
    }

    /// Drive the clock.
    ///
    /// Runs until dropped. Every start/pause/reset restarts what it is doing,
    /// so a command issued in the middle of a sweep takes effect right away.
    pub fn run(&self) -> impl Future<Output = ()> + Send + 'static {
        let shared = self.shared.clone();

        async move { shared.drive().await }
    }

    /// Subscribe to the emitted angles
    pub fn angles(&self) -> watch::Receiver<i32> {
        self.shared.angle_tx.subscribe()
    }

    pub fn is_reset(&self) -> bool {
        self.shared.signal_tx.borrow().is_reset
    }

    pub fn is_running(&self) -> bool {
        self.shared.signal_tx.borrow().is_running
    }

    /// Number of full turns completed since the last reset
    pub fn lap_count(&self) -> u32 {
        self.shared.lock().lap_count
    }

    /// The most recently emitted angle, where a resumed sweep picks up
    pub fn last_angle(&self) -> i32 {
        self.shared.lock().last_angle
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            is_running: self.is_running(),
            last_angle: self.last_angle(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Sweep> {
        self.sweep.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_signal(&self, f: impl FnOnce(&mut Signal)) {
        self.signal_tx.send_if_modified(|signal| {
            let before = *signal;
            f(signal);
            *signal != before
        });
    }

    async fn drive(&self) {
        let mut signal_rx = self.signal_tx.subscribe();

        loop {
            let signal = *signal_rx.borrow_and_update();
            debug!("Progress clock signal {:?}", signal);

            if signal.is_running {
                tokio::select! {
                    _ = self.sweep() => {}
                    changed = signal_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                }
            } else {
                if signal.is_reset {
                    {
                        // A lap may have completed after stop_and_reset cleared it.
                        let mut sweep = self.lock();
                        sweep.lap_count = 0;
                        sweep.last_angle = INITIAL_ANGLE;
                    }
                    self.angle_tx.send_replace(INITIAL_ANGLE);
                }

                if signal_rx.changed().await.is_err() {
                    return;
                }
            }
        }
    }

    async fn sweep(&self) {
        loop {
            let from = self.lock().last_angle;

            for angle in (from..=FINAL_ANGLE).step_by(STEP as usize) {
                tokio::time::sleep(self.interval).await;
                self.angle_tx.send_replace(angle);
                self.lock().last_angle = angle;
            }

            let mut sweep = self.lock();
            sweep.last_angle = INITIAL_ANGLE;
            sweep.lap_count += 1;
            debug!("Progress clock completed lap {}", sweep.lap_count);
        }
    }
}
