//! Drift-free elapsed time accumulation
//!
//! The accumulation loop never adds a fixed amount per tick. Each tick reads
//! the clock and adds the time since the previous tick, so however late the
//! scheduler wakes the loop, the sum always equals the wall-clock time spent
//! running.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use log::debug;
use tokio::{sync::watch, time::Instant};

use crate::RunState;

/// Default delay between two accumulation ticks
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// A stopwatch that keeps counting while nobody is watching
///
/// `Stopwatch` is a cheap handle; clones share the same counter. The elapsed
/// value is published on a watch channel, see [`Stopwatch::elapsed_millis`].
#[derive(Clone, Debug)]
pub struct Stopwatch {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    tick: Duration,
    inner: Mutex<Inner>,
    elapsed_tx: watch::Sender<u64>,
    state_tx: watch::Sender<RunState>,
}

#[derive(Debug)]
struct Inner {
    state: RunState,
    /// Bumped on every successful start; loops from older starts exit.
    epoch: u64,
    accumulated: Duration,
    last_tick: Instant,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}

impl Stopwatch {
    /// Create a stopwatch in the reset state that ticks every `tick`
    pub fn new(tick: Duration) -> Self {
        let (elapsed_tx, _) = watch::channel(0);
        let (state_tx, _) = watch::channel(RunState::Reset);

        Self {
            shared: Arc::new(Shared {
                tick,
                inner: Mutex::new(Inner {
                    state: RunState::Reset,
                    epoch: 0,
                    accumulated: Duration::ZERO,
                    last_tick: Instant::now(),
                }),
                elapsed_tx,
                state_tx,
            }),
        }
    }

    /// Start or resume counting.
    ///
    /// The transition to [`RunState::Running`] happens when this is called.
    /// The returned future is the accumulation loop itself: it only completes
    /// once the stopwatch is paused or reset, so spawn it rather than await it
    /// inline. Dropping it stops the loop and keeps the last committed value.
    ///
    /// Starting a stopwatch that is already running changes nothing, and the
    /// returned future completes immediately.
    pub fn start(&self) -> impl Future<Output = ()> + Send + 'static {
        let shared = self.shared.clone();
        let epoch = {
            let mut inner = shared.lock();

            if inner.state == RunState::Running {
                debug!("Stopwatch already running, ignoring start");
                None
            } else {
                inner.epoch += 1;
                inner.last_tick = Instant::now();
                inner.state = RunState::Running;
                shared.publish_state(RunState::Running);
                debug!("Stopwatch started at {}ms", inner.accumulated.as_millis());

                Some(inner.epoch)
            }
        };

        async move {
            if let Some(epoch) = epoch {
                shared.accumulate(epoch).await;
            }
        }
    }

    /// Stop counting, keeping the elapsed value. Does nothing unless running.
    pub fn pause(&self) {
        let mut inner = self.shared.lock();

        if inner.state != RunState::Running {
            return;
        }

        self.shared.commit(&mut inner, Instant::now());
        inner.state = RunState::Paused;
        self.shared.publish_state(RunState::Paused);
        debug!("Stopwatch paused at {}ms", inner.accumulated.as_millis());
    }

    /// Stop counting and go back to zero
    pub fn reset(&self) {
        let mut inner = self.shared.lock();

        inner.state = RunState::Reset;
        inner.accumulated = Duration::ZERO;
        self.shared.publish_state(RunState::Reset);
        self.shared.elapsed_tx.send_if_modified(|ms| {
            let changed = *ms != 0;
            *ms = 0;
            changed
        });
        debug!("Stopwatch reset");
    }

    /// Subscribe to the elapsed milliseconds.
    ///
    /// The receiver holds the current value right away and is notified on
    /// every change after that.
    pub fn elapsed_millis(&self) -> watch::Receiver<u64> {
        self.shared.elapsed_tx.subscribe()
    }

    /// Subscribe to run state changes
    pub fn run_state(&self) -> watch::Receiver<RunState> {
        self.shared.state_tx.subscribe()
    }

    /// The last committed elapsed time
    pub fn elapsed(&self) -> Duration {
        self.shared.lock().accumulated
    }

    pub fn state(&self) -> RunState {
        self.shared.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn tick(&self) -> Duration {
        self.shared.tick
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish_state(&self, state: RunState) {
        self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    /// Add everything since the last tick and publish it.
    fn commit(&self, inner: &mut Inner, now: Instant) {
        let delta = now.saturating_duration_since(inner.last_tick);
        inner.accumulated += delta;
        inner.last_tick = now;

        let ms = u64::try_from(inner.accumulated.as_millis()).unwrap_or(u64::MAX);
        self.elapsed_tx.send_if_modified(|current| {
            let changed = *current != ms;
            *current = ms;
            changed
        });
    }

    /// Commit a tick if `epoch` is still the running one.
    fn advance(&self, epoch: u64) -> bool {
        let mut inner = self.lock();

        if inner.epoch != epoch || inner.state != RunState::Running {
            return false;
        }

        self.commit(&mut inner, Instant::now());
        true
    }

    async fn accumulate(&self, epoch: u64) {
        let _guard = LoopGuard {
            shared: self,
            epoch,
        };
        let mut state_rx = self.state_tx.subscribe();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.tick) => {
                    if !self.advance(epoch) {
                        break;
                    }
                }
                changed = state_rx.changed() => {
                    if changed.is_err() || *state_rx.borrow_and_update() != RunState::Running {
                        break;
                    }
                }
            }
        }

        debug!("Accumulation loop {} finished", epoch);
    }
}

/// Leaves a consistent state behind when the loop future is dropped mid-run.
struct LoopGuard<'a> {
    shared: &'a Shared,
    epoch: u64,
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();

        if inner.epoch == self.epoch && inner.state == RunState::Running {
            inner.state = RunState::Paused;
            self.shared.publish_state(RunState::Paused);
            debug!(
                "Accumulation cancelled, holding {}ms",
                inner.accumulated.as_millis()
            );
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::Stopwatch;
    use crate::RunState;

    /// Let woken tasks run before looking at the published values.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn last(sw: &Stopwatch) -> u64 {
        *sw.elapsed_millis().borrow()
    }

    #[tokio::test(start_paused = true)]
    async fn running_then_pausing_counts_exactly() {
        let sw = Stopwatch::default();
        let task = tokio::spawn(sw.start());

        sleep(Duration::from_millis(500)).await;
        sw.pause();
        settle().await;

        assert_eq!(last(&sw), 500);
        assert_eq!(sw.state(), RunState::Paused);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn resume_after_pause_continues_counting() {
        let sw = Stopwatch::default();
        tokio::spawn(sw.start());

        sleep(Duration::from_millis(500)).await;
        sw.pause();
        assert_eq!(last(&sw), 500);

        tokio::spawn(sw.start());
        sleep(Duration::from_millis(250)).await;
        settle().await;

        assert_eq!(last(&sw), 750);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_interval_is_not_counted() {
        let sw = Stopwatch::default();
        tokio::spawn(sw.start());
        sleep(Duration::from_millis(120)).await;
        sw.pause();

        sleep(Duration::from_secs(10)).await;

        tokio::spawn(sw.start());
        sleep(Duration::from_millis(80)).await;
        sw.pause();

        assert_eq!(last(&sw), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_goes_back_to_zero() {
        let sw = Stopwatch::default();
        let mut rx = sw.elapsed_millis();
        tokio::spawn(sw.start());

        sleep(Duration::from_millis(500)).await;
        sw.reset();
        settle().await;

        assert_eq!(*rx.borrow_and_update(), 0);
        assert_eq!(sw.state(), RunState::Reset);

        tokio::spawn(sw.start());
        sleep(Duration::from_millis(500)).await;
        sw.pause();

        assert_eq!(*rx.borrow_and_update(), 500);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_reset_are_idempotent() {
        let sw = Stopwatch::default();
        tokio::spawn(sw.start());
        sleep(Duration::from_millis(300)).await;

        sw.pause();
        sleep(Duration::from_millis(50)).await;
        sw.pause();
        assert_eq!(last(&sw), 300);
        assert_eq!(sw.state(), RunState::Paused);

        sw.reset();
        sw.reset();
        assert_eq!(last(&sw), 0);
        assert_eq!(sw.state(), RunState::Reset);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_while_reset_does_nothing() {
        let sw = Stopwatch::default();

        sw.pause();

        assert_eq!(sw.state(), RunState::Reset);
        assert_eq!(last(&sw), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_does_not_double_count() {
        let sw = Stopwatch::default();
        tokio::spawn(sw.start());
        let second = tokio::spawn(sw.start());

        settle().await;
        assert!(second.is_finished());

        sleep(Duration::from_millis(400)).await;
        sw.pause();

        assert_eq!(last(&sw), 400);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_pause_and_start_keeps_a_single_loop() {
        let sw = Stopwatch::default();
        let first = tokio::spawn(sw.start());
        sleep(Duration::from_millis(100)).await;

        // The first loop has not observed the pause before the restart.
        sw.pause();
        tokio::spawn(sw.start());
        sleep(Duration::from_millis(100)).await;
        settle().await;

        assert!(first.is_finished());
        sw.pause();
        assert_eq!(last(&sw), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn values_never_decrease_while_running() {
        let sw = Stopwatch::default();
        let mut rx = sw.elapsed_millis();
        tokio::spawn(sw.start());

        let mut seen = vec![*rx.borrow_and_update()];
        for _ in 0..20 {
            sleep(Duration::from_millis(7)).await;
            seen.push(*rx.borrow_and_update());
        }

        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(*seen.last().unwrap() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_the_loop_keeps_the_value() {
        let sw = Stopwatch::default();
        let task = tokio::spawn(sw.start());
        sleep(Duration::from_millis(205)).await;
        settle().await;

        task.abort();
        let _ = task.await;
        let held = last(&sw);

        assert_eq!(held, 200);
        assert_eq!(sw.state(), RunState::Paused);

        sleep(Duration::from_millis(300)).await;
        assert_eq!(last(&sw), held);

        tokio::spawn(sw.start());
        sleep(Duration::from_millis(100)).await;
        sw.pause();
        assert_eq!(last(&sw), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn late_wakeup_counts_the_real_time() {
        let sw = Stopwatch::default();
        tokio::spawn(sw.start());
        settle().await;

        // A single wakeup nine and a half ticks late.
        tokio::time::advance(Duration::from_millis(95)).await;
        settle().await;

        assert_eq!(last(&sw), 95);

        tokio::time::advance(Duration::from_millis(10_000)).await;
        settle().await;

        assert_eq!(last(&sw), 10_095);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_any_running_time_exactly() {
        for d in [1, 37, 95, 10_000] {
            let sw = Stopwatch::default();
            tokio::spawn(sw.start());

            sleep(Duration::from_millis(d)).await;
            sw.pause();

            assert_eq!(last(&sw), d);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn new_receivers_see_the_current_value() {
        let sw = Stopwatch::default();
        tokio::spawn(sw.start());
        sleep(Duration::from_millis(60)).await;
        sw.pause();

        let rx = sw.elapsed_millis();

        assert_eq!(*rx.borrow(), 60);
    }
}
