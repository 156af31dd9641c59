use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::time::Duration;

use conquest_core::MatchPhase;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{error, info};

use crate::state::AppState;

/// Yields the delta of each tick. `None` ends the loop.
pub trait TickSource: Send {
    fn next_tick(&mut self) -> impl Future<Output = Option<f64>> + Send;
}

/// Wall-clock driver: fires at a fixed rate and reports the real elapsed time.
pub struct IntervalTickSource {
    interval: Interval,
    last: Option<Instant>,
}

impl IntervalTickSource {
    pub fn new(ticks_per_sec: f64) -> Self {
        let period = Duration::from_secs_f64(1.0 / ticks_per_sec.max(0.001));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            last: None,
        }
    }
}

impl TickSource for IntervalTickSource {
    async fn next_tick(&mut self) -> Option<f64> {
        let now = self.interval.tick().await;
        let dt = match self.last {
            Some(last) => now.duration_since(last).as_secs_f64(),
            None => self.interval.period().as_secs_f64(),
        };
        self.last = Some(now);
        Some(dt)
    }
}

/// Channel-fed driver. Each value sent through [`ManualTicker`] is one tick.
#[cfg_attr(not(test), allow(dead_code))]
pub struct ManualTickSource {
    rx: mpsc::UnboundedReceiver<f64>,
}

#[cfg_attr(not(test), allow(dead_code))]
#[derive(Clone)]
pub struct ManualTicker {
    tx: mpsc::UnboundedSender<f64>,
}

#[cfg_attr(not(test), allow(dead_code))]
impl ManualTickSource {
    pub fn new() -> (Self, ManualTicker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTicker { tx })
    }
}

#[cfg_attr(not(test), allow(dead_code))]
impl ManualTicker {
    /// Returns false once the loop has gone away.
    pub fn step(&self, dt: f64) -> bool {
        self.tx.send(dt).is_ok()
    }
}

impl TickSource for ManualTickSource {
    async fn next_tick(&mut self) -> Option<f64> {
        self.rx.recv().await
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    /// Ticks attempted, faulted ones included.
    pub ticks: u64,
    pub faults: u64,
}

/// Steps the shared match once per tick from `source` until the match
/// finishes, is destroyed, `max_ticks` is reached, or the source runs dry.
/// A finished match is destroyed before the loop returns.
///
/// A panicking tick is logged and skipped; the loop keeps going.
pub async fn run_tick_loop<S: TickSource>(
    state: AppState,
    mut source: S,
    max_ticks: Option<u64>,
) -> LoopStats {
    let mut stats = LoopStats::default();
    while let Some(dt) = source.next_tick().await {
        stats.ticks += 1;
        let done = {
            let mut game = state.game.lock();
            let outcome = catch_unwind(AssertUnwindSafe(|| game.tick(dt)));
            if outcome.is_err() {
                stats.faults += 1;
                error!(
                    tick = game.state().meta.tick,
                    faults = stats.faults,
                    "tick panicked, continuing"
                );
            }
            state
                .current_tick
                .store(game.state().meta.tick, Ordering::Relaxed);
            if game.state().meta.phase == MatchPhase::Finished {
                game.destroy();
            }
            game.is_destroyed()
        };
        if done || max_ticks.is_some_and(|max| stats.ticks >= max) {
            break;
        }
    }
    info!(ticks = stats.ticks, faults = stats.faults, "tick loop stopped");
    stats
}
