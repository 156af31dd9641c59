use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use conquest_control::BotDirector;
use conquest_core::{CommandQueue, Match, MatchContent};
use parking_lot::Mutex;

use crate::hub::{BroadcastObserver, SnapshotHub};

pub type SharedMatch = Arc<Mutex<Match>>;

#[derive(Clone)]
pub struct AppState {
    pub game: SharedMatch,
    /// Intake handle. Route handlers push here without taking the match lock.
    pub commands: CommandQueue,
    pub hub: SnapshotHub,
    /// Last tick the loop completed, readable without the match lock.
    pub current_tick: Arc<AtomicU64>,
    pub ticks_per_sec: f64,
    /// Roster size `POST /start` fills up to with bots when the body names none.
    pub default_bot_fill: usize,
}

impl AppState {
    /// Builds a waiting match wired to a fresh snapshot hub and bot director.
    pub fn new(content: Arc<MatchContent>, seed: u64, default_bot_fill: usize) -> Self {
        let ticks_per_sec = content.constants.ticks_per_sec;
        let hub = SnapshotHub::new();
        let game = Match::new(content, seed)
            .with_command_source(Box::new(BotDirector::new(seed)))
            .with_observer(Box::new(BroadcastObserver::new(hub.clone())));
        let commands = game.command_queue();
        Self {
            game: Arc::new(Mutex::new(game)),
            commands,
            hub,
            current_tick: Arc::new(AtomicU64::new(0)),
            ticks_per_sec,
            default_bot_fill,
        }
    }
}
