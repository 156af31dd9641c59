//! `conquest_core`: authoritative territory-conquest match simulation.
//!
//! No IO, no network, no timers. The owner of a [`Match`] steps it with
//! [`Match::tick`]; all randomness comes from the match's seeded RNG.

mod combat;
mod commands;
mod economy;
mod engine;
mod error;
mod id;
mod intake;
mod lifecycle;
pub mod map;
pub mod mapgen;
mod movement;
pub mod noise;
pub mod pathfinding;
mod scoring;
pub mod spatial;
mod squads;
mod supply;
mod territory;
mod training;
mod types;
mod view;
mod visibility;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use commands::Rejection;
pub use economy::{diminishing_multiplier, raw_income};
pub use engine::Match;
pub use error::MatchError;
pub use id::generate_uuid;
pub use intake::CommandQueue;
pub use map::{GameMap, Structure, Tile};
pub use mapgen::MapGenError;
pub use spatial::SpatialIndex;
pub use supply::flood_supply;
pub use types::*;
pub use view::{CommandSource, MatchObserver, MatchReader, MatchView};
pub use visibility::visibility_mask;

pub(crate) fn emit(counters: &mut Counters, tick: u64, event: MatchEvent) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}

#[cfg(test)]
mod tests;
