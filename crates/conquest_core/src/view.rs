//! Seams between the engine and its collaborators.
//!
//! [`MatchView`] is the read-only accessor surface. Bots and transport see the
//! match only through it, so neither can mutate match state.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::map::GameMap;
use crate::{
    CommandEnvelope, Contestant, ContestantId, ContestantSnapshot, MatchContent, MatchPhase,
    MatchResult, MatchState, PhasePayload, PlayerSlot, Squad, TilePos, TrainingOrder,
};

pub trait MatchView {
    fn tick(&self) -> u64;
    fn phase(&self) -> MatchPhase;
    /// Seconds spent in the current phase.
    fn phase_elapsed_secs(&self) -> f64;
    fn map(&self) -> &GameMap;
    fn contestants(&self) -> &[Contestant];
    fn squads(&self) -> &[Squad];
    fn training_queue(&self, building: TilePos) -> Option<&VecDeque<TrainingOrder>>;
    fn content(&self) -> &MatchContent;

    fn contestant(&self, id: &ContestantId) -> Option<&Contestant> {
        self.contestants().iter().find(|c| &c.id == id)
    }

    fn contestant_at(&self, slot: PlayerSlot) -> Option<&Contestant> {
        self.contestants().get(slot.index())
    }

    fn squads_owned_by(&self, slot: PlayerSlot) -> Vec<&Squad> {
        self.squads().iter().filter(|s| s.owner == slot).collect()
    }
}

/// Borrowed facade over a [`MatchState`] and its content.
#[derive(Debug, Clone, Copy)]
pub struct MatchReader<'a> {
    pub state: &'a MatchState,
    pub content: &'a MatchContent,
}

impl MatchView for MatchReader<'_> {
    fn tick(&self) -> u64 {
        self.state.meta.tick
    }

    fn phase(&self) -> MatchPhase {
        self.state.meta.phase
    }

    fn phase_elapsed_secs(&self) -> f64 {
        self.state.meta.phase_elapsed_secs
    }

    fn map(&self) -> &GameMap {
        &self.state.map
    }

    fn contestants(&self) -> &[Contestant] {
        &self.state.contestants
    }

    fn squads(&self) -> &[Squad] {
        &self.state.squads
    }

    fn training_queue(&self, building: TilePos) -> Option<&VecDeque<TrainingOrder>> {
        self.state.training.get(&building)
    }

    fn content(&self) -> &MatchContent {
        self.content
    }
}

/// Anything that issues commands from a read-only view of the match.
pub trait CommandSource: Send {
    fn generate_commands(
        &mut self,
        view: &dyn MatchView,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope>;

    /// Drops all per-contestant memory. Called on match teardown.
    fn reset(&mut self) {}
}

/// Callbacks invoked synchronously from inside a tick. Implementations must not block.
pub trait MatchObserver: Send {
    fn on_state_update(&mut self, contestant: &ContestantId, snapshot: ContestantSnapshot);
    fn on_match_end(&mut self, result: &MatchResult);
    fn on_phase_change(&mut self, match_id: Uuid, phase: MatchPhase, payload: &PhasePayload);
}
