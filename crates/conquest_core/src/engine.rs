use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::combat::{fire_towers, resolve_combat};
use crate::commands::apply_commands;
use crate::economy::accrue_income;
use crate::id::generate_uuid;
use crate::intake::CommandQueue;
use crate::lifecycle::{
    all_humans_spawned, auto_assign_spawns, living_count, match_result, slot_of,
};
use crate::map::GameMap;
use crate::mapgen::{compute_spawn_sites, generate_map, map_size_for, MapGenError};
use crate::movement::advance_squads;
use crate::scoring::update_scores;
use crate::spatial::SpatialIndex;
use crate::supply::recompute_supply;
use crate::territory::advance_capture;
use crate::training::advance_training;
use crate::view::{CommandSource, MatchObserver, MatchReader};
use crate::visibility::build_snapshot;
use crate::{
    Command, Contestant, ContestantId, ContestantStats, Counters, EventEnvelope, JoinOutcome,
    MatchContent, MatchError, MatchEvent, MatchPhase, MatchResult, MatchState, MetaState,
    PhasePayload, PlayerSlot,
};

const PALETTE: [&str; 20] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6", "#bcf60c",
    "#fabebe", "#008080", "#e6beff", "#9a6324", "#fffac8", "#800000", "#aaffc3", "#808000",
    "#ffd8b1", "#000075", "#808080", "#ffe119",
];

/// One authoritative match. Single-threaded: the owner calls [`Match::tick`]
/// at a fixed rate; commands may be queued concurrently through
/// [`Match::command_queue`].
pub struct Match {
    state: MatchState,
    content: Arc<MatchContent>,
    rng: ChaCha8Rng,
    spatial: SpatialIndex,
    intake: CommandQueue,
    bots: Option<Box<dyn CommandSource>>,
    observer: Option<Box<dyn MatchObserver>>,
    /// Events raised between ticks, flushed into the next tick's list.
    pending_events: Vec<EventEnvelope>,
    final_result: Option<MatchResult>,
    destroyed: bool,
}

impl Match {
    pub fn new(content: Arc<MatchContent>, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let match_id = generate_uuid(&mut rng);
        let spatial = SpatialIndex::new(content.constants.spatial_cell_size);
        Self {
            state: MatchState {
                meta: MetaState {
                    match_id,
                    seed,
                    tick: 0,
                    phase: MatchPhase::Waiting,
                    phase_elapsed_secs: 0.0,
                },
                map: GameMap::empty(),
                contestants: Vec::new(),
                squads: Vec::new(),
                training: Default::default(),
                rally_points: Default::default(),
                spawn_sites: Vec::new(),
                counters: Counters::default(),
            },
            content,
            rng,
            spatial,
            intake: CommandQueue::new(),
            bots: None,
            observer: None,
            pending_events: Vec::new(),
            final_result: None,
            destroyed: false,
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn MatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn with_command_source(mut self, bots: Box<dyn CommandSource>) -> Self {
        self.bots = Some(bots);
        self
    }

    pub fn match_id(&self) -> Uuid {
        self.state.meta.match_id
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn content(&self) -> &MatchContent {
        &self.content
    }

    /// Read-only accessor surface shared with bots and transport.
    pub fn view(&self) -> MatchReader<'_> {
        MatchReader {
            state: &self.state,
            content: &self.content,
        }
    }

    /// Final standings once finished; provisional standings before that.
    pub fn result(&self) -> MatchResult {
        self.final_result
            .clone()
            .unwrap_or_else(|| match_result(&self.state, self.state.meta.phase_elapsed_secs))
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Handle for pushing commands from other threads.
    pub fn command_queue(&self) -> CommandQueue {
        self.intake.clone()
    }

    /// Queues a command for the start of the next tick.
    pub fn queue_command(&self, contestant: ContestantId, command: Command) {
        if self.destroyed {
            return;
        }
        self.intake.push(contestant, self.state.meta.tick, command);
    }

    // -----------------------------------------------------------------------
    // Roster
    // -----------------------------------------------------------------------

    pub fn add_contestant(&mut self, id: ContestantId, name: impl Into<String>) -> JoinOutcome {
        self.push_contestant(id, name.into(), false)
    }

    fn push_contestant(&mut self, id: ContestantId, name: String, is_bot: bool) -> JoinOutcome {
        if self.destroyed || self.state.meta.phase != MatchPhase::Waiting {
            return JoinOutcome::Closed;
        }
        if self.state.contestants.iter().any(|c| c.id == id) {
            return JoinOutcome::Duplicate;
        }
        if self.state.contestants.len() >= self.content.constants.max_contestants {
            return JoinOutcome::Full;
        }
        let index = self.state.contestants.len();
        let Ok(slot) = u16::try_from(index) else {
            return JoinOutcome::Full;
        };
        debug!(contestant = %id, is_bot, "contestant joined");
        self.state.contestants.push(Contestant {
            id,
            slot: PlayerSlot(slot),
            name,
            color: PALETTE[index % PALETTE.len()].to_string(),
            is_bot,
            gold: self.content.constants.starting_gold,
            income_rate: 0.0,
            territory: 0,
            capital: None,
            alive: true,
            score: 0.0,
            connected: true,
            spawned: false,
            stats: ContestantStats::default(),
        });
        JoinOutcome::Ok
    }

    /// Adds bots until the roster holds `target` contestants (capped at the
    /// contestant limit). Returns the ids of the bots added.
    pub fn fill_with_bots(&mut self, target: usize) -> Vec<ContestantId> {
        let target = target.min(self.content.constants.max_contestants);
        let mut added = Vec::new();
        let mut n = 0usize;
        while self.state.contestants.len() < target {
            n += 1;
            let id = ContestantId(format!("bot_{n:02}"));
            match self.push_contestant(id.clone(), format!("Bot {n}"), true) {
                JoinOutcome::Ok => added.push(id),
                JoinOutcome::Duplicate => {}
                JoinOutcome::Full | JoinOutcome::Closed => break,
            }
        }
        added
    }

    /// Marks a contestant's session as gone. In `Waiting` they leave the roster.
    pub fn player_disconnected(&mut self, id: &ContestantId) {
        if self.destroyed {
            return;
        }
        if self.state.meta.phase == MatchPhase::Waiting {
            self.state.contestants.retain(|c| &c.id != id);
            // Colour follows the slot.
            for (i, c) in self.state.contestants.iter_mut().enumerate() {
                c.slot = PlayerSlot(i as u16);
                c.color = PALETTE[i % PALETTE.len()].to_string();
            }
            return;
        }
        let Some(slot) = slot_of(&self.state, id) else {
            return;
        };
        let contestant = &mut self.state.contestants[slot.index()];
        if contestant.is_bot || !contestant.connected {
            return;
        }
        contestant.connected = false;
        let event = MatchEvent::ContestantDisconnected {
            contestant: id.clone(),
        };
        let tick = self.state.meta.tick;
        self.pending_events
            .push(crate::emit(&mut self.state.counters, tick, event));
    }

    pub fn player_reconnected(&mut self, id: &ContestantId) {
        if self.destroyed {
            return;
        }
        let Some(slot) = slot_of(&self.state, id) else {
            return;
        };
        let contestant = &mut self.state.contestants[slot.index()];
        if contestant.connected {
            return;
        }
        contestant.connected = true;
        let event = MatchEvent::ContestantReconnected {
            contestant: id.clone(),
        };
        let tick = self.state.meta.tick;
        self.pending_events
            .push(crate::emit(&mut self.state.counters, tick, event));
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Generates the map and opens spawn selection.
    pub fn start(&mut self) -> Result<(), MatchError> {
        self.check_startable()?;
        let constants = &self.content.constants;
        let size = map_size_for(constants, self.state.contestants.len());
        let map = generate_map(constants, size, size, self.state.meta.seed)?;
        self.start_with_map(map)
    }

    /// Opens spawn selection on a caller-supplied map.
    pub fn start_with_map(&mut self, map: GameMap) -> Result<(), MatchError> {
        self.check_startable()?;
        let n = self.state.contestants.len();
        let requested = (n * 2).max(n + 4);
        let sites = compute_spawn_sites(&map, &self.content.constants, requested);
        if sites.is_empty() {
            return Err(MapGenError::NoSpawnSites.into());
        }
        self.state.map = map;
        self.state.spawn_sites = sites;
        self.spatial.clear();

        let payload = PhasePayload::SpawnSelection {
            width: self.state.map.width(),
            height: self.state.map.height(),
            spawn_sites: self.state.spawn_sites.clone(),
            duration_secs: self.content.constants.spawn_selection_secs,
        };
        self.set_phase(MatchPhase::SpawnSelection, &payload);

        let mut events = Vec::new();
        auto_assign_spawns(
            &mut self.state,
            &self.content,
            &mut self.spatial,
            &mut self.rng,
            true,
            &mut events,
        );
        self.pending_events.extend(events);
        Ok(())
    }

    fn check_startable(&self) -> Result<(), MatchError> {
        if self.destroyed {
            return Err(MatchError::Destroyed);
        }
        if self.state.meta.phase != MatchPhase::Waiting {
            return Err(MatchError::InvalidPhase {
                expected: MatchPhase::Waiting,
                actual: self.state.meta.phase,
            });
        }
        if self.state.contestants.is_empty() {
            return Err(MatchError::NotEnoughContestants);
        }
        Ok(())
    }

    fn set_phase(&mut self, phase: MatchPhase, payload: &PhasePayload) {
        info!(
            match_id = %self.state.meta.match_id,
            from = ?self.state.meta.phase,
            to = ?phase,
            tick = self.state.meta.tick,
            "phase change"
        );
        self.state.meta.phase = phase;
        self.state.meta.phase_elapsed_secs = 0.0;
        let match_id = self.state.meta.match_id;
        if let Some(observer) = self.observer.as_mut() {
            observer.on_phase_change(match_id, phase, payload);
        }
    }

    /// Tears the match down. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.spatial.clear();
        self.state.training.clear();
        self.state.rally_points.clear();
        if let Some(mut bots) = self.bots.take() {
            bots.reset();
        }
        self.intake.clear();
        self.state.squads.clear();
        self.pending_events.clear();
        self.observer = None;
        info!(match_id = %self.state.meta.match_id, "match destroyed");
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advances the match by `dt` seconds (clamped) and returns this tick's events.
    pub fn tick(&mut self, dt: f64) -> Vec<EventEnvelope> {
        if self.destroyed {
            return Vec::new();
        }
        let phase = self.state.meta.phase;
        if matches!(phase, MatchPhase::Waiting | MatchPhase::Finished) {
            return Vec::new();
        }
        let max_dt = f64::from(self.content.constants.max_tick_dt_secs);
        let dt = if dt.is_finite() { dt.clamp(0.0, max_dt) } else { 0.0 };
        let dt_f32 = dt as f32;
        let content = Arc::clone(&self.content);
        let constants = &content.constants;

        let mut events = std::mem::take(&mut self.pending_events);
        let commands = self.intake.drain();
        apply_commands(
            &mut self.state,
            &content,
            &mut self.spatial,
            commands,
            &mut events,
        );
        self.state.meta.phase_elapsed_secs += dt;

        match self.state.meta.phase {
            MatchPhase::SpawnSelection => {
                let expired = self.state.meta.phase_elapsed_secs >= constants.spawn_selection_secs;
                if expired {
                    auto_assign_spawns(
                        &mut self.state,
                        &content,
                        &mut self.spatial,
                        &mut self.rng,
                        false,
                        &mut events,
                    );
                }
                if expired || all_humans_spawned(&self.state) {
                    let payload = PhasePayload::Playing {
                        duration_secs: constants.match_duration_secs,
                    };
                    self.set_phase(MatchPhase::Playing, &payload);
                }
            }
            MatchPhase::Playing => {
                self.run_bots();
                advance_training(
                    &mut self.state,
                    &content,
                    &mut self.spatial,
                    dt_f32,
                    &mut events,
                );
                advance_squads(&mut self.state, &content, &mut self.spatial, dt_f32);
                resolve_combat(
                    &mut self.state,
                    &content,
                    &mut self.spatial,
                    dt_f32,
                    &mut events,
                );
                fire_towers(
                    &mut self.state,
                    &content,
                    &mut self.spatial,
                    &mut self.rng,
                    dt_f32,
                    &mut events,
                );
                advance_capture(&mut self.state, &content, dt_f32, &mut events);
                let interval = constants.supply_check_interval_ticks.max(1);
                if self.state.meta.tick % interval == 0 {
                    recompute_supply(&mut self.state);
                }
                accrue_income(&mut self.state, constants, dt);
                update_scores(&mut self.state, constants);
                self.check_end(&mut events);
            }
            MatchPhase::Waiting | MatchPhase::Finished => {}
        }

        self.emit_snapshots(&events);
        self.state.meta.tick += 1;
        events
    }

    /// Bot commands go back into the intake and apply on the next tick.
    fn run_bots(&mut self) {
        let Some(bots) = self.bots.as_mut() else {
            return;
        };
        let mut next_command_id = self.state.counters.next_command_id;
        let view = MatchReader {
            state: &self.state,
            content: &self.content,
        };
        let commands = bots.generate_commands(&view, &mut next_command_id);
        self.state.counters.next_command_id = next_command_id;
        if !commands.is_empty() {
            self.intake.extend(commands);
        }
    }

    fn check_end(&mut self, events: &mut Vec<EventEnvelope>) {
        let constants = &self.content.constants;
        let timed_out = self.state.meta.phase_elapsed_secs >= constants.match_duration_secs;
        if !timed_out && living_count(&self.state) > 1 {
            return;
        }
        let result = match_result(&self.state, self.state.meta.phase_elapsed_secs);
        let winner = result
            .standings
            .first()
            .filter(|s| s.alive)
            .map(|s| s.contestant_id.clone());
        info!(
            match_id = %self.state.meta.match_id,
            winner = ?winner.as_ref().map(|w| w.0.as_str()),
            timed_out,
            "match finished"
        );
        let tick = self.state.meta.tick;
        events.push(crate::emit(
            &mut self.state.counters,
            tick,
            MatchEvent::MatchFinished { winner },
        ));
        let payload = PhasePayload::Finished {
            result: result.clone(),
        };
        self.set_phase(MatchPhase::Finished, &payload);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_match_end(&result);
        }
        self.final_result = Some(result);
    }

    fn emit_snapshots(&mut self, events: &[EventEnvelope]) {
        let Some(observer) = self.observer.as_mut() else {
            return;
        };
        let constants = &self.content.constants;
        let elapsed = self.state.meta.phase_elapsed_secs;
        let time_remaining = match self.state.meta.phase {
            MatchPhase::SpawnSelection => (constants.spawn_selection_secs - elapsed).max(0.0),
            MatchPhase::Playing => (constants.match_duration_secs - elapsed).max(0.0),
            MatchPhase::Waiting | MatchPhase::Finished => 0.0,
        };
        for contestant in self
            .state
            .contestants
            .iter()
            .filter(|c| !c.is_bot && c.connected)
        {
            if let Some(snapshot) =
                build_snapshot(&self.state, constants, contestant.slot, time_remaining, events)
            {
                observer.on_state_update(&contestant.id, snapshot);
            }
        }
    }
}

/// Direct state access for scenario setup in tests.
#[cfg(any(test, feature = "test-support"))]
impl Match {
    pub fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Re-indexes every squad after tests move them around by hand.
    pub fn sync_spatial(&mut self) {
        self.spatial.clear();
        for squad in &self.state.squads {
            self.spatial.upsert(squad.id, squad.owner, squad.position);
        }
    }
}
