//! Shared test fixtures for conquest_core and downstream crates.
//!
//! `base_content()` mirrors the shipped defaults closely enough for
//! end-to-end tests. `playing_match()` builds a match already past spawn
//! selection on an open plains map.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::map::GameMap;
use crate::{
    Command, Constants, ContestantId, ContestantSnapshot, Match, MatchContent, MatchObserver,
    MatchPhase, MatchResult, PhasePayload, StructureDef, StructureKind, Terrain, TilePos, UnitDef,
    UnitKind,
};

pub fn base_constants() -> Constants {
    Constants {
        max_contestants: 20,
        match_duration_secs: 1500.0,
        spawn_selection_secs: 20.0,
        ticks_per_sec: 10.0,
        max_tick_dt_secs: 0.25,
        map_base_size: 64,
        map_size_per_contestant: 6,
        map_max_size: 160,
        map_min_size: 24,
        noise_feature_size: 18.0,
        noise_octaves: 4,
        mountain_elevation: 0.74,
        water_elevation: 0.36,
        water_threshold: 0.55,
        forest_threshold: 0.55,
        resource_density: 0.006,
        resource_min_spacing: 6.0,
        resource_min_open: 15,
        passage_clear_probability: 0.5,
        spawn_edge_margin: 5,
        spawn_min_distance: 14.0,
        spawn_relaxed_factor: 0.6,
        spawn_open_radius: 3,
        spawn_min_open: 35,
        spawn_grid_step: 3,
        spawn_resource_cap: 12.0,
        spawn_claim_radius: 2,
        starting_squad_size: 5,
        starting_gold: 200.0,
        max_path_expansions: 20_000,
        spatial_cell_size: 4.0,
        spatial_max_search: 24.0,
        training_queue_max: 5,
        squad_merge_radius: 1.5,
        squad_size_cap: 12,
        front_line_size: 3,
        capture_rate_per_unit: 20.0,
        capture_occupier_cap: 3,
        supply_check_interval_ticks: 10,
        passive_income_per_tile: 0.05,
        resource_base_income: 1.5,
        resource_upgrade_bonus: 1.0,
        max_resource_upgrade: 3,
        diminishing_divisor: 150.0,
        diminishing_exponent: 1.5,
        score_per_tile: 10.0,
        score_per_kill: 5.0,
        score_per_capture: 20.0,
        score_per_gold: 0.1,
        owned_tile_vision: 2,
        fog_of_war_radius: 7,
        bot_interval_secs: 2.0,
        bot_interval_jitter_secs: 1.0,
        bot_threat_radius: 10.0,
        bot_threat_units: 4,
        bot_attack_army: 15,
        bot_attack_gold: 100.0,
        bot_attack_cooldown_secs: 60.0,
        bot_min_army: 5,
        bot_expand_radius: 20,
        bot_build_gold: 250.0,
        bot_gold_reserve: 40.0,
    }
}

#[allow(clippy::too_many_arguments)]
fn unit(
    kind: UnitKind,
    name: &str,
    hp: f32,
    damage: f32,
    range: f32,
    speed: f32,
    cost: f64,
    train_secs: f32,
    structure_multiplier: f32,
) -> UnitDef {
    UnitDef {
        kind,
        name: name.to_string(),
        hp,
        damage,
        range,
        speed,
        cost,
        train_secs,
        structure_multiplier,
    }
}

fn structure(kind: StructureKind, name: &str, hp: f32, cost: f64, buildable: bool) -> StructureDef {
    StructureDef {
        kind,
        name: name.to_string(),
        hp,
        cost,
        buildable,
        trains: Vec::new(),
        attack_range: 0.0,
        attack_damage: 0.0,
        fire_rate: 0.0,
    }
}

/// Three unit kinds and six structure kinds with the shipped balance.
pub fn base_content() -> MatchContent {
    let mut castle = structure(StructureKind::Castle, "Castle", 1000.0, 0.0, false);
    castle.trains = vec![UnitKind::Militia];
    let mut barracks = structure(StructureKind::Barracks, "Barracks", 400.0, 100.0, true);
    barracks.trains = vec![UnitKind::Militia, UnitKind::Archer, UnitKind::Knight];
    let mut tower = structure(StructureKind::Tower, "Tower", 300.0, 80.0, true);
    tower.attack_range = 5.0;
    tower.attack_damage = 15.0;
    tower.fire_rate = 1.0;

    MatchContent {
        content_version: "test".to_string(),
        units: vec![
            unit(UnitKind::Militia, "Militia", 100.0, 10.0, 1.0, 1.0, 10.0, 5.0, 1.0),
            unit(UnitKind::Archer, "Archer", 60.0, 8.0, 3.0, 1.0, 20.0, 7.0, 0.5),
            unit(UnitKind::Knight, "Knight", 200.0, 20.0, 1.0, 0.8, 40.0, 10.0, 3.0),
        ],
        structures: vec![
            castle,
            barracks,
            tower,
            structure(StructureKind::Wall, "Wall", 600.0, 20.0, true),
            structure(StructureKind::Road, "Road", 50.0, 5.0, true),
            structure(StructureKind::Mine, "Mine", 200.0, 60.0, true),
        ],
        constants: base_constants(),
    }
}

/// Open map of plains, every tile passable and buildable.
pub fn plains_map(width: i32, height: i32) -> GameMap {
    GameMap::filled(width, height, Terrain::Plains)
}

pub const ALICE_SPAWN: TilePos = TilePos::new(10, 10);
pub const BOB_SPAWN: TilePos = TilePos::new(30, 10);

/// Two human contestants ("alice", "bob") spawned on a 48×48 plains map,
/// already in `Playing` at tick 1.
pub fn playing_match() -> Match {
    playing_match_with(Arc::new(base_content()))
}

pub fn playing_match_with(content: Arc<MatchContent>) -> Match {
    let mut m = Match::new(content, 42);
    m.add_contestant("alice".into(), "Alice");
    m.add_contestant("bob".into(), "Bob");
    m.start_with_map(plains_map(48, 48))
        .expect("plains map always has spawn sites");
    m.queue_command("alice".into(), Command::SelectSpawn { at: ALICE_SPAWN });
    m.queue_command("bob".into(), Command::SelectSpawn { at: BOB_SPAWN });
    m.tick(0.1);
    assert_eq!(m.state().meta.phase, MatchPhase::Playing);
    m
}

/// Deterministic RNG seeded with 42.
pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub snapshots: Vec<(ContestantId, ContestantSnapshot)>,
    pub phases: Vec<(Uuid, MatchPhase)>,
    pub results: Vec<MatchResult>,
}

/// Observer that stores every callback for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    pub recorded: Arc<Mutex<Recorded>>,
}

impl MatchObserver for RecordingObserver {
    fn on_state_update(&mut self, contestant: &ContestantId, snapshot: ContestantSnapshot) {
        self.recorded
            .lock()
            .snapshots
            .push((contestant.clone(), snapshot));
    }

    fn on_match_end(&mut self, result: &MatchResult) {
        self.recorded.lock().results.push(result.clone());
    }

    fn on_phase_change(&mut self, match_id: Uuid, phase: MatchPhase, _payload: &PhasePayload) {
        self.recorded.lock().phases.push((match_id, phase));
    }
}
