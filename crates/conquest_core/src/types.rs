//! Type definitions for `conquest_core`.
//!
//! All public types, structs, enums, and ID newtypes used by the match simulation.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::map::GameMap;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(ContestantId);
string_id!(CommandId);
string_id!(EventId);

/// Index of a contestant in the match roster. Stable for the life of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerSlot(pub u16);

impl PlayerSlot {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SquadId(pub u64);

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn chebyshev(self, other: TilePos) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    pub fn distance_sq(self, other: TilePos) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        dx * dx + dy * dy
    }

    pub fn center(self) -> Position {
        Position {
            x: self.x as f32 + 0.5,
            y: self.y as f32 + 0.5,
        }
    }

    pub fn neighbors4(self) -> [TilePos; 4] {
        [
            TilePos::new(self.x + 1, self.y),
            TilePos::new(self.x, self.y + 1),
            TilePos::new(self.x - 1, self.y),
            TilePos::new(self.x, self.y - 1),
        ]
    }
}

/// Continuous world position in tile units. Tile `(x, y)` covers `[x, x+1) × [y, y+1)`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn tile(self) -> TilePos {
        TilePos::new(self.x.floor() as i32, self.y.floor() as i32)
    }

    pub fn distance_sq(self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Plains,
    Forest,
    Mountain,
    Resource,
    Water,
}

impl Terrain {
    pub fn is_passable(self) -> bool {
        self != Terrain::Mountain
    }

    pub fn is_ownable(self) -> bool {
        self != Terrain::Mountain
    }

    pub fn is_buildable(self) -> bool {
        !matches!(self, Terrain::Mountain | Terrain::Water)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructureKind {
    Castle,
    Barracks,
    Tower,
    Wall,
    Road,
    Mine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    Militia,
    Archer,
    Knight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    Waiting,
    SpawnSelection,
    Playing,
    Finished,
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

/// All mutable match truth. Owned exclusively by [`crate::Match`].
#[derive(Debug, Clone)]
pub struct MatchState {
    pub meta: MetaState,
    pub map: GameMap,
    pub contestants: Vec<Contestant>,
    pub squads: Vec<Squad>,
    /// FIFO training queue per building tile.
    pub training: BTreeMap<TilePos, VecDeque<TrainingOrder>>,
    pub rally_points: BTreeMap<TilePos, TilePos>,
    /// Candidate spawn sites computed at match start; claimed sites are removed.
    pub spawn_sites: Vec<TilePos>,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub match_id: Uuid,
    pub seed: u64,
    pub tick: u64,
    pub phase: MatchPhase,
    /// Seconds spent in the current phase.
    pub phase_elapsed_secs: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_command_id: u64,
    pub next_squad_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contestant {
    pub id: ContestantId,
    pub slot: PlayerSlot,
    pub name: String,
    pub color: String,
    pub is_bot: bool,
    pub gold: f64,
    /// Gold per second, recomputed every tick.
    pub income_rate: f64,
    pub territory: u32,
    pub capital: Option<TilePos>,
    pub alive: bool,
    pub score: f64,
    /// Transport session flag. Bots are always connected.
    pub connected: bool,
    pub spawned: bool,
    pub stats: ContestantStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContestantStats {
    pub kills: u32,
    pub losses: u32,
    pub captures: u32,
    pub gold_earned: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub kind: UnitKind,
    pub hp: f32,
    pub max_hp: f32,
}

pub type UnitList = SmallVec<[Unit; 8]>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Squad {
    pub id: SquadId,
    pub owner: PlayerSlot,
    pub units: UnitList,
    pub position: Position,
    pub path: Option<Vec<TilePos>>,
    pub path_cursor: usize,
}

impl Squad {
    pub fn tile(&self) -> TilePos {
        self.position.tile()
    }

    pub fn is_moving(&self) -> bool {
        self.path
            .as_ref()
            .is_some_and(|path| self.path_cursor < path.len())
    }

    pub fn destination(&self) -> Option<TilePos> {
        self.path.as_ref().and_then(|path| path.last().copied())
    }

    pub fn next_waypoint(&self) -> Option<TilePos> {
        self.path
            .as_ref()
            .and_then(|path| path.get(self.path_cursor).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingOrder {
    pub unit: UnitKind,
    pub remaining_secs: f32,
    pub building: TilePos,
}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_by: ContestantId,
    pub issued_tick: u64,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SelectSpawn {
        at: TilePos,
    },
    MoveSquad {
        squad_id: SquadId,
        target: TilePos,
    },
    BuildStructure {
        at: TilePos,
        kind: StructureKind,
    },
    TrainUnit {
        building: TilePos,
        unit: UnitKind,
    },
    SetRallyPoint {
        building: TilePos,
        target: TilePos,
    },
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: MatchEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    SpawnSelected {
        contestant: ContestantId,
        at: TilePos,
    },
    StructureBuilt {
        owner: ContestantId,
        at: TilePos,
        kind: StructureKind,
    },
    StructureUpgraded {
        owner: ContestantId,
        at: TilePos,
        level: u8,
    },
    StructureDestroyed {
        owner: ContestantId,
        at: TilePos,
        kind: StructureKind,
    },
    UnitTrained {
        owner: ContestantId,
        building: TilePos,
        unit: UnitKind,
        squad_id: SquadId,
    },
    SquadDestroyed {
        owner: ContestantId,
        squad_id: SquadId,
    },
    TileCaptured {
        at: TilePos,
        new_owner: ContestantId,
        previous_owner: Option<ContestantId>,
    },
    ContestantEliminated {
        contestant: ContestantId,
    },
    ContestantDisconnected {
        contestant: ContestantId,
    },
    ContestantReconnected {
        contestant: ContestantId,
    },
    MatchFinished {
        winner: Option<ContestantId>,
    },
}

// ---------------------------------------------------------------------------
// Collaborator-facing types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinOutcome {
    Ok,
    Full,
    Duplicate,
    /// The match has already left `Waiting`.
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhasePayload {
    SpawnSelection {
        width: i32,
        height: i32,
        spawn_sites: Vec<TilePos>,
        duration_secs: f64,
    },
    Playing {
        duration_secs: f64,
    },
    Finished {
        result: MatchResult,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: Uuid,
    pub duration_secs: f64,
    pub standings: Vec<Standing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standing {
    pub contestant_id: ContestantId,
    pub name: String,
    pub is_bot: bool,
    pub alive: bool,
    pub score: f64,
    pub territory: u32,
    pub kills: u32,
    pub losses: u32,
    pub captures: u32,
    pub gold_earned: f64,
    pub placement: u32,
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Fog-of-war filtered view of the match for one contestant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestantSnapshot {
    pub tick: u64,
    pub phase: MatchPhase,
    pub time_remaining_secs: f64,
    pub roster: Vec<RosterEntry>,
    pub gold: f64,
    pub income_rate: f64,
    pub tiles: Vec<TileSnapshot>,
    pub squads: Vec<SquadSnapshot>,
    pub events: Vec<EventEnvelope>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: ContestantId,
    pub slot: PlayerSlot,
    pub name: String,
    pub color: String,
    pub alive: bool,
    pub score: f64,
    pub is_bot: bool,
    pub territory: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSnapshot {
    pub at: TilePos,
    pub terrain: Terrain,
    pub owner: Option<PlayerSlot>,
    pub structure: Option<StructureKind>,
    pub structure_hp: Option<f32>,
    pub capture_progress: f32,
    pub capturing: Option<PlayerSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadSnapshot {
    pub id: SquadId,
    pub owner: PlayerSlot,
    pub position: Position,
    pub units: Vec<Unit>,
    /// Only present on the viewer's own squads.
    pub destination: Option<TilePos>,
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchContent {
    pub content_version: String,
    pub units: Vec<UnitDef>,
    pub structures: Vec<StructureDef>,
    pub constants: Constants,
}

impl MatchContent {
    pub fn unit(&self, kind: UnitKind) -> Option<&UnitDef> {
        self.units.iter().find(|def| def.kind == kind)
    }

    pub fn structure(&self, kind: StructureKind) -> Option<&StructureDef> {
        self.structures.iter().find(|def| def.kind == kind)
    }

    /// Widest attack range of any unit kind, used as the combat search radius.
    pub fn max_unit_range(&self) -> f32 {
        self.units.iter().map(|def| def.range).fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDef {
    pub kind: UnitKind,
    pub name: String,
    pub hp: f32,
    /// Damage per second against squads.
    pub damage: f32,
    /// Attack range in tiles.
    pub range: f32,
    /// Tiles per second on plains.
    pub speed: f32,
    pub cost: f64,
    pub train_secs: f32,
    /// Multiplier applied when damaging structures.
    #[serde(default = "default_structure_multiplier")]
    pub structure_multiplier: f32,
}

fn default_structure_multiplier() -> f32 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureDef {
    pub kind: StructureKind,
    pub name: String,
    pub hp: f32,
    pub cost: f64,
    pub buildable: bool,
    /// Unit kinds this structure can train.
    #[serde(default)]
    pub trains: Vec<UnitKind>,
    #[serde(default)]
    pub attack_range: f32,
    #[serde(default)]
    pub attack_damage: f32,
    /// Shots per second.
    #[serde(default)]
    pub fire_rate: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    // Match lifecycle
    pub max_contestants: usize,
    pub match_duration_secs: f64,
    pub spawn_selection_secs: f64,
    pub ticks_per_sec: f64,
    pub max_tick_dt_secs: f32,
    // Map generation
    pub map_base_size: i32,
    pub map_size_per_contestant: i32,
    pub map_max_size: i32,
    pub map_min_size: i32,
    pub noise_feature_size: f32,
    pub noise_octaves: u32,
    pub mountain_elevation: f32,
    pub water_elevation: f32,
    pub water_threshold: f32,
    pub forest_threshold: f32,
    pub resource_density: f32,
    pub resource_min_spacing: f32,
    pub resource_min_open: u32,
    pub passage_clear_probability: f32,
    // Spawns
    pub spawn_edge_margin: i32,
    pub spawn_min_distance: f32,
    pub spawn_relaxed_factor: f32,
    pub spawn_open_radius: i32,
    pub spawn_min_open: u32,
    pub spawn_grid_step: i32,
    pub spawn_resource_cap: f32,
    pub spawn_claim_radius: i32,
    pub starting_squad_size: usize,
    pub starting_gold: f64,
    // Pathfinding / spatial
    pub max_path_expansions: usize,
    pub spatial_cell_size: f32,
    pub spatial_max_search: f32,
    // Training
    pub training_queue_max: usize,
    pub squad_merge_radius: f32,
    pub squad_size_cap: usize,
    // Combat and capture
    pub front_line_size: usize,
    pub capture_rate_per_unit: f32,
    pub capture_occupier_cap: usize,
    pub supply_check_interval_ticks: u64,
    // Economy and score
    pub passive_income_per_tile: f64,
    pub resource_base_income: f64,
    pub resource_upgrade_bonus: f64,
    pub max_resource_upgrade: u8,
    pub diminishing_divisor: f64,
    pub diminishing_exponent: f64,
    pub score_per_tile: f64,
    pub score_per_kill: f64,
    pub score_per_capture: f64,
    pub score_per_gold: f64,
    // Visibility
    pub owned_tile_vision: i32,
    pub fog_of_war_radius: i32,
    // Bots
    pub bot_interval_secs: f64,
    pub bot_interval_jitter_secs: f64,
    pub bot_threat_radius: f32,
    pub bot_threat_units: usize,
    pub bot_attack_army: usize,
    pub bot_attack_gold: f64,
    pub bot_attack_cooldown_secs: f64,
    pub bot_min_army: usize,
    pub bot_expand_radius: i32,
    pub bot_build_gold: f64,
    pub bot_gold_reserve: f64,
}
