//! Command validation and application.
//!
//! Invalid commands are dropped without touching state. The reason is logged
//! at debug level and never reported back to the issuer.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::lifecycle::{claim_spawn, slot_of};
use crate::map::Structure;
use crate::pathfinding::find_path;
use crate::spatial::SpatialIndex;
use crate::squads::squad_index;
use crate::{
    Command, CommandEnvelope, EventEnvelope, MatchContent, MatchEvent, MatchPhase, MatchState,
    PlayerSlot, SquadId, StructureKind, Terrain, TilePos, TrainingOrder, UnitKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("issuer is not in the roster")]
    UnknownContestant,
    #[error("issuer has been eliminated")]
    Eliminated,
    #[error("command not accepted in the current phase")]
    WrongPhase,
    #[error("spawn already chosen")]
    AlreadySpawned,
    #[error("spawn location is not valid")]
    InvalidSpawn,
    #[error("no such squad")]
    UnknownSquad,
    #[error("target is not owned by the issuer")]
    NotOwner,
    #[error("no path to target")]
    NoPath,
    #[error("position is off the map")]
    OutOfBounds,
    #[error("structure cannot be built here")]
    NotBuildable,
    #[error("tile already has a structure")]
    Occupied,
    #[error("tile is cut off from the capital")]
    Disconnected,
    #[error("not enough gold")]
    Unaffordable,
    #[error("building cannot train that unit")]
    NotATrainer,
    #[error("training queue is full")]
    QueueFull,
}

pub(crate) fn apply_commands(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    commands: Vec<CommandEnvelope>,
    events: &mut Vec<EventEnvelope>,
) {
    for envelope in commands {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            apply_command(state, content, spatial, &envelope, events)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(rejection)) => debug!(
                command = %envelope.id,
                contestant = %envelope.issued_by,
                %rejection,
                "command dropped"
            ),
            Err(_) => warn!(
                command = %envelope.id,
                contestant = %envelope.issued_by,
                "command handler panicked"
            ),
        }
    }
}

fn apply_command(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    envelope: &CommandEnvelope,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), Rejection> {
    let slot = slot_of(state, &envelope.issued_by).ok_or(Rejection::UnknownContestant)?;
    if !state.contestants[slot.index()].alive {
        return Err(Rejection::Eliminated);
    }
    let phase = state.meta.phase;

    match envelope.command {
        Command::SelectSpawn { at } => {
            require_phase(phase, MatchPhase::SpawnSelection)?;
            claim_spawn(state, content, spatial, slot, at, events)
        }
        Command::MoveSquad { squad_id, target } => {
            require_phase(phase, MatchPhase::Playing)?;
            move_squad(state, content, slot, squad_id, target)
        }
        Command::BuildStructure { at, kind } => {
            require_phase(phase, MatchPhase::Playing)?;
            build_structure(state, content, slot, at, kind, events)
        }
        Command::TrainUnit { building, unit } => {
            require_phase(phase, MatchPhase::Playing)?;
            train_unit(state, content, slot, building, unit)
        }
        Command::SetRallyPoint { building, target } => {
            require_phase(phase, MatchPhase::Playing)?;
            set_rally_point(state, content, slot, building, target)
        }
    }
}

fn require_phase(actual: MatchPhase, expected: MatchPhase) -> Result<(), Rejection> {
    if actual == expected {
        Ok(())
    } else {
        Err(Rejection::WrongPhase)
    }
}

fn move_squad(
    state: &mut MatchState,
    content: &MatchContent,
    slot: PlayerSlot,
    squad_id: SquadId,
    target: TilePos,
) -> Result<(), Rejection> {
    let idx = squad_index(state, squad_id).ok_or(Rejection::UnknownSquad)?;
    if state.squads[idx].owner != slot {
        return Err(Rejection::NotOwner);
    }
    let target = state.map.clamp(target);
    let from = state.squads[idx].tile();
    let path = find_path(
        &state.map,
        from,
        target,
        content.constants.max_path_expansions,
    )
    .ok_or(Rejection::NoPath)?;

    let squad = &mut state.squads[idx];
    squad.path = (!path.is_empty()).then_some(path);
    squad.path_cursor = 0;
    Ok(())
}

fn build_structure(
    state: &mut MatchState,
    content: &MatchContent,
    slot: PlayerSlot,
    at: TilePos,
    kind: StructureKind,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), Rejection> {
    let def = content
        .structure(kind)
        .filter(|def| def.buildable)
        .ok_or(Rejection::NotBuildable)?;
    let tile = state.map.get(at).ok_or(Rejection::OutOfBounds)?;
    if tile.owner != Some(slot) {
        return Err(Rejection::NotOwner);
    }
    if !tile.connected {
        return Err(Rejection::Disconnected);
    }
    if !tile.terrain.is_buildable() {
        return Err(Rejection::NotBuildable);
    }
    // Mines only go on resource nodes; nothing else may cover one.
    if (kind == StructureKind::Mine) != (tile.terrain == Terrain::Resource) {
        return Err(Rejection::NotBuildable);
    }

    let max_level = content.constants.max_resource_upgrade;
    let (cost, upgrade_to) = match tile.structure {
        None => (def.cost, None),
        Some(existing)
            if existing.kind == StructureKind::Mine
                && kind == StructureKind::Mine
                && tile.resource_level < max_level =>
        {
            let next = tile.resource_level + 1;
            (def.cost * f64::from(next), Some(next))
        }
        Some(_) => return Err(Rejection::Occupied),
    };

    let contestant = &mut state.contestants[slot.index()];
    if contestant.gold < cost {
        return Err(Rejection::Unaffordable);
    }
    contestant.gold -= cost;
    let owner = contestant.id.clone();

    let Some(tile) = state.map.get_mut(at) else {
        return Err(Rejection::OutOfBounds);
    };
    let event = if let Some(level) = upgrade_to {
        tile.resource_level = level;
        MatchEvent::StructureUpgraded { owner, at, level }
    } else {
        tile.structure = Some(Structure::new(kind, def.hp));
        if kind == StructureKind::Mine {
            tile.resource_level = 1;
        }
        MatchEvent::StructureBuilt { owner, at, kind }
    };
    let tick = state.meta.tick;
    events.push(crate::emit(&mut state.counters, tick, event));
    Ok(())
}

fn owned_trainer<'a>(
    state: &MatchState,
    content: &'a MatchContent,
    slot: PlayerSlot,
    building: TilePos,
) -> Result<&'a [UnitKind], Rejection> {
    let tile = state.map.get(building).ok_or(Rejection::OutOfBounds)?;
    if tile.owner != Some(slot) {
        return Err(Rejection::NotOwner);
    }
    let kind = tile.structure_kind().ok_or(Rejection::NotATrainer)?;
    let trains = content
        .structure(kind)
        .map(|def| def.trains.as_slice())
        .unwrap_or_default();
    if trains.is_empty() {
        return Err(Rejection::NotATrainer);
    }
    Ok(trains)
}

fn train_unit(
    state: &mut MatchState,
    content: &MatchContent,
    slot: PlayerSlot,
    building: TilePos,
    unit: UnitKind,
) -> Result<(), Rejection> {
    let trains = owned_trainer(state, content, slot, building)?;
    if !trains.contains(&unit) {
        return Err(Rejection::NotATrainer);
    }
    if !state.map.get(building).is_some_and(|t| t.connected) {
        return Err(Rejection::Disconnected);
    }
    let def = content.unit(unit).ok_or(Rejection::NotATrainer)?;
    let queued = state.training.get(&building).map_or(0, |q| q.len());
    if queued >= content.constants.training_queue_max {
        return Err(Rejection::QueueFull);
    }
    let contestant = &mut state.contestants[slot.index()];
    if contestant.gold < def.cost {
        return Err(Rejection::Unaffordable);
    }
    contestant.gold -= def.cost;
    state
        .training
        .entry(building)
        .or_default()
        .push_back(TrainingOrder {
            unit,
            remaining_secs: def.train_secs,
            building,
        });
    Ok(())
}

fn set_rally_point(
    state: &mut MatchState,
    content: &MatchContent,
    slot: PlayerSlot,
    building: TilePos,
    target: TilePos,
) -> Result<(), Rejection> {
    owned_trainer(state, content, slot, building)?;
    if !state.map.in_bounds(target) {
        return Err(Rejection::OutOfBounds);
    }
    state.rally_points.insert(building, target);
    Ok(())
}
