//! Spawn claims, elimination and final standings.

use rand::seq::SliceRandom;
use rand::Rng;
use smallvec::SmallVec;
use tracing::info;

use crate::commands::Rejection;
use crate::map::Structure;
use crate::mapgen::is_valid_spawn;
use crate::spatial::SpatialIndex;
use crate::squads::create_squad;
use crate::{
    ContestantId, EventEnvelope, MatchContent, MatchEvent, MatchResult, MatchState, PlayerSlot,
    StructureKind, Standing, TilePos, Unit, UnitKind,
};

pub(crate) fn slot_of(state: &MatchState, id: &ContestantId) -> Option<PlayerSlot> {
    state
        .contestants
        .iter()
        .find(|c| &c.id == id)
        .map(|c| c.slot)
}

fn claimed_capitals(state: &MatchState) -> Vec<TilePos> {
    state.contestants.iter().filter_map(|c| c.capital).collect()
}

/// Validates and applies a manual spawn choice.
pub(crate) fn claim_spawn(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    slot: PlayerSlot,
    at: TilePos,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), Rejection> {
    if state.contestants[slot.index()].spawned {
        return Err(Rejection::AlreadySpawned);
    }
    if !is_valid_spawn(&state.map, &content.constants, at, &claimed_capitals(state)) {
        return Err(Rejection::InvalidSpawn);
    }
    found_capital(state, content, spatial, slot, at, events);
    Ok(())
}

/// Claims the area around `at`, places the castle and the starting squad.
fn found_capital(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    slot: PlayerSlot,
    at: TilePos,
    events: &mut Vec<EventEnvelope>,
) {
    let constants = &content.constants;
    let claimed: Vec<TilePos> = state
        .map
        .square(at, constants.spawn_claim_radius)
        .collect();
    for pos in claimed {
        let Some(tile) = state.map.get_mut(pos) else {
            continue;
        };
        if !tile.terrain.is_ownable() || tile.owner.is_some() {
            continue;
        }
        tile.owner = Some(slot);
        tile.connected = true;
        tile.capture_progress = 0.0;
        tile.capturing = None;
    }
    let castle_hp = content
        .structure(StructureKind::Castle)
        .map_or(1000.0, |def| def.hp);
    if let Some(tile) = state.map.get_mut(at) {
        tile.structure = Some(Structure::new(StructureKind::Castle, castle_hp));
    }

    let militia_hp = content.unit(UnitKind::Militia).map_or(1.0, |def| def.hp);
    let units: SmallVec<[Unit; 8]> = (0..constants.starting_squad_size)
        .map(|_| Unit {
            kind: UnitKind::Militia,
            hp: militia_hp,
            max_hp: militia_hp,
        })
        .collect();
    let squad_tile = state
        .map
        .neighbors4(at)
        .find(|p| state.map.is_passable(*p))
        .unwrap_or(at);
    if !units.is_empty() {
        create_squad(state, spatial, slot, units, squad_tile.center());
    }

    let min_sq = constants.spawn_min_distance * constants.spawn_min_distance;
    state.spawn_sites.retain(|site| site.distance_sq(at) >= min_sq);

    let territory = state.map.owned_count(slot);
    let contestant = &mut state.contestants[slot.index()];
    contestant.capital = Some(at);
    contestant.spawned = true;
    contestant.territory = territory;
    info!(contestant = %contestant.id, x = at.x, y = at.y, "spawn claimed");
    let id = contestant.id.clone();
    let tick = state.meta.tick;
    events.push(crate::emit(
        &mut state.counters,
        tick,
        MatchEvent::SpawnSelected { contestant: id, at },
    ));
}

/// Places every living, unspawned contestant matching `filter` on a remaining
/// site. Contestants left without a site are eliminated.
pub(crate) fn auto_assign_spawns(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    rng: &mut impl Rng,
    bots_only: bool,
    events: &mut Vec<EventEnvelope>,
) {
    let constants = &content.constants;
    let relaxed = constants.spawn_min_distance * constants.spawn_relaxed_factor;
    let relaxed_sq = relaxed * relaxed;
    let pending: Vec<PlayerSlot> = state
        .contestants
        .iter()
        .filter(|c| c.alive && !c.spawned && (c.is_bot || !bots_only))
        .map(|c| c.slot)
        .collect();

    for slot in pending {
        let capitals = claimed_capitals(state);
        let mut sites: Vec<TilePos> = state
            .spawn_sites
            .iter()
            .copied()
            .filter(|site| capitals.iter().all(|c| c.distance_sq(*site) >= relaxed_sq))
            .collect();
        sites.shuffle(rng);
        match sites.first() {
            Some(&site) => found_capital(state, content, spatial, slot, site, events),
            None => {
                info!(contestant = %state.contestants[slot.index()].id, "no spawn site left");
                eliminate(state, spatial, slot, events);
            }
        }
    }
}

pub(crate) fn all_humans_spawned(state: &MatchState) -> bool {
    state
        .contestants
        .iter()
        .filter(|c| c.alive && !c.is_bot)
        .all(|c| c.spawned)
}

/// Removes a contestant from play: squads, territory, queues and claims.
pub(crate) fn eliminate(
    state: &mut MatchState,
    spatial: &mut SpatialIndex,
    slot: PlayerSlot,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(contestant) = state.contestants.get_mut(slot.index()) else {
        return;
    };
    if !contestant.alive {
        return;
    }
    contestant.alive = false;
    contestant.territory = 0;
    contestant.income_rate = 0.0;
    let id = contestant.id.clone();

    for squad in state.squads.iter().filter(|s| s.owner == slot) {
        spatial.remove(squad.id);
    }
    state.squads.retain(|s| s.owner != slot);

    let mut owned = Vec::new();
    for (pos, tile) in state.map.tiles_mut() {
        if tile.owner == Some(slot) {
            tile.reset_ownership();
            owned.push(pos);
        } else if tile.capturing == Some(slot) {
            tile.capturing = None;
            tile.capture_progress = 0.0;
        }
    }
    for pos in owned {
        state.training.remove(&pos);
        state.rally_points.remove(&pos);
    }

    info!(contestant = %id, tick = state.meta.tick, "contestant eliminated");
    let tick = state.meta.tick;
    events.push(crate::emit(
        &mut state.counters,
        tick,
        MatchEvent::ContestantEliminated { contestant: id },
    ));
}

pub(crate) fn living_count(state: &MatchState) -> usize {
    state.contestants.iter().filter(|c| c.alive).count()
}

/// Living contestants first, then by score, then by roster order.
pub(crate) fn standings(state: &MatchState) -> Vec<Standing> {
    let mut order: Vec<usize> = (0..state.contestants.len()).collect();
    order.sort_by(|&a, &b| {
        let ca = &state.contestants[a];
        let cb = &state.contestants[b];
        cb.alive
            .cmp(&ca.alive)
            .then_with(|| cb.score.total_cmp(&ca.score))
            .then_with(|| a.cmp(&b))
    });
    order
        .into_iter()
        .enumerate()
        .map(|(rank, i)| {
            let c = &state.contestants[i];
            Standing {
                contestant_id: c.id.clone(),
                name: c.name.clone(),
                is_bot: c.is_bot,
                alive: c.alive,
                score: c.score,
                territory: c.territory,
                kills: c.stats.kills,
                losses: c.stats.losses,
                captures: c.stats.captures,
                gold_earned: c.stats.gold_earned,
                placement: rank as u32 + 1,
            }
        })
        .collect()
}

pub(crate) fn match_result(state: &MatchState, duration_secs: f64) -> MatchResult {
    MatchResult {
        match_id: state.meta.match_id,
        duration_secs,
        standings: standings(state),
    }
}
