//! Fog of war and per-contestant snapshots.

use crate::map::GameMap;
use crate::{
    Constants, ContestantId, ContestantSnapshot, EventEnvelope, MatchEvent, MatchState,
    PlayerSlot, RosterEntry, SquadSnapshot, TilePos, TileSnapshot,
};

fn reveal(map: &GameMap, mask: &mut [bool], center: TilePos, radius: i32) {
    let radius_sq = (radius * radius) as f32;
    let width = map.width();
    for pos in map.square(center, radius) {
        if pos.distance_sq(center) <= radius_sq {
            mask[(pos.y * width + pos.x) as usize] = true;
        }
    }
}

/// Row-major visibility for `viewer`: disks around owned tiles and around own squads.
pub fn visibility_mask(state: &MatchState, constants: &Constants, viewer: PlayerSlot) -> Vec<bool> {
    let map = &state.map;
    let mut mask = vec![false; (map.width() * map.height()) as usize];
    let owned: Vec<TilePos> = map
        .tiles()
        .filter(|(_, tile)| tile.owner == Some(viewer))
        .map(|(pos, _)| pos)
        .collect();
    for pos in owned {
        reveal(map, &mut mask, pos, constants.owned_tile_vision);
    }
    for squad in state.squads.iter().filter(|s| s.owner == viewer) {
        reveal(map, &mut mask, squad.tile(), constants.fog_of_war_radius);
    }
    mask
}

/// Whether `viewer` may hear about `event`: always for its own doings and
/// match-wide notices, otherwise only when the tile involved is in sight.
fn event_visible(
    event: &MatchEvent,
    viewer: &ContestantId,
    visible: impl Fn(TilePos) -> bool,
) -> bool {
    match event {
        MatchEvent::StructureBuilt { owner, at, .. }
        | MatchEvent::StructureUpgraded { owner, at, .. }
        | MatchEvent::StructureDestroyed { owner, at, .. }
        | MatchEvent::UnitTrained {
            owner, building: at, ..
        } => owner == viewer || visible(*at),
        MatchEvent::TileCaptured {
            at,
            new_owner,
            previous_owner,
        } => new_owner == viewer || previous_owner.as_ref() == Some(viewer) || visible(*at),
        MatchEvent::SquadDestroyed { owner, .. } => owner == viewer,
        MatchEvent::SpawnSelected { .. }
        | MatchEvent::ContestantEliminated { .. }
        | MatchEvent::ContestantDisconnected { .. }
        | MatchEvent::ContestantReconnected { .. }
        | MatchEvent::MatchFinished { .. } => true,
    }
}

pub(crate) fn build_snapshot(
    state: &MatchState,
    constants: &Constants,
    viewer: PlayerSlot,
    time_remaining_secs: f64,
    events: &[EventEnvelope],
) -> Option<ContestantSnapshot> {
    let contestant = state.contestants.get(viewer.index())?;
    let mask = visibility_mask(state, constants, viewer);
    let map = &state.map;
    let visible = |pos: TilePos| {
        map.in_bounds(pos) && mask[(pos.y * map.width() + pos.x) as usize]
    };

    let tiles = map
        .tiles()
        .zip(mask.iter())
        .filter(|(_, seen)| **seen)
        .map(|((at, tile), _)| TileSnapshot {
            at,
            terrain: tile.terrain,
            owner: tile.owner,
            structure: tile.structure_kind(),
            structure_hp: tile.structure.map(|s| s.hp),
            capture_progress: tile.capture_progress,
            capturing: tile.capturing,
        })
        .collect();

    let squads = state
        .squads
        .iter()
        .filter(|s| s.owner == viewer || visible(s.tile()))
        .map(|s| SquadSnapshot {
            id: s.id,
            owner: s.owner,
            position: s.position,
            units: s.units.to_vec(),
            destination: if s.owner == viewer {
                s.destination()
            } else {
                None
            },
        })
        .collect();

    let roster = state
        .contestants
        .iter()
        .map(|c| RosterEntry {
            id: c.id.clone(),
            slot: c.slot,
            name: c.name.clone(),
            color: c.color.clone(),
            alive: c.alive,
            score: c.score,
            is_bot: c.is_bot,
            territory: c.territory,
        })
        .collect();

    Some(ContestantSnapshot {
        tick: state.meta.tick,
        phase: state.meta.phase,
        time_remaining_secs,
        roster,
        gold: contestant.gold,
        income_rate: contestant.income_rate,
        tiles,
        squads,
        events: events
            .iter()
            .filter(|e| event_visible(&e.event, &contestant.id, &visible))
            .cloned()
            .collect(),
    })
}
