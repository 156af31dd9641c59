//! Squad-versus-squad fighting, siege damage and tower fire.

use ahash::AHashMap;
use rand::Rng;

use crate::lifecycle::eliminate;
use crate::spatial::SpatialIndex;
use crate::squads::{apply_squad_damage, remove_empty_squads, squad_index};
use crate::{
    EventEnvelope, MatchContent, MatchEvent, MatchState, PlayerSlot, Squad, SquadId,
    StructureKind, TilePos,
};

/// Damage per second `squad` deals at `distance`. Units out of range contribute nothing.
fn squad_output(squad: &Squad, distance: f32, content: &MatchContent) -> f32 {
    squad
        .units
        .iter()
        .filter_map(|unit| content.unit(unit.kind))
        .filter(|def| def.range >= distance)
        .map(|def| def.damage)
        .sum()
}

fn siege_output(squad: &Squad, content: &MatchContent) -> f32 {
    squad
        .units
        .iter()
        .filter_map(|unit| content.unit(unit.kind))
        .map(|def| def.damage * def.structure_multiplier)
        .sum()
}

pub(crate) fn resolve_combat(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    dt: f32,
    events: &mut Vec<EventEnvelope>,
) {
    fight_squads(state, content, spatial, dt);
    siege_structures(state, content, spatial, dt, events);
    remove_empty_squads(state, spatial, events);
}

/// Every engaged pair trades damage computed from the state at the start of
/// the step, so resolution order never matters.
fn fight_squads(state: &mut MatchState, content: &MatchContent, spatial: &SpatialIndex, dt: f32) {
    let engage = content.max_unit_range();
    let index: AHashMap<SquadId, usize> = state
        .squads
        .iter()
        .enumerate()
        .map(|(i, squad)| (squad.id, i))
        .collect();

    // (victim index, attacking owner, damage)
    let mut strikes: Vec<(usize, PlayerSlot, f32)> = Vec::new();
    for (i, squad) in state.squads.iter().enumerate() {
        for hit in spatial.enemies_in_range(squad.position, squad.owner, engage) {
            let Some(&j) = index.get(&hit.squad) else {
                continue;
            };
            let other = &state.squads[j];
            if other.id <= squad.id {
                continue;
            }
            let distance = hit.distance_sq.sqrt();
            let dealt = squad_output(squad, distance, content) * dt;
            let taken = squad_output(other, distance, content) * dt;
            if dealt > 0.0 {
                strikes.push((j, squad.owner, dealt));
            }
            if taken > 0.0 {
                strikes.push((i, other.owner, taken));
            }
        }
    }

    let front_line = content.constants.front_line_size;
    for (victim, attacker, amount) in strikes {
        let squad = &mut state.squads[victim];
        let victim_owner = squad.owner;
        let killed = apply_squad_damage(&mut squad.units, amount, front_line);
        if killed == 0 {
            continue;
        }
        if let Some(c) = state.contestants.get_mut(attacker.index()) {
            c.stats.kills += killed;
        }
        if let Some(c) = state.contestants.get_mut(victim_owner.index()) {
            c.stats.losses += killed;
        }
    }
}

/// Squads standing on an enemy structure wear it down. A destroyed castle
/// eliminates its owner.
fn siege_structures(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    dt: f32,
    events: &mut Vec<EventEnvelope>,
) {
    let mut destroyed: Vec<(PlayerSlot, TilePos, StructureKind)> = Vec::new();
    for squad in &state.squads {
        let pos = squad.tile();
        let Some(tile) = state.map.get_mut(pos) else {
            continue;
        };
        let Some(owner) = tile.owner.filter(|owner| *owner != squad.owner) else {
            continue;
        };
        let Some(structure) = tile.structure.as_mut() else {
            continue;
        };
        structure.hp -= siege_output(squad, content) * dt;
        if structure.hp > 0.0 {
            continue;
        }
        let kind = structure.kind;
        tile.structure = None;
        if kind == StructureKind::Mine {
            tile.resource_level = 0;
        }
        destroyed.push((owner, pos, kind));
    }

    let tick = state.meta.tick;
    for (owner, at, kind) in destroyed {
        state.training.remove(&at);
        state.rally_points.remove(&at);
        let Some(owner_id) = state.contestants.get(owner.index()).map(|c| c.id.clone()) else {
            continue;
        };
        events.push(crate::emit(
            &mut state.counters,
            tick,
            MatchEvent::StructureDestroyed {
                owner: owner_id,
                at,
                kind,
            },
        ));
        if kind == StructureKind::Castle {
            eliminate(state, spatial, owner, events);
        }
    }
}

/// Towers shoot the nearest enemy squad in range, hitting a random front-line unit.
pub(crate) fn fire_towers(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    rng: &mut impl Rng,
    dt: f32,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(def) = content.structure(StructureKind::Tower) else {
        return;
    };
    if def.fire_rate <= 0.0 || def.attack_damage <= 0.0 {
        return;
    }
    let towers: Vec<(TilePos, PlayerSlot)> = state
        .map
        .tiles()
        .filter(|(_, tile)| tile.structure_kind() == Some(StructureKind::Tower))
        .filter_map(|(pos, tile)| tile.owner.map(|owner| (pos, owner)))
        .collect();
    if towers.is_empty() {
        return;
    }

    let front_line = content.constants.front_line_size.max(1);
    let mut any_killed = false;
    for (pos, owner) in towers {
        let ready = state
            .map
            .get_mut(pos)
            .and_then(|tile| tile.structure.as_mut())
            .is_some_and(|structure| {
                structure.cooldown = (structure.cooldown - dt).max(0.0);
                structure.cooldown <= 0.0
            });
        if !ready {
            continue;
        }
        let Some(hit) = spatial.nearest_enemy(pos.center(), owner, def.attack_range) else {
            continue;
        };
        let Some(idx) = squad_index(state, hit.squad) else {
            continue;
        };
        if let Some(structure) = state.map.get_mut(pos).and_then(|t| t.structure.as_mut()) {
            structure.cooldown = 1.0 / def.fire_rate;
        }

        let squad = &mut state.squads[idx];
        if squad.units.is_empty() {
            continue;
        }
        let victim_owner = squad.owner;
        let target = rng.gen_range(0..squad.units.len().min(front_line));
        squad.units[target].hp -= def.attack_damage;
        if squad.units[target].hp > 0.0 {
            continue;
        }
        squad.units.remove(target);
        any_killed = true;
        if let Some(c) = state.contestants.get_mut(owner.index()) {
            c.stats.kills += 1;
        }
        if let Some(c) = state.contestants.get_mut(victim_owner.index()) {
            c.stats.losses += 1;
        }
    }
    if any_killed {
        remove_empty_squads(state, spatial, events);
    }
}
