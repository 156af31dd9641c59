use crate::spatial::SpatialIndex;
use crate::{
    EventEnvelope, MatchEvent, MatchState, PlayerSlot, Position, Squad, SquadId, Unit, UnitList,
};

pub(crate) fn create_squad(
    state: &mut MatchState,
    spatial: &mut SpatialIndex,
    owner: PlayerSlot,
    units: UnitList,
    position: Position,
) -> SquadId {
    let id = SquadId(state.counters.next_squad_id);
    state.counters.next_squad_id += 1;
    state.squads.push(Squad {
        id,
        owner,
        units,
        position,
        path: None,
        path_cursor: 0,
    });
    spatial.upsert(id, owner, position);
    id
}

pub(crate) fn squad_index(state: &MatchState, id: SquadId) -> Option<usize> {
    state.squads.iter().position(|s| s.id == id)
}

/// Spreads `amount` evenly over the front `front_line` units, then drops the dead.
/// Returns how many units died.
pub(crate) fn apply_squad_damage(units: &mut UnitList, amount: f32, front_line: usize) -> u32 {
    let front = units.len().min(front_line.max(1));
    if front == 0 || amount <= 0.0 {
        return 0;
    }
    let share = amount / front as f32;
    for unit in units.iter_mut().take(front) {
        unit.hp -= share;
    }
    let before = units.len();
    units.retain(|u: &mut Unit| u.hp > 0.0);
    (before - units.len()) as u32
}

/// Removes squads with no units left from the arena and the spatial index.
pub(crate) fn remove_empty_squads(
    state: &mut MatchState,
    spatial: &mut SpatialIndex,
    events: &mut Vec<EventEnvelope>,
) {
    let tick = state.meta.tick;
    let mut removed = Vec::new();
    state.squads.retain(|squad| {
        if squad.units.is_empty() {
            removed.push((squad.id, squad.owner));
            false
        } else {
            true
        }
    });
    for (squad_id, owner) in removed {
        spatial.remove(squad_id);
        let Some(owner) = state.contestants.get(owner.index()).map(|c| c.id.clone()) else {
            continue;
        };
        events.push(crate::emit(
            &mut state.counters,
            tick,
            MatchEvent::SquadDestroyed { owner, squad_id },
        ));
    }
}
