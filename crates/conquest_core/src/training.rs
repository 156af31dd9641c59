use smallvec::smallvec;
use tracing::trace;

use crate::pathfinding::find_path;
use crate::spatial::SpatialIndex;
use crate::squads::{create_squad, squad_index};
use crate::{
    EventEnvelope, MatchContent, MatchEvent, MatchState, PlayerSlot, TilePos, TrainingOrder, Unit,
};

/// Counts down the head of every queue. Queues on disconnected buildings pause;
/// queues whose building is gone are dropped.
pub(crate) fn advance_training(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    dt: f32,
    events: &mut Vec<EventEnvelope>,
) {
    let buildings: Vec<TilePos> = state.training.keys().copied().collect();
    for building in buildings {
        let Some((owner, connected)) = state
            .map
            .get(building)
            .filter(|tile| tile.structure.is_some())
            .and_then(|tile| tile.owner.map(|owner| (owner, tile.connected)))
        else {
            state.training.remove(&building);
            continue;
        };
        if !connected {
            continue;
        }
        let Some(queue) = state.training.get_mut(&building) else {
            continue;
        };
        let Some(head) = queue.front_mut() else {
            state.training.remove(&building);
            continue;
        };
        head.remaining_secs -= dt;
        if head.remaining_secs > 0.0 {
            continue;
        }
        let Some(order) = queue.pop_front() else {
            continue;
        };
        if queue.is_empty() {
            state.training.remove(&building);
        }
        deliver_unit(state, content, spatial, owner, order, events);
    }
}

fn deliver_unit(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    owner: PlayerSlot,
    order: TrainingOrder,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(def) = content.unit(order.unit) else {
        return;
    };
    let unit = Unit {
        kind: order.unit,
        hp: def.hp,
        max_hp: def.hp,
    };
    let building = order.building;
    let exit = state
        .map
        .neighbors4(building)
        .find(|p| state.map.is_passable(*p))
        .unwrap_or(building);
    let position = exit.center();
    let constants = &content.constants;

    let squad_id = match state.rally_points.get(&building).copied() {
        None => {
            let merge_target = spatial
                .friendlies_in_range(position, owner, constants.squad_merge_radius)
                .into_iter()
                .filter_map(|hit| squad_index(state, hit.squad))
                .find(|&idx| {
                    let squad = &state.squads[idx];
                    !squad.is_moving() && squad.units.len() < constants.squad_size_cap
                });
            if let Some(idx) = merge_target {
                state.squads[idx].units.push(unit);
                state.squads[idx].id
            } else {
                create_squad(state, spatial, owner, smallvec![unit], position)
            }
        }
        Some(rally) => {
            let id = create_squad(state, spatial, owner, smallvec![unit], position);
            if let Some(path) = find_path(&state.map, exit, rally, constants.max_path_expansions)
                .filter(|path| !path.is_empty())
            {
                if let Some(idx) = squad_index(state, id) {
                    state.squads[idx].path = Some(path);
                    state.squads[idx].path_cursor = 0;
                }
            }
            id
        }
    };

    trace!(building.x = building.x, building.y = building.y, squad = squad_id.0, "unit trained");
    let Some(owner_id) = state.contestants.get(owner.index()).map(|c| c.id.clone()) else {
        return;
    };
    let tick = state.meta.tick;
    events.push(crate::emit(
        &mut state.counters,
        tick,
        MatchEvent::UnitTrained {
            owner: owner_id,
            building,
            unit: order.unit,
            squad_id,
        },
    ));
}
