//! Tile capture by occupation.

use std::collections::BTreeMap;

use crate::map::MAX_CAPTURE_PROGRESS;
use crate::{EventEnvelope, MatchContent, MatchEvent, MatchState, PlayerSlot, TilePos};

#[derive(Debug, Clone, Copy)]
struct Occupancy {
    owner: PlayerSlot,
    units: usize,
    contested: bool,
}

fn occupancy(state: &MatchState) -> BTreeMap<TilePos, Occupancy> {
    let mut occupied: BTreeMap<TilePos, Occupancy> = BTreeMap::new();
    for squad in &state.squads {
        let entry = occupied.entry(squad.tile()).or_insert(Occupancy {
            owner: squad.owner,
            units: 0,
            contested: false,
        });
        if entry.owner == squad.owner {
            entry.units += squad.units.len();
        } else {
            entry.contested = true;
        }
    }
    occupied
}

/// Progress moves only on tiles held by a single owner. Ownership transfers
/// the moment progress reaches the cap.
pub(crate) fn advance_capture(
    state: &mut MatchState,
    content: &MatchContent,
    dt: f32,
    events: &mut Vec<EventEnvelope>,
) {
    let constants = &content.constants;
    let mut captured: Vec<(TilePos, PlayerSlot, Option<PlayerSlot>)> = Vec::new();

    for (pos, occ) in occupancy(state) {
        if occ.contested || occ.units == 0 {
            continue;
        }
        let Some(tile) = state.map.get_mut(pos) else {
            continue;
        };
        if !tile.terrain.is_ownable() {
            continue;
        }
        if tile.owner == Some(occ.owner) {
            tile.capture_progress = 0.0;
            tile.capturing = None;
            continue;
        }
        // An enemy structure must be razed before the tile can change hands.
        if tile.owner.is_some() && tile.structure.is_some() {
            continue;
        }

        let amount =
            constants.capture_rate_per_unit * occ.units.min(constants.capture_occupier_cap) as f32 * dt;
        match tile.capturing {
            Some(claimant) if claimant != occ.owner => {
                tile.capture_progress -= amount;
                if tile.capture_progress <= 0.0 {
                    tile.capture_progress = 0.0;
                    tile.capturing = Some(occ.owner);
                }
                continue;
            }
            _ => {
                tile.capturing = Some(occ.owner);
                tile.capture_progress = (tile.capture_progress + amount).min(MAX_CAPTURE_PROGRESS);
            }
        }
        if tile.capture_progress < MAX_CAPTURE_PROGRESS {
            continue;
        }

        let previous = tile.owner;
        tile.owner = Some(occ.owner);
        tile.structure = None;
        tile.resource_level = 0;
        captured.push((pos, occ.owner, previous));
    }

    let tick = state.meta.tick;
    for (at, new_owner, previous) in captured {
        let connected = state
            .map
            .neighbors4(at)
            .filter_map(|p| state.map.get(p))
            .any(|t| t.owner == Some(new_owner) && t.connected);
        if let Some(tile) = state.map.get_mut(at) {
            tile.connected = connected;
        }
        state.training.remove(&at);
        state.rally_points.remove(&at);

        if let Some(c) = state.contestants.get_mut(new_owner.index()) {
            c.territory += 1;
            c.stats.captures += 1;
        }
        if let Some(prev) = previous.and_then(|p| state.contestants.get_mut(p.index())) {
            prev.territory = prev.territory.saturating_sub(1);
        }
        let Some(new_owner_id) = state.contestants.get(new_owner.index()).map(|c| c.id.clone())
        else {
            continue;
        };
        let previous_owner =
            previous.and_then(|p| state.contestants.get(p.index()).map(|c| c.id.clone()));
        events.push(crate::emit(
            &mut state.counters,
            tick,
            MatchEvent::TileCaptured {
                at,
                new_owner: new_owner_id,
                previous_owner,
            },
        ));
    }
}
