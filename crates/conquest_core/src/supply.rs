//! Supply-line connectivity: owned tiles reachable from the capital.

use std::collections::{BTreeSet, VecDeque};

use crate::map::GameMap;
use crate::{MatchState, PlayerSlot, TilePos};

/// 4-connected flood fill from `capital` through tiles owned by `owner`.
/// Empty when the capital itself is not held.
pub fn flood_supply(map: &GameMap, owner: PlayerSlot, capital: TilePos) -> BTreeSet<TilePos> {
    let mut reached = BTreeSet::new();
    if map.get(capital).and_then(|t| t.owner) != Some(owner) {
        return reached;
    }
    let mut frontier = VecDeque::from([capital]);
    reached.insert(capital);
    while let Some(pos) = frontier.pop_front() {
        for next in map.neighbors4(pos) {
            let Some(tile) = map.get(next) else {
                continue;
            };
            if tile.owner != Some(owner) || !tile.terrain.is_ownable() {
                continue;
            }
            if reached.insert(next) {
                frontier.push_back(next);
            }
        }
    }
    reached
}

/// Recomputes `connected` for every owned tile and resets territory counts
/// to the connected total.
pub(crate) fn recompute_supply(state: &mut MatchState) {
    let roots: Vec<(PlayerSlot, Option<TilePos>)> = state
        .contestants
        .iter()
        .filter(|c| c.alive)
        .map(|c| (c.slot, c.capital))
        .collect();

    for (slot, capital) in roots {
        let reached = capital
            .map(|capital| flood_supply(&state.map, slot, capital))
            .unwrap_or_default();
        for (pos, tile) in state.map.tiles_mut() {
            if tile.owner == Some(slot) {
                tile.connected = reached.contains(&pos);
            }
        }
        if let Some(c) = state.contestants.get_mut(slot.index()) {
            c.territory = reached.len() as u32;
        }
    }
}
