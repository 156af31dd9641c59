use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::map::{GameMap, Tile};
use crate::{Terrain, TilePos};

/// Step costs in tenths so the open set can stay integer-ordered.
const COST_SCALE: u32 = 10;

/// Cost of stepping onto `tile`. `None` for impassable terrain.
pub fn step_cost(tile: &Tile) -> Option<u32> {
    if tile.has_road() && tile.terrain.is_passable() {
        return Some(6);
    }
    match tile.terrain {
        Terrain::Plains | Terrain::Resource => Some(10),
        Terrain::Forest => Some(15),
        Terrain::Water => Some(25),
        Terrain::Mountain => None,
    }
}

#[derive(Debug)]
struct OpenNode {
    f: u32,
    g: u32,
    pos: TilePos,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (u32, u32, TilePos, u64) {
        (self.f, self.g, self.pos, self.tie)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap.
        other.key().cmp(&self.key())
    }
}

/// A* over 4-connected passable tiles with a Manhattan heuristic.
///
/// The returned path excludes `from` and ends at `to`. Returns `Some(vec![])`
/// when `from == to`, and `None` when `to` is out of bounds or impassable or
/// when the search exhausts `max_expansions`.
pub fn find_path(
    map: &GameMap,
    from: TilePos,
    to: TilePos,
    max_expansions: usize,
) -> Option<Vec<TilePos>> {
    if !map.in_bounds(from) || !map.is_passable(to) {
        return None;
    }
    if from == to {
        return Some(Vec::new());
    }

    let width = map.width() as usize;
    let idx = |p: TilePos| p.y as usize * width + p.x as usize;
    let len = width * map.height() as usize;
    let mut g_score = vec![u32::MAX; len];
    let mut came_from: Vec<Option<TilePos>> = vec![None; len];
    let mut open = BinaryHeap::new();
    let mut tie: u64 = 0;

    g_score[idx(from)] = 0;
    open.push(OpenNode {
        f: from.manhattan(to) * COST_SCALE,
        g: 0,
        pos: from,
        tie,
    });

    let mut expansions = 0usize;
    while let Some(node) = open.pop() {
        if node.pos == to {
            return Some(reconstruct(&came_from, idx, from, to));
        }
        if node.g != g_score[idx(node.pos)] {
            // Stale heap entry.
            continue;
        }
        expansions += 1;
        if expansions > max_expansions {
            return None;
        }

        for next in map.neighbors4(node.pos) {
            let Some(cost) = map.get(next).and_then(step_cost) else {
                continue;
            };
            let tentative = node.g.saturating_add(cost);
            let next_idx = idx(next);
            if tentative >= g_score[next_idx] {
                continue;
            }
            g_score[next_idx] = tentative;
            came_from[next_idx] = Some(node.pos);
            tie += 1;
            open.push(OpenNode {
                f: tentative.saturating_add(next.manhattan(to) * COST_SCALE),
                g: tentative,
                pos: next,
                tie,
            });
        }
    }
    None
}

fn reconstruct(
    came_from: &[Option<TilePos>],
    idx: impl Fn(TilePos) -> usize,
    from: TilePos,
    to: TilePos,
) -> Vec<TilePos> {
    let mut path = vec![to];
    let mut current = to;
    while let Some(prev) = came_from[idx(current)] {
        if prev == from {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Structure;
    use crate::StructureKind;

    #[test]
    fn step_cost_prefers_roads_over_terrain() {
        let mut tile = Tile::new(Terrain::Water);
        assert_eq!(step_cost(&tile), Some(25));
        tile.structure = Some(Structure::new(StructureKind::Road, 100.0));
        assert_eq!(step_cost(&tile), Some(6));
        assert_eq!(step_cost(&Tile::new(Terrain::Mountain)), None);
    }

    #[test]
    fn path_is_contiguous() {
        let map = GameMap::filled(10, 10, Terrain::Plains);
        let path = find_path(&map, TilePos::new(1, 1), TilePos::new(7, 4), 10_000).unwrap();
        let mut prev = TilePos::new(1, 1);
        for step in &path {
            assert_eq!(prev.manhattan(*step), 1);
            prev = *step;
        }
        assert_eq!(prev, TilePos::new(7, 4));
    }

    #[test]
    fn expansion_budget_fails_closed() {
        let map = GameMap::filled(40, 40, Terrain::Plains);
        assert!(find_path(&map, TilePos::new(0, 0), TilePos::new(39, 39), 5).is_none());
    }
}
