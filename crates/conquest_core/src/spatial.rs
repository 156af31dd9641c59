//! Uniform-grid index over squad positions.
//!
//! Every comparison uses squared distance.

use ahash::AHashMap;

use crate::{PlayerSlot, Position, SquadId};

type CellKey = (i32, i32);

#[derive(Debug, Clone, Copy)]
struct Entry {
    position: Position,
    owner: PlayerSlot,
    cell: CellKey,
    /// Index of this squad inside its cell bucket.
    slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialHit {
    pub squad: SquadId,
    pub owner: PlayerSlot,
    pub position: Position,
    pub distance_sq: f32,
}

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: AHashMap<CellKey, Vec<SquadId>>,
    entries: AHashMap<SquadId, Entry>,
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(0.5),
            cells: AHashMap::new(),
            entries: AHashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.entries.clear();
    }

    fn cell_of(&self, position: Position) -> CellKey {
        (
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// Inserts or moves a squad. Only touches buckets when the cell changes.
    pub fn upsert(&mut self, squad: SquadId, owner: PlayerSlot, position: Position) {
        let cell = self.cell_of(position);
        if let Some(entry) = self.entries.get_mut(&squad) {
            entry.position = position;
            entry.owner = owner;
            if entry.cell == cell {
                return;
            }
        }
        if self.entries.contains_key(&squad) {
            self.detach(squad);
        }
        let bucket = self.cells.entry(cell).or_default();
        bucket.push(squad);
        let slot = bucket.len() - 1;
        self.entries.insert(
            squad,
            Entry {
                position,
                owner,
                cell,
                slot,
            },
        );
    }

    pub fn remove(&mut self, squad: SquadId) {
        if self.entries.contains_key(&squad) {
            self.detach(squad);
            self.entries.remove(&squad);
        }
    }

    /// Swap-pops `squad` out of its bucket and patches the moved neighbour's slot.
    fn detach(&mut self, squad: SquadId) {
        let Some(entry) = self.entries.get(&squad).copied() else {
            return;
        };
        let Some(bucket) = self.cells.get_mut(&entry.cell) else {
            return;
        };
        bucket.swap_remove(entry.slot);
        if let Some(moved) = bucket.get(entry.slot).copied() {
            if let Some(moved_entry) = self.entries.get_mut(&moved) {
                moved_entry.slot = entry.slot;
            }
        }
        if bucket.is_empty() {
            self.cells.remove(&entry.cell);
        }
    }

    pub fn position(&self, squad: SquadId) -> Option<Position> {
        self.entries.get(&squad).map(|e| e.position)
    }

    /// Squads within `radius` of `center`, nearest first.
    pub fn query_radius(&self, center: Position, radius: f32) -> Vec<SpatialHit> {
        let radius_sq = radius * radius;
        let min = self.cell_of(Position::new(center.x - radius, center.y - radius));
        let max = self.cell_of(Position::new(center.x + radius, center.y + radius));
        let mut hits = Vec::new();
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for squad in bucket {
                    let entry = &self.entries[squad];
                    let distance_sq = entry.position.distance_sq(center);
                    if distance_sq <= radius_sq {
                        hits.push(SpatialHit {
                            squad: *squad,
                            owner: entry.owner,
                            position: entry.position,
                            distance_sq,
                        });
                    }
                }
            }
        }
        hits.sort_by(|a, b| {
            a.distance_sq
                .total_cmp(&b.distance_sq)
                .then_with(|| a.squad.cmp(&b.squad))
        });
        hits
    }

    /// Squads whose position lies inside the axis-aligned rectangle `[min, max]`.
    pub fn query_rect(&self, min: Position, max: Position) -> Vec<SquadId> {
        let lo = self.cell_of(min);
        let hi = self.cell_of(max);
        let mut out = Vec::new();
        for cy in lo.1..=hi.1 {
            for cx in lo.0..=hi.0 {
                let Some(bucket) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                out.extend(bucket.iter().copied().filter(|squad| {
                    let p = self.entries[squad].position;
                    p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
                }));
            }
        }
        out.sort();
        out
    }

    /// Nearest squad not owned by `owner`, growing the search one cell at a time up to `max_radius`.
    pub fn nearest_enemy(
        &self,
        center: Position,
        owner: PlayerSlot,
        max_radius: f32,
    ) -> Option<SpatialHit> {
        let mut radius = self.cell_size;
        loop {
            let capped = radius.min(max_radius);
            if let Some(hit) = self
                .query_radius(center, capped)
                .into_iter()
                .find(|hit| hit.owner != owner)
            {
                return Some(hit);
            }
            if capped >= max_radius {
                return None;
            }
            radius += self.cell_size;
        }
    }

    pub fn enemies_in_range(&self, center: Position, owner: PlayerSlot, radius: f32) -> Vec<SpatialHit> {
        self.query_radius(center, radius)
            .into_iter()
            .filter(|hit| hit.owner != owner)
            .collect()
    }

    pub fn friendlies_in_range(
        &self,
        center: Position,
        owner: PlayerSlot,
        radius: f32,
    ) -> Vec<SpatialHit> {
        self.query_radius(center, radius)
            .into_iter()
            .filter(|hit| hit.owner == owner)
            .collect()
    }
}
