use serde::{Deserialize, Serialize};

use crate::{PlayerSlot, StructureKind, Terrain, TilePos};

pub const MAX_CAPTURE_PROGRESS: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub kind: StructureKind,
    pub hp: f32,
    pub max_hp: f32,
    /// Seconds until a defensive structure may fire again.
    pub cooldown: f32,
}

impl Structure {
    pub fn new(kind: StructureKind, hp: f32) -> Self {
        Self {
            kind,
            hp,
            max_hp: hp,
            cooldown: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: Terrain,
    pub owner: Option<PlayerSlot>,
    pub structure: Option<Structure>,
    /// Saturates in `[0, 100]`; ownership changes only at 100.
    pub capture_progress: f32,
    pub capturing: Option<PlayerSlot>,
    /// Reachable from the owner's capital through owned tiles.
    pub connected: bool,
    pub resource_level: u8,
}

impl Tile {
    pub fn new(terrain: Terrain) -> Self {
        Self {
            terrain,
            owner: None,
            structure: None,
            capture_progress: 0.0,
            capturing: None,
            connected: false,
            resource_level: 0,
        }
    }

    pub fn structure_kind(&self) -> Option<StructureKind> {
        self.structure.map(|s| s.kind)
    }

    pub fn has_road(&self) -> bool {
        self.structure_kind() == Some(StructureKind::Road)
    }

    /// Clears ownership and everything that hangs off it.
    pub fn reset_ownership(&mut self) {
        self.owner = None;
        self.structure = None;
        self.capture_progress = 0.0;
        self.capturing = None;
        self.connected = false;
        self.resource_level = 0;
    }
}

/// Fixed-size tile grid. Dimensions never change after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMap {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
    resource_nodes: Vec<TilePos>,
}

impl GameMap {
    pub fn filled(width: i32, height: i32, terrain: Terrain) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let len = (width * height) as usize;
        Self {
            width,
            height,
            tiles: vec![Tile::new(terrain); len],
            resource_nodes: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::filled(0, 0, Terrain::Plains)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn clamp(&self, pos: TilePos) -> TilePos {
        TilePos::new(
            pos.x.clamp(0, (self.width - 1).max(0)),
            pos.y.clamp(0, (self.height - 1).max(0)),
        )
    }

    fn idx(&self, pos: TilePos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    pub fn get(&self, pos: TilePos) -> Option<&Tile> {
        self.idx(pos).map(|i| &self.tiles[i])
    }

    pub fn get_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.idx(pos).map(|i| &mut self.tiles[i])
    }

    pub fn terrain(&self, pos: TilePos) -> Option<Terrain> {
        self.get(pos).map(|t| t.terrain)
    }

    pub fn is_passable(&self, pos: TilePos) -> bool {
        self.terrain(pos).is_some_and(Terrain::is_passable)
    }

    /// Sets terrain and keeps the resource-node list in step.
    pub fn set_terrain(&mut self, pos: TilePos, terrain: Terrain) {
        let Some(idx) = self.idx(pos) else { return };
        let previous = self.tiles[idx].terrain;
        self.tiles[idx].terrain = terrain;
        if previous == Terrain::Resource && terrain != Terrain::Resource {
            self.resource_nodes.retain(|p| *p != pos);
        } else if previous != Terrain::Resource && terrain == Terrain::Resource {
            self.resource_nodes.push(pos);
        }
    }

    pub fn resource_nodes(&self) -> &[TilePos] {
        &self.resource_nodes
    }

    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| TilePos::new(x, y)))
    }

    pub fn tiles(&self) -> impl Iterator<Item = (TilePos, &Tile)> + '_ {
        self.positions().zip(self.tiles.iter())
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = (TilePos, &mut Tile)> + '_ {
        let width = self.width;
        self.tiles.iter_mut().enumerate().map(move |(i, tile)| {
            let i = i as i32;
            (TilePos::new(i % width, i / width), tile)
        })
    }

    /// In-bounds positions within Chebyshev distance `radius` of `center`.
    pub fn square(&self, center: TilePos, radius: i32) -> impl Iterator<Item = TilePos> + '_ {
        (-radius..=radius)
            .flat_map(move |dy| (-radius..=radius).map(move |dx| TilePos::new(center.x + dx, center.y + dy)))
            .filter(move |p| self.in_bounds(*p))
    }

    pub fn neighbors4(&self, pos: TilePos) -> impl Iterator<Item = TilePos> + '_ {
        pos.neighbors4().into_iter().filter(move |p| self.in_bounds(*p))
    }

    /// Count of the 8 surrounding tiles with the given terrain. Out-of-bounds tiles don't count.
    pub fn count_neighbors8(&self, pos: TilePos, terrain: Terrain) -> usize {
        self.square(pos, 1)
            .filter(|p| *p != pos && self.terrain(*p) == Some(terrain))
            .count()
    }

    /// Distance to the nearest map edge (0 on the outermost ring).
    pub fn edge_distance(&self, pos: TilePos) -> i32 {
        pos.x
            .min(pos.y)
            .min(self.width - 1 - pos.x)
            .min(self.height - 1 - pos.y)
    }

    pub fn owned_count(&self, slot: PlayerSlot) -> u32 {
        self.tiles.iter().filter(|t| t.owner == Some(slot)).count() as u32
    }
}
