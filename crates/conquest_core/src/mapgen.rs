//! Procedural map generation and spawn-site selection.
//!
//! Terrain comes from three independent noise fields (elevation, forest,
//! water). A mountain border bounds the map, resource nodes are placed by
//! rejection sampling, and a passage pass punches holes in large mountain
//! masses so the interior stays navigable.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::map::GameMap;
use crate::noise::{normalised_grid, NoiseField};
use crate::{Constants, Terrain, TilePos};

const ELEVATION_SALT: u32 = 1;
const FOREST_SALT: u32 = 2;
const WATER_SALT: u32 = 3;
const LAYOUT_SALT: u64 = 0x5EED_0F_7E11;

/// Rows that are always mountain, counted from the edge.
const HARD_BORDER: i32 = 2;
/// Rows that may be mountain depending on elevation.
const SOFT_BORDER: i32 = 4;
const RESOURCE_WINDOW: i32 = 2;
const RESOURCE_ATTEMPTS_PER_NODE: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapGenError {
    #[error("map {width}x{height} is below the minimum size {min}")]
    MapTooSmall { width: i32, height: i32, min: i32 },
    #[error("no valid spawn sites on generated map")]
    NoSpawnSites,
}

/// Side length of the square map for a roster of `contestants`.
pub fn map_size_for(constants: &Constants, contestants: usize) -> i32 {
    let per = i32::try_from(contestants).unwrap_or(i32::MAX);
    constants
        .map_base_size
        .saturating_add(constants.map_size_per_contestant.saturating_mul(per))
        .clamp(constants.map_min_size, constants.map_max_size)
}

pub fn generate_map(
    constants: &Constants,
    width: i32,
    height: i32,
    seed: u64,
) -> Result<GameMap, MapGenError> {
    if width < constants.map_min_size || height < constants.map_min_size {
        return Err(MapGenError::MapTooSmall {
            width,
            height,
            min: constants.map_min_size,
        });
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ LAYOUT_SALT);
    let elevation = normalised_grid(
        &NoiseField::new(seed, ELEVATION_SALT, constants.noise_octaves, constants.noise_feature_size),
        width,
        height,
    );
    let forest = normalised_grid(
        &NoiseField::new(seed, FOREST_SALT, constants.noise_octaves, constants.noise_feature_size),
        width,
        height,
    );
    let water = normalised_grid(
        &NoiseField::new(seed, WATER_SALT, constants.noise_octaves, constants.noise_feature_size),
        width,
        height,
    );

    let mut map = GameMap::filled(width, height, Terrain::Plains);
    for i in 0..elevation.len() {
        let pos = TilePos::new(i as i32 % width, i as i32 / width);
        let terrain = classify(constants, elevation[i], forest[i], water[i]);
        map.set_terrain(pos, terrain);
    }
    apply_border(&mut map, &elevation, &mut rng);
    place_resources(&mut map, constants, &mut rng);
    carve_passages(&mut map, constants, &mut rng);
    Ok(map)
}

fn classify(constants: &Constants, elevation: f32, forest: f32, water: f32) -> Terrain {
    let forest_band_top = (constants.mountain_elevation + constants.water_elevation) / 2.0 + 0.1;
    if elevation > constants.mountain_elevation {
        Terrain::Mountain
    } else if elevation < constants.water_elevation && water > constants.water_threshold {
        Terrain::Water
    } else if elevation >= constants.water_elevation
        && elevation <= forest_band_top
        && forest > constants.forest_threshold
    {
        Terrain::Forest
    } else {
        Terrain::Plains
    }
}

fn apply_border(map: &mut GameMap, elevation: &[f32], rng: &mut impl Rng) {
    let width = map.width();
    let positions: Vec<TilePos> = map.positions().collect();
    for pos in positions {
        let depth = map.edge_distance(pos);
        if depth < HARD_BORDER {
            map.set_terrain(pos, Terrain::Mountain);
        } else if depth < SOFT_BORDER {
            let e = elevation[(pos.y * width + pos.x) as usize];
            let chance = if depth == HARD_BORDER { 0.35 + e * 0.5 } else { e * 0.4 };
            if rng.gen::<f32>() < chance {
                map.set_terrain(pos, Terrain::Mountain);
            }
        }
    }
}

fn place_resources(map: &mut GameMap, constants: &Constants, rng: &mut impl Rng) {
    let area = (map.width() * map.height()) as f32;
    let target = (area * constants.resource_density).round().max(1.0) as usize;
    let budget = target * RESOURCE_ATTEMPTS_PER_NODE;
    let min_spacing_sq = constants.resource_min_spacing * constants.resource_min_spacing;
    let lo = SOFT_BORDER;
    let (hi_x, hi_y) = (map.width() - SOFT_BORDER, map.height() - SOFT_BORDER);
    if hi_x <= lo || hi_y <= lo {
        return;
    }

    let mut placed = 0;
    for _ in 0..budget {
        if placed >= target {
            break;
        }
        let pos = TilePos::new(rng.gen_range(lo..hi_x), rng.gen_range(lo..hi_y));
        if !matches!(map.terrain(pos), Some(Terrain::Plains | Terrain::Forest)) {
            continue;
        }
        if map
            .resource_nodes()
            .iter()
            .any(|node| node.distance_sq(pos) < min_spacing_sq)
        {
            continue;
        }
        let open = map
            .square(pos, RESOURCE_WINDOW)
            .filter(|p| map.is_passable(*p))
            .count();
        if (open as u32) < constants.resource_min_open {
            continue;
        }
        map.set_terrain(pos, Terrain::Resource);
        placed += 1;
    }
}

/// Clears mountain tiles buried in mountain masses so ranges become passes.
fn carve_passages(map: &mut GameMap, constants: &Constants, rng: &mut impl Rng) {
    let buried: Vec<TilePos> = map
        .positions()
        .filter(|p| map.edge_distance(*p) >= SOFT_BORDER)
        .filter(|p| map.terrain(*p) == Some(Terrain::Mountain))
        .filter(|p| map.count_neighbors8(*p, Terrain::Mountain) >= 7)
        .collect();
    for pos in buried {
        if rng.gen::<f32>() < constants.passage_clear_probability {
            map.set_terrain(pos, Terrain::Plains);
        }
    }
}

// ---------------------------------------------------------------------------
// Spawn sites
// ---------------------------------------------------------------------------

fn is_open(terrain: Option<Terrain>) -> bool {
    matches!(terrain, Some(Terrain::Plains | Terrain::Forest | Terrain::Resource))
}

fn open_space(map: &GameMap, center: TilePos, radius: i32) -> u32 {
    map.square(center, radius)
        .filter(|p| is_open(map.terrain(*p)))
        .count() as u32
}

/// Single-tile spawn check: edge margin, terrain, separation, open space.
pub fn is_valid_spawn(
    map: &GameMap,
    constants: &Constants,
    pos: TilePos,
    existing: &[TilePos],
) -> bool {
    if !map.in_bounds(pos) || map.edge_distance(pos) < constants.spawn_edge_margin {
        return false;
    }
    if !matches!(map.terrain(pos), Some(Terrain::Plains | Terrain::Forest)) {
        return false;
    }
    let min_sq = constants.spawn_min_distance * constants.spawn_min_distance;
    if existing.iter().any(|s| s.distance_sq(pos) < min_sq) {
        return false;
    }
    open_space(map, pos, constants.spawn_open_radius) >= constants.spawn_min_open
}

fn spawn_score(map: &GameMap, constants: &Constants, pos: TilePos) -> f32 {
    let window = (2 * constants.spawn_open_radius + 1).pow(2) as f32;
    let open = open_space(map, pos, constants.spawn_open_radius) as f32 / window;

    let cap = constants.spawn_resource_cap.max(1.0);
    let nearest = map
        .resource_nodes()
        .iter()
        .map(|node| node.distance_sq(pos))
        .fold(f32::MAX, f32::min)
        .sqrt();
    let resource = if nearest <= cap {
        1.0
    } else {
        (1.0 - (nearest - cap) / cap).max(-1.0)
    };

    let edge_norm = (map.width().min(map.height()) / 4).max(1) as f32;
    let edge = (map.edge_distance(pos) as f32 / edge_norm).min(1.0);

    0.5 * open + 0.3 * resource + 0.2 * edge
}

/// Picks up to `requested` well-separated spawn sites, best first.
pub fn compute_spawn_sites(map: &GameMap, constants: &Constants, requested: usize) -> Vec<TilePos> {
    let step = constants.spawn_grid_step.max(1);
    let margin = constants.spawn_edge_margin;
    let mut candidates: Vec<(f32, TilePos)> = Vec::new();
    let mut y = margin;
    while y < map.height() - margin {
        let mut x = margin;
        while x < map.width() - margin {
            let pos = TilePos::new(x, y);
            if map.terrain(pos) == Some(Terrain::Plains) && is_valid_spawn(map, constants, pos, &[]) {
                candidates.push((spawn_score(map, constants, pos), pos));
            }
            x += step;
        }
        y += step;
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    let mut accepted = greedy_pick(&candidates, &[], constants.spawn_min_distance, requested);
    if accepted.len() < requested {
        let relaxed = constants.spawn_min_distance * constants.spawn_relaxed_factor;
        accepted = greedy_pick(&candidates, &accepted, relaxed, requested);
    }
    accepted.truncate(requested);
    accepted
}

fn greedy_pick(
    candidates: &[(f32, TilePos)],
    seed_sites: &[TilePos],
    min_distance: f32,
    requested: usize,
) -> Vec<TilePos> {
    let min_sq = min_distance * min_distance;
    let mut accepted = seed_sites.to_vec();
    for (_, pos) in candidates {
        if accepted.len() >= requested {
            break;
        }
        if accepted.iter().all(|a| a.distance_sq(*pos) >= min_sq) {
            accepted.push(*pos);
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{base_content, make_rng, plains_map};

    fn raise_ring(map: &mut GameMap, center: TilePos, gaps: &[TilePos]) {
        for dx in -1..=1 {
            for dy in -1..=1 {
                let pos = TilePos::new(center.x + dx, center.y + dy);
                if !gaps.contains(&pos) {
                    map.set_terrain(pos, Terrain::Mountain);
                }
            }
        }
    }

    #[test]
    fn same_seed_generates_same_map() {
        let c = base_content().constants;
        let a = generate_map(&c, 64, 64, 11).unwrap();
        let b = generate_map(&c, 64, 64, 11).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn border_band_is_mountain() {
        let c = base_content().constants;
        let map = generate_map(&c, 48, 48, 3).unwrap();
        for pos in map.positions().filter(|p| map.edge_distance(*p) < HARD_BORDER) {
            assert_eq!(map.terrain(pos), Some(Terrain::Mountain), "{pos:?}");
        }
    }

    #[test]
    fn resource_nodes_respect_spacing() {
        let c = base_content().constants;
        let map = generate_map(&c, 96, 96, 5).unwrap();
        let nodes = map.resource_nodes();
        assert!(!nodes.is_empty());
        let min_sq = c.resource_min_spacing * c.resource_min_spacing;
        for (i, a) in nodes.iter().enumerate() {
            assert_eq!(map.terrain(*a), Some(Terrain::Resource));
            for b in &nodes[i + 1..] {
                assert!(a.distance_sq(*b) >= min_sq);
            }
        }
    }

    #[test]
    fn passages_open_only_where_seven_neighbours_are_mountain() {
        let mut c = base_content().constants;
        c.passage_clear_probability = 1.0;
        let mut map = plains_map(32, 32);
        let seven = TilePos::new(10, 10);
        let six = TilePos::new(20, 10);
        let near_edge = TilePos::new(2, 20);
        raise_ring(&mut map, seven, &[TilePos::new(11, 11)]);
        raise_ring(&mut map, six, &[TilePos::new(21, 11), TilePos::new(19, 9)]);
        raise_ring(&mut map, near_edge, &[]);

        carve_passages(&mut map, &c, &mut make_rng());
        assert_eq!(map.terrain(seven), Some(Terrain::Plains));
        assert_eq!(map.terrain(six), Some(Terrain::Mountain));
        assert_eq!(map.terrain(near_edge), Some(Terrain::Mountain));
        assert_eq!(map.terrain(TilePos::new(9, 9)), Some(Terrain::Mountain));
    }

    #[test]
    fn rejects_tiny_maps() {
        let c = base_content().constants;
        let err = generate_map(&c, 8, 8, 1).unwrap_err();
        assert!(matches!(err, MapGenError::MapTooSmall { .. }));
    }

    #[test]
    fn spawn_sites_are_valid_and_separated() {
        let c = base_content().constants;
        let map = generate_map(&c, 96, 96, 21).unwrap();
        let sites = compute_spawn_sites(&map, &c, 6);
        assert!(!sites.is_empty());
        let relaxed_sq = (c.spawn_min_distance * c.spawn_relaxed_factor).powi(2);
        for (i, a) in sites.iter().enumerate() {
            assert!(is_valid_spawn(&map, &c, *a, &[]));
            for b in &sites[i + 1..] {
                assert!(a.distance_sq(*b) >= relaxed_sq);
            }
        }
    }

    #[test]
    fn spawn_validity_enforces_each_rule() {
        let c = base_content().constants;
        let mut map = GameMap::filled(40, 40, Terrain::Plains);
        let center = TilePos::new(20, 20);
        assert!(is_valid_spawn(&map, &c, center, &[]));
        assert!(!is_valid_spawn(&map, &c, TilePos::new(1, 20), &[]), "edge margin");
        assert!(!is_valid_spawn(&map, &c, center, &[TilePos::new(22, 20)]), "separation");
        map.set_terrain(center, Terrain::Water);
        assert!(!is_valid_spawn(&map, &c, center, &[]), "terrain");
        map.set_terrain(center, Terrain::Plains);
        for pos in map.square(center, 3).collect::<Vec<_>>() {
            if pos != center {
                map.set_terrain(pos, Terrain::Mountain);
            }
        }
        assert!(!is_valid_spawn(&map, &c, center, &[]), "open space");
    }
}
