use crate::map::{GameMap, Tile};
use crate::spatial::SpatialIndex;
use crate::{MatchContent, MatchState, Position, Squad, Terrain, TilePos};

const ROAD_SPEED: f32 = 1.5;
const FOREST_SPEED: f32 = 0.6;
const WATER_SPEED: f32 = 0.4;

/// Speed multiplier for a squad standing on `tile`.
pub(crate) fn terrain_speed(tile: &Tile) -> f32 {
    if tile.has_road() {
        return ROAD_SPEED;
    }
    match tile.terrain {
        Terrain::Forest => FOREST_SPEED,
        Terrain::Water => WATER_SPEED,
        Terrain::Plains | Terrain::Resource | Terrain::Mountain => 1.0,
    }
}

/// Tiles per second on plains: the slowest unit sets the pace.
fn base_speed(squad: &Squad, content: &MatchContent) -> f32 {
    squad
        .units
        .iter()
        .filter_map(|unit| content.unit(unit.kind).map(|def| def.speed))
        .fold(f32::INFINITY, f32::min)
}

pub(crate) fn advance_squads(
    state: &mut MatchState,
    content: &MatchContent,
    spatial: &mut SpatialIndex,
    dt: f32,
) {
    for squad in &mut state.squads {
        if !squad.is_moving() {
            continue;
        }
        step_squad(squad, &state.map, content, dt);
        spatial.upsert(squad.id, squad.owner, squad.position);
    }
}

/// How far ahead of a squad the next tile is sampled.
const LOOKAHEAD: f32 = 0.01;

/// Distance from `from` along unit direction `dir` to the edge of `tile`.
fn exit_distance(from: Position, dir: (f32, f32), tile: TilePos) -> f32 {
    let axis = |pos: f32, d: f32, lo: i32| {
        if d > f32::EPSILON {
            (lo as f32 + 1.0 - pos) / d
        } else if d < -f32::EPSILON {
            (pos - lo as f32) / -d
        } else {
            f32::INFINITY
        }
    };
    axis(from.x, dir.0, tile.x).min(axis(from.y, dir.1, tile.y))
}

/// Moves a squad for `dt` seconds, re-reading the terrain modifier each time
/// it crosses into another tile.
fn step_squad(squad: &mut Squad, map: &GameMap, content: &MatchContent, dt: f32) {
    let speed = base_speed(squad, content);
    if !speed.is_finite() || speed <= 0.0 {
        return;
    }
    let mut remaining = dt;

    while remaining > 0.0 {
        let Some(waypoint) = squad.next_waypoint() else {
            break;
        };
        let target = waypoint.center();
        let dx = target.x - squad.position.x;
        let dy = target.y - squad.position.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance <= f32::EPSILON {
            squad.position = target;
            squad.path_cursor += 1;
            continue;
        }
        let dir = (dx / distance, dy / distance);
        let ahead = Position::new(
            squad.position.x + dir.0 * LOOKAHEAD,
            squad.position.y + dir.1 * LOOKAHEAD,
        )
        .tile();
        let rate = speed * map.get(ahead).map_or(1.0, terrain_speed);
        let leg = exit_distance(squad.position, dir, ahead)
            .max(LOOKAHEAD)
            .min(distance);
        let reach = rate * remaining;

        if reach >= leg {
            remaining -= leg / rate;
            if leg >= distance {
                squad.position = target;
                squad.path_cursor += 1;
            } else {
                squad.position.x += dir.0 * leg;
                squad.position.y += dir.1 * leg;
            }
        } else {
            squad.position.x += dir.0 * reach;
            squad.position.y += dir.1 * reach;
            remaining = 0.0;
        }
    }

    if !squad.is_moving() {
        squad.path = None;
        squad.path_cursor = 0;
    }
}
