//! Content loading and match construction shared between conquest_cli and conquest_daemon.

use anyhow::{Context, Result};
use conquest_core::{
    CommandSource, Constants, Match, MatchContent, MatchObserver, StructureDef, StructureKind,
    UnitDef, UnitKind,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

#[derive(Deserialize)]
struct UnitsFile {
    content_version: String,
    units: Vec<UnitDef>,
}

#[derive(Deserialize)]
struct StructuresFile {
    structures: Vec<StructureDef>,
}

/// Validates loaded content, panicking on any authoring error.
///
/// Catches mistakes like: two definitions for one unit kind, a trainer that
/// lists a unit nobody defined, or a missing castle.
pub fn validate_content(content: &MatchContent) {
    let mut unit_kinds: HashSet<UnitKind> = HashSet::new();
    for unit in &content.units {
        assert!(
            unit_kinds.insert(unit.kind),
            "unit kind {:?} is defined more than once",
            unit.kind,
        );
        assert!(
            unit.hp > 0.0 && unit.speed > 0.0 && unit.train_secs > 0.0,
            "unit '{}' needs positive hp, speed and train_secs",
            unit.name,
        );
        assert!(unit.cost >= 0.0, "unit '{}' has a negative cost", unit.name);
    }

    let mut structure_kinds: HashSet<StructureKind> = HashSet::new();
    for structure in &content.structures {
        assert!(
            structure_kinds.insert(structure.kind),
            "structure kind {:?} is defined more than once",
            structure.kind,
        );
        assert!(
            structure.hp > 0.0,
            "structure '{}' needs positive hp",
            structure.name,
        );
        for unit in &structure.trains {
            assert!(
                unit_kinds.contains(unit),
                "structure '{}' trains {:?}, which is not a known unit",
                structure.name,
                unit,
            );
        }
        if structure.attack_damage > 0.0 {
            assert!(
                structure.attack_range > 0.0 && structure.fire_rate > 0.0,
                "structure '{}' deals damage but has no range or fire rate",
                structure.name,
            );
        }
    }

    let Some(castle) = content.structure(StructureKind::Castle) else {
        panic!("content has no Castle definition");
    };
    assert!(
        !castle.trains.is_empty(),
        "Castle must train at least one unit kind"
    );

    validate_constants(&content.constants);
}

fn validate_constants(c: &Constants) {
    assert!(c.max_contestants >= 2, "max_contestants must be at least 2");
    assert!(c.ticks_per_sec > 0.0, "ticks_per_sec must be positive");
    assert!(c.max_tick_dt_secs > 0.0, "max_tick_dt_secs must be positive");
    assert!(
        c.map_min_size <= c.map_base_size && c.map_base_size <= c.map_max_size,
        "map sizes must satisfy min <= base <= max"
    );
    assert!(
        c.supply_check_interval_ticks > 0,
        "supply_check_interval_ticks must be positive"
    );
    assert!(c.spatial_cell_size > 0.0, "spatial_cell_size must be positive");
    assert!(
        c.diminishing_divisor > 0.0,
        "diminishing_divisor must be positive"
    );
    assert!(
        (0.0..=1.0).contains(&c.spawn_relaxed_factor),
        "spawn_relaxed_factor must be within [0, 1]"
    );
}

fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let text = std::fs::read_to_string(dir.join(file)).with_context(|| format!("reading {file}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {file}"))
}

pub fn load_content(content_dir: impl AsRef<Path>) -> Result<MatchContent> {
    let dir = content_dir.as_ref();
    let constants: Constants = read_json(dir, "constants.json")?;
    let units_file: UnitsFile = read_json(dir, "units.json")?;
    let structures_file: StructuresFile = read_json(dir, "structures.json")?;
    let content = MatchContent {
        content_version: units_file.content_version,
        units: units_file.units,
        structures: structures_file.structures,
        constants,
    };
    validate_content(&content);
    Ok(content)
}

/// Builds a match filled with `bots` bot contestants and starts it on a generated map.
///
/// Bots pick their spawns immediately, so the first tick moves the match to `Playing`.
pub fn start_bot_match(
    content: Arc<MatchContent>,
    seed: u64,
    bots: usize,
    source: Box<dyn CommandSource>,
    observer: Option<Box<dyn MatchObserver>>,
) -> Result<Match> {
    let mut game = Match::new(content, seed).with_command_source(source);
    if let Some(observer) = observer {
        game = game.with_observer(observer);
    }
    game.fill_with_bots(bots);
    game.start().context("starting bot match")?;
    Ok(game)
}
