use super::*;
use crate::test_fixtures::plains_map;

fn build(m: &mut Match, who: ContestantId, at: TilePos, kind: StructureKind) -> Vec<EventEnvelope> {
    m.queue_command(who, Command::BuildStructure { at, kind });
    step(m, 1)
}

#[test]
fn move_squad_paths_to_target() {
    let mut m = playing_match();
    let id = squads_of(&m, ALICE)[0].id;
    m.queue_command(
        alice(),
        Command::MoveSquad {
            squad_id: id,
            target: TilePos::new(15, 10),
        },
    );
    step(&mut m, 1);

    let s = squad(&m, id).unwrap();
    assert_eq!(s.destination(), Some(TilePos::new(15, 10)));
    assert_eq!(s.path.as_ref().unwrap().len(), 4);
}

#[test]
fn move_target_is_clamped_to_map() {
    let mut m = playing_match();
    let id = squads_of(&m, ALICE)[0].id;
    m.queue_command(
        alice(),
        Command::MoveSquad {
            squad_id: id,
            target: TilePos::new(100, 10),
        },
    );
    step(&mut m, 1);
    assert_eq!(squad(&m, id).unwrap().destination(), Some(TilePos::new(47, 10)));
}

#[test]
fn moving_someone_elses_squad_is_dropped() {
    let mut m = playing_match();
    let id = squads_of(&m, ALICE)[0].id;
    m.queue_command(
        bob(),
        Command::MoveSquad {
            squad_id: id,
            target: TilePos::new(15, 10),
        },
    );
    step(&mut m, 1);
    assert!(squad(&m, id).unwrap().path.is_none());
}

#[test]
fn move_to_mountain_is_dropped() {
    let mut m = playing_match();
    let target = TilePos::new(20, 20);
    m.state_mut().map.set_terrain(target, Terrain::Mountain);
    let id = squads_of(&m, ALICE)[0].id;
    m.queue_command(alice(), Command::MoveSquad { squad_id: id, target });
    step(&mut m, 1);
    assert!(squad(&m, id).unwrap().path.is_none());
}

#[test]
fn build_structure_deducts_cost_and_emits_event() {
    let mut m = playing_match();
    let at = TilePos::new(12, 12);
    let events = build(&mut m, alice(), at, StructureKind::Barracks);

    let structure = tile(&m, at).structure.unwrap();
    assert_eq!(structure.kind, StructureKind::Barracks);
    assert!((structure.hp - 400.0).abs() < 1e-3);
    let g = gold(&m, ALICE);
    assert!(g > 100.0 && g < 101.0, "gold {g}");
    assert!(has_event(&events, |e| matches!(
        e,
        MatchEvent::StructureBuilt {
            kind: StructureKind::Barracks,
            ..
        }
    )));
}

fn assert_build_dropped(mut m: Match, at: TilePos, kind: StructureKind, case: &str) {
    let before_structure = m.state().map.get(at).and_then(Tile::structure_kind);
    let before_gold = gold(&m, ALICE);
    let events = build(&mut m, alice(), at, kind);
    assert_eq!(
        m.state().map.get(at).and_then(Tile::structure_kind),
        before_structure,
        "{case}"
    );
    assert!(gold(&m, ALICE) >= before_gold, "{case}: gold was charged");
    assert!(
        !has_event(&events, |e| matches!(e, MatchEvent::StructureBuilt { .. })),
        "{case}"
    );
}

#[test]
fn invalid_builds_are_dropped_without_charge() {
    let inner = TilePos::new(12, 12);
    assert_build_dropped(playing_match(), TilePos::new(31, 11), StructureKind::Wall, "enemy tile");
    assert_build_dropped(playing_match(), TilePos::new(20, 20), StructureKind::Wall, "neutral tile");
    assert_build_dropped(playing_match(), ALICE_SPAWN, StructureKind::Tower, "occupied");
    assert_build_dropped(playing_match(), inner, StructureKind::Castle, "not buildable");
    assert_build_dropped(playing_match(), inner, StructureKind::Mine, "mine off resource");
    assert_build_dropped(playing_match(), TilePos::new(-3, 12), StructureKind::Wall, "off map");

    let mut m = playing_match();
    m.state_mut().map.set_terrain(inner, Terrain::Resource);
    assert_build_dropped(m, inner, StructureKind::Barracks, "barracks on resource");

    let mut m = playing_match();
    m.state_mut().map.get_mut(inner).unwrap().connected = false;
    assert_build_dropped(m, inner, StructureKind::Wall, "disconnected");

    let mut m = playing_match();
    m.state_mut().contestants[0].gold = 50.0;
    assert_build_dropped(m, inner, StructureKind::Barracks, "unaffordable");
}

#[test]
fn mine_upgrades_up_to_cap() {
    let mut m = playing_match();
    let at = TilePos::new(12, 12);
    m.state_mut().map.set_terrain(at, Terrain::Resource);
    m.state_mut().contestants[0].gold = 1000.0;

    let mut events = Vec::new();
    for _ in 0..4 {
        events.extend(build(&mut m, alice(), at, StructureKind::Mine));
    }

    assert_eq!(tile(&m, at).structure_kind(), Some(StructureKind::Mine));
    assert_eq!(tile(&m, at).resource_level, 3);
    // 60 + 120 + 180; the fourth order hits the cap and is free.
    let g = gold(&m, ALICE);
    assert!(g > 640.0 && g < 645.0, "gold {g}");
    assert!(has_event(&events, |e| matches!(
        e,
        MatchEvent::StructureUpgraded { level: 3, .. }
    )));
}

#[test]
fn train_unit_charges_at_enqueue_and_caps_queue() {
    let mut m = playing_match();
    for _ in 0..6 {
        m.queue_command(
            alice(),
            Command::TrainUnit {
                building: ALICE_SPAWN,
                unit: UnitKind::Militia,
            },
        );
    }
    step(&mut m, 1);

    let queue = &m.state().training[&ALICE_SPAWN];
    assert_eq!(queue.len(), 5);
    assert!((queue[0].remaining_secs - 4.9).abs() < 1e-4);
    let g = gold(&m, ALICE);
    assert!(g > 150.0 && g < 151.0, "gold {g}");
}

#[test]
fn train_rejects_wrong_building_or_owner() {
    let mut m = playing_match();
    // Castles only train militia.
    m.queue_command(
        alice(),
        Command::TrainUnit {
            building: ALICE_SPAWN,
            unit: UnitKind::Knight,
        },
    );
    m.queue_command(
        bob(),
        Command::TrainUnit {
            building: ALICE_SPAWN,
            unit: UnitKind::Militia,
        },
    );
    m.queue_command(
        alice(),
        Command::TrainUnit {
            building: TilePos::new(12, 12),
            unit: UnitKind::Militia,
        },
    );
    step(&mut m, 1);
    assert!(m.state().training.is_empty());
    assert!((gold(&m, BOB) - 200.0).abs() < 1.0);
}

#[test]
fn rally_point_requires_owned_trainer() {
    let mut m = playing_match();
    let target = TilePos::new(15, 15);
    m.queue_command(
        alice(),
        Command::SetRallyPoint {
            building: ALICE_SPAWN,
            target,
        },
    );
    m.queue_command(
        alice(),
        Command::SetRallyPoint {
            building: TilePos::new(12, 12),
            target,
        },
    );
    m.queue_command(
        bob(),
        Command::SetRallyPoint {
            building: ALICE_SPAWN,
            target: TilePos::new(1, 1),
        },
    );
    step(&mut m, 1);
    assert_eq!(m.state().rally_points.len(), 1);
    assert_eq!(m.state().rally_points[&ALICE_SPAWN], target);
}

#[test]
fn playing_commands_are_dropped_during_spawn_selection() {
    let mut m = Match::new(std::sync::Arc::new(crate::test_fixtures::base_content()), 7);
    m.add_contestant(alice(), "Alice");
    m.add_contestant(bob(), "Bob");
    m.start_with_map(plains_map(48, 48)).unwrap();
    m.queue_command(alice(), Command::SelectSpawn { at: ALICE_SPAWN });
    step(&mut m, 1);
    assert_eq!(m.state().meta.phase, MatchPhase::SpawnSelection);

    let at = TilePos::new(12, 12);
    build(&mut m, alice(), at, StructureKind::Wall);
    assert!(tile(&m, at).structure.is_none());
    assert!((gold(&m, ALICE) - 200.0).abs() < f64::EPSILON);
}

#[test]
fn unknown_and_eliminated_issuers_are_ignored() {
    let mut m = playing_match();
    let at = TilePos::new(12, 12);
    build(&mut m, "mallory".into(), at, StructureKind::Wall);
    assert!(tile(&m, at).structure.is_none());

    m.state_mut().contestants[0].alive = false;
    build(&mut m, alice(), at, StructureKind::Wall);
    assert!(tile(&m, at).structure.is_none());
}

struct SingleMove {
    squad_id: SquadId,
    target: TilePos,
    sent: bool,
}

impl CommandSource for SingleMove {
    fn generate_commands(
        &mut self,
        _view: &dyn MatchView,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        if std::mem::replace(&mut self.sent, true) {
            return Vec::new();
        }
        let id = CommandId(format!("bot_cmd_{:06}", *next_command_id));
        *next_command_id += 1;
        vec![CommandEnvelope {
            id,
            issued_by: alice(),
            issued_tick: 0,
            command: Command::MoveSquad {
                squad_id: self.squad_id,
                target: self.target,
            },
        }]
    }
}

#[test]
fn generated_commands_apply_on_the_following_tick() {
    let m = playing_match();
    let squad_id = squads_of(&m, ALICE)[0].id;
    let start = squad(&m, squad_id).unwrap().position;
    let mut m = m.with_command_source(Box::new(SingleMove {
        squad_id,
        target: TilePos::new(14, 10),
        sent: false,
    }));

    step(&mut m, 1);
    assert_eq!(m.command_queue().len(), 1);
    let s = squad(&m, squad_id).unwrap();
    assert!(!s.is_moving());
    assert_eq!(s.position, start);

    step(&mut m, 1);
    assert!(m.command_queue().is_empty());
    let s = squad(&m, squad_id).unwrap();
    assert!(s.is_moving());
    assert!(s.position.x > start.x);
}
