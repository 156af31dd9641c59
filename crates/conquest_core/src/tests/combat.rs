use super::*;

fn total_hp(m: &Match, id: SquadId) -> f32 {
    squad(m, id).map_or(0.0, |s| s.units.iter().map(|u| u.hp).sum())
}

#[test]
fn equal_squads_trade_symmetric_damage_until_destroyed() {
    let mut m = playing_match();
    clear_squads(&mut m);
    let a = place_squad_at(&mut m, ALICE, UnitKind::Militia, 1, Position::new(20.5, 20.5));
    let b = place_squad_at(&mut m, BOB, UnitKind::Militia, 1, Position::new(21.3, 20.5));

    let mut ticks = 0;
    while squad(&m, a).is_some() || squad(&m, b).is_some() {
        step(&mut m, 1);
        ticks += 1;
        assert!(
            (total_hp(&m, a) - total_hp(&m, b)).abs() < 1e-3,
            "asymmetric at tick {ticks}"
        );
        assert!(ticks <= 110, "combat did not resolve");
    }
    assert!(ticks >= 99, "resolved too early: {ticks}");

    let state = m.state();
    assert_eq!(state.contestants[0].stats.kills, 1);
    assert_eq!(state.contestants[0].stats.losses, 1);
    assert_eq!(state.contestants[1].stats.kills, 1);
    assert_eq!(state.contestants[1].stats.losses, 1);
    assert!(m.spatial().is_empty());
}

#[test]
fn combat_is_deterministic() {
    let run = || {
        let mut m = playing_match();
        clear_squads(&mut m);
        place_squad(&mut m, ALICE, UnitKind::Militia, 4, TilePos::new(20, 20));
        place_squad(&mut m, BOB, UnitKind::Archer, 3, TilePos::new(22, 20));
        place_squad(&mut m, BOB, UnitKind::Knight, 2, TilePos::new(21, 21));
        step(&mut m, 30);
        m.state()
            .squads
            .iter()
            .map(|s| (s.id, s.units.iter().map(|u| u.hp.to_bits()).collect::<Vec<_>>()))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn only_units_within_their_range_deal_damage() {
    let mut m = playing_match();
    clear_squads(&mut m);
    let militia = place_squad_at(&mut m, ALICE, UnitKind::Militia, 1, Position::new(20.5, 20.5));
    let archers = place_squad_at(&mut m, BOB, UnitKind::Archer, 1, Position::new(22.5, 20.5));
    step(&mut m, 1);
    // Archer range 3 reaches; militia range 1 does not.
    assert!((total_hp(&m, militia) - 99.2).abs() < 1e-3);
    assert!((total_hp(&m, archers) - 60.0).abs() < f32::EPSILON);
}

#[test]
fn damage_lands_on_the_front_line() {
    let mut m = playing_match();
    clear_squads(&mut m);
    let big = place_squad(&mut m, ALICE, UnitKind::Militia, 5, TilePos::new(20, 20));
    place_squad(&mut m, BOB, UnitKind::Knight, 3, TilePos::new(20, 20));
    step(&mut m, 1);
    let units = &squad(&m, big).unwrap().units;
    // 3 knights x 20 dps x 0.1 s split over three front units.
    for unit in &units[..3] {
        assert!((unit.hp - 98.0).abs() < 1e-3);
    }
    for unit in &units[3..] {
        assert!((unit.hp - 100.0).abs() < f32::EPSILON);
    }
}

#[test]
fn destroyed_castle_eliminates_owner_in_the_same_tick() {
    let mut m = playing_match();
    clear_squads(&mut m);
    place_squad(&mut m, ALICE, UnitKind::Militia, 2, TilePos::new(5, 30));
    place_squad(&mut m, BOB, UnitKind::Knight, 12, ALICE_SPAWN);

    let mut elimination_tick = None;
    for _ in 0..30 {
        let events = m.tick(DT);
        if has_event(&events, |e| matches!(e, MatchEvent::ContestantEliminated { .. })) {
            assert!(has_event(&events, |e| matches!(
                e,
                MatchEvent::StructureDestroyed {
                    kind: StructureKind::Castle,
                    ..
                }
            )));
            assert!(has_event(&events, |e| matches!(
                e,
                MatchEvent::MatchFinished { winner: Some(w) } if w == &bob()
            )));
            elimination_tick = Some(events[0].tick);
            break;
        }
    }
    assert!(elimination_tick.is_some());

    let state = m.state();
    assert!(!state.contestants[0].alive);
    assert!(squads_of(&m, ALICE).is_empty());
    assert_eq!(state.map.owned_count(ALICE), 0);
    assert!(state.map.tiles().all(|(_, t)| t.capturing != Some(ALICE)));
    assert_eq!(state.meta.phase, MatchPhase::Finished);
}

#[test]
fn siege_damage_scales_with_structure_multiplier() {
    let mut m = playing_match();
    clear_squads(&mut m);
    let wall_at = TilePos::new(31, 11);
    m.state_mut().map.get_mut(wall_at).unwrap().structure =
        Some(map::Structure::new(StructureKind::Wall, 600.0));
    place_squad(&mut m, ALICE, UnitKind::Knight, 1, wall_at);
    step(&mut m, 1);
    // 20 dps x 3.0 multiplier x 0.1 s.
    let hp = tile(&m, wall_at).structure.unwrap().hp;
    assert!((hp - 594.0).abs() < 1e-3, "hp {hp}");
}

#[test]
fn tower_shoots_nearest_enemy_on_cooldown() {
    let mut m = playing_match();
    clear_squads(&mut m);
    let tower_at = TilePos::new(12, 10);
    m.state_mut().map.get_mut(tower_at).unwrap().structure =
        Some(map::Structure::new(StructureKind::Tower, 300.0));
    let far = place_squad(&mut m, BOB, UnitKind::Militia, 3, TilePos::new(16, 10));
    let near = place_squad(&mut m, BOB, UnitKind::Militia, 3, TilePos::new(14, 10));

    step(&mut m, 1);
    assert!((total_hp(&m, near) - 285.0).abs() < 1e-3);
    assert!((total_hp(&m, far) - 300.0).abs() < 1e-3);

    step(&mut m, 5);
    assert!((total_hp(&m, near) - 285.0).abs() < 1e-3);

    step(&mut m, 10);
    assert!((total_hp(&m, near) - 270.0).abs() < 1e-3);
}
