use super::*;

fn train_militia(m: &mut Match, building: TilePos) {
    m.queue_command(
        alice(),
        Command::TrainUnit {
            building,
            unit: UnitKind::Militia,
        },
    );
}

fn trained_squad(events: &[EventEnvelope]) -> Option<SquadId> {
    events.iter().find_map(|e| match e.event {
        MatchEvent::UnitTrained { squad_id, .. } => Some(squad_id),
        _ => None,
    })
}

#[test]
fn trained_unit_merges_into_idle_squad_at_exit() {
    let mut m = playing_match();
    let starting = squads_of(&m, ALICE)[0].id;
    train_militia(&mut m, ALICE_SPAWN);
    let events = step(&mut m, 60);

    assert_eq!(trained_squad(&events), Some(starting));
    assert_eq!(squads_of(&m, ALICE).len(), 1);
    assert_eq!(squad(&m, starting).unwrap().units.len(), 6);
    assert!(!m.state().training.contains_key(&ALICE_SPAWN));
}

#[test]
fn full_squad_forces_a_new_one() {
    let mut m = playing_match();
    clear_squads(&mut m);
    let full = place_squad(&mut m, ALICE, UnitKind::Militia, 12, TilePos::new(11, 10));
    train_militia(&mut m, ALICE_SPAWN);
    let events = step(&mut m, 60);

    let new_id = trained_squad(&events).unwrap();
    assert_ne!(new_id, full);
    assert_eq!(squad(&m, full).unwrap().units.len(), 12);
    assert_eq!(squad(&m, new_id).unwrap().units.len(), 1);
}

#[test]
fn rally_point_routes_a_fresh_squad() {
    let mut m = playing_match();
    let starting = squads_of(&m, ALICE)[0].id;
    let rally = TilePos::new(15, 15);
    m.queue_command(
        alice(),
        Command::SetRallyPoint {
            building: ALICE_SPAWN,
            target: rally,
        },
    );
    train_militia(&mut m, ALICE_SPAWN);

    let mut trained = None;
    for _ in 0..60 {
        let events = m.tick(DT);
        if let Some(id) = trained_squad(&events) {
            trained = Some(id);
            break;
        }
    }
    let id = trained.unwrap();
    assert_ne!(id, starting);
    assert_eq!(squad(&m, id).unwrap().destination(), Some(rally));
    assert_eq!(squad(&m, starting).unwrap().units.len(), 5);
}

#[test]
fn disconnected_building_pauses_its_queue() {
    let mut m = playing_match();
    train_militia(&mut m, ALICE_SPAWN);
    step(&mut m, 1);
    let before = m.state().training[&ALICE_SPAWN][0].remaining_secs;

    m.state_mut().map.get_mut(ALICE_SPAWN).unwrap().connected = false;
    // Stay clear of the supply pass at tick 10, which would reconnect it.
    step(&mut m, 6);
    let after = m.state().training[&ALICE_SPAWN][0].remaining_secs;
    assert!((before - after).abs() < f32::EPSILON);
}

#[test]
fn queue_is_dropped_with_its_building() {
    let mut m = playing_match();
    let barracks = TilePos::new(12, 12);
    m.state_mut().map.get_mut(barracks).unwrap().structure =
        Some(map::Structure::new(StructureKind::Barracks, 400.0));
    train_militia(&mut m, barracks);
    step(&mut m, 1);
    assert_eq!(m.state().training[&barracks].len(), 1);

    m.state_mut().map.get_mut(barracks).unwrap().structure = None;
    step(&mut m, 1);
    assert!(!m.state().training.contains_key(&barracks));
}
