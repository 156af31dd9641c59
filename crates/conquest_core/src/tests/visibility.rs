use super::*;
use crate::visibility::build_snapshot;

fn visible(m: &Match, viewer: PlayerSlot, at: TilePos) -> bool {
    let mask = visibility_mask(m.state(), &m.content().constants, viewer);
    mask[(at.y * m.state().map.width() + at.x) as usize]
}

#[test]
fn vision_covers_territory_and_squads_only() {
    let m = playing_match();
    assert!(visible(&m, ALICE, ALICE_SPAWN));
    // Territory edge at x = 12 plus two tiles of vision.
    assert!(visible(&m, ALICE, TilePos::new(14, 10)));
    // Starting squad at (11, 10) sees seven tiles out.
    assert!(visible(&m, ALICE, TilePos::new(18, 10)));
    assert!(!visible(&m, ALICE, TilePos::new(19, 10)));
    assert!(!visible(&m, ALICE, BOB_SPAWN));
    assert!(visible(&m, BOB, BOB_SPAWN));
}

#[test]
fn enemy_squads_are_hidden_outside_vision() {
    let mut m = playing_match();
    let snapshot =
        build_snapshot(m.state(), &m.content().constants, ALICE, 100.0, &[]).unwrap();
    assert!(snapshot.squads.iter().all(|s| s.owner == ALICE));
    assert_eq!(snapshot.roster.len(), 2);
    assert!(snapshot.tiles.iter().all(|t| t.at.x < 20));

    let scout = place_squad(&mut m, BOB, UnitKind::Militia, 1, TilePos::new(15, 10));
    let snapshot =
        build_snapshot(m.state(), &m.content().constants, ALICE, 100.0, &[]).unwrap();
    let seen = snapshot.squads.iter().find(|s| s.id == scout).unwrap();
    assert_eq!(seen.owner, BOB);
    assert_eq!(seen.destination, None);
}

#[test]
fn own_squads_carry_destination() {
    let mut m = playing_match();
    let id = squads_of(&m, ALICE)[0].id;
    m.queue_command(
        alice(),
        Command::MoveSquad {
            squad_id: id,
            target: TilePos::new(16, 16),
        },
    );
    step(&mut m, 1);
    let snapshot =
        build_snapshot(m.state(), &m.content().constants, ALICE, 100.0, &[]).unwrap();
    let own = snapshot.squads.iter().find(|s| s.id == id).unwrap();
    assert_eq!(own.destination, Some(TilePos::new(16, 16)));
    assert_eq!(own.units.len(), 5);
    assert!((snapshot.gold - m.state().contestants[0].gold).abs() < f64::EPSILON);
}

#[test]
fn snapshot_tiles_report_structures_and_claims() {
    let m = playing_match();
    let snapshot =
        build_snapshot(m.state(), &m.content().constants, ALICE, 100.0, &[]).unwrap();
    let castle = snapshot.tiles.iter().find(|t| t.at == ALICE_SPAWN).unwrap();
    assert_eq!(castle.structure, Some(StructureKind::Castle));
    assert_eq!(castle.structure_hp, Some(1000.0));
    assert_eq!(castle.owner, Some(ALICE));
    let json = serde_json::to_string(&snapshot).unwrap();
    assert!(json.contains("\"Castle\""));
}

#[test]
fn fogged_enemy_events_are_withheld() {
    let m = playing_match();
    let envelope = |n: u64, event: MatchEvent| EventEnvelope {
        id: EventId(format!("evt_{n:06}")),
        tick: 1,
        event,
    };
    let events = vec![
        envelope(
            0,
            MatchEvent::StructureBuilt {
                owner: bob(),
                at: TilePos::new(31, 10),
                kind: StructureKind::Tower,
            },
        ),
        envelope(
            1,
            MatchEvent::StructureBuilt {
                owner: bob(),
                at: TilePos::new(14, 10),
                kind: StructureKind::Wall,
            },
        ),
        envelope(
            2,
            MatchEvent::TileCaptured {
                at: TilePos::new(30, 12),
                new_owner: bob(),
                previous_owner: Some(alice()),
            },
        ),
        envelope(
            3,
            MatchEvent::SquadDestroyed {
                owner: bob(),
                squad_id: SquadId(99),
            },
        ),
        envelope(
            4,
            MatchEvent::ContestantEliminated { contestant: bob() },
        ),
    ];

    let snapshot =
        build_snapshot(m.state(), &m.content().constants, ALICE, 100.0, &events).unwrap();
    let ids: Vec<&str> = snapshot.events.iter().map(|e| e.id.0.as_str()).collect();
    assert_eq!(ids, vec!["evt_000001", "evt_000002", "evt_000004"]);

    let snapshot =
        build_snapshot(m.state(), &m.content().constants, BOB, 100.0, &events).unwrap();
    assert_eq!(snapshot.events.len(), events.len());
}
