use std::sync::Arc;

use super::*;
use crate::test_fixtures::{base_content, plains_map, RecordingObserver};

fn observed_match(content: MatchContent) -> (Match, RecordingObserver) {
    let observer = RecordingObserver::default();
    let mut m = Match::new(Arc::new(content), 3).with_observer(Box::new(observer.clone()));
    m.add_contestant(alice(), "Alice");
    m.add_contestant(bob(), "Bob");
    (m, observer)
}

fn spawn_both(m: &mut Match) {
    m.start_with_map(plains_map(48, 48)).unwrap();
    m.queue_command(alice(), Command::SelectSpawn { at: ALICE_SPAWN });
    m.queue_command(bob(), Command::SelectSpawn { at: BOB_SPAWN });
    step(m, 1);
}

#[test]
fn join_outcomes() {
    let mut content = base_content();
    content.constants.max_contestants = 2;
    let mut m = Match::new(Arc::new(content), 1);
    assert_eq!(m.add_contestant(alice(), "Alice"), JoinOutcome::Ok);
    assert_eq!(m.add_contestant(alice(), "Alice again"), JoinOutcome::Duplicate);
    assert_eq!(m.add_contestant(bob(), "Bob"), JoinOutcome::Ok);
    assert_eq!(m.add_contestant("carol".into(), "Carol"), JoinOutcome::Full);
    assert!(m.fill_with_bots(10).is_empty());

    m.start_with_map(plains_map(48, 48)).unwrap();
    assert_eq!(m.add_contestant("dave".into(), "Dave"), JoinOutcome::Closed);
}

#[test]
fn roster_slots_and_colours_are_assigned_in_join_order() {
    let mut m = Match::new(Arc::new(base_content()), 1);
    m.add_contestant(alice(), "Alice");
    m.fill_with_bots(3);
    let state = m.state();
    assert_eq!(state.contestants.len(), 3);
    for (i, c) in state.contestants.iter().enumerate() {
        assert_eq!(c.slot.index(), i);
        assert!(c.color.starts_with('#'));
    }
    assert_ne!(state.contestants[0].color, state.contestants[1].color);
    assert!(state.contestants[1].is_bot);
}

#[test]
fn leaving_while_waiting_compacts_the_roster() {
    let mut m = Match::new(Arc::new(base_content()), 1);
    m.add_contestant(alice(), "Alice");
    m.add_contestant(bob(), "Bob");
    m.player_disconnected(&alice());
    assert_eq!(m.state().contestants.len(), 1);
    assert_eq!(m.state().contestants[0].slot, PlayerSlot(0));
    assert_eq!(m.state().contestants[0].id, bob());
}

#[test]
fn colours_stay_unique_after_a_waiting_leave() {
    let mut m = Match::new(Arc::new(base_content()), 1);
    m.add_contestant(alice(), "Alice");
    m.add_contestant(bob(), "Bob");
    m.add_contestant("carol".into(), "Carol");
    m.player_disconnected(&alice());
    m.add_contestant("dave".into(), "Dave");

    let colours: Vec<&str> = m.state().contestants.iter().map(|c| c.color.as_str()).collect();
    assert_eq!(colours.len(), 3);
    for (i, colour) in colours.iter().enumerate() {
        assert!(!colours[i + 1..].contains(colour), "{colour} repeated");
    }
}

#[test]
fn start_errors() {
    let mut empty = Match::new(Arc::new(base_content()), 1);
    assert_eq!(empty.start(), Err(MatchError::NotEnoughContestants));

    let (mut m, _) = observed_match(base_content());
    m.start_with_map(plains_map(48, 48)).unwrap();
    assert_eq!(
        m.start(),
        Err(MatchError::InvalidPhase {
            expected: MatchPhase::Waiting,
            actual: MatchPhase::SpawnSelection,
        })
    );

    let (mut m, _) = observed_match(base_content());
    assert_eq!(
        m.start_with_map(GameMap::filled(8, 8, Terrain::Mountain)),
        Err(MatchError::MapGeneration(MapGenError::NoSpawnSites))
    );
    assert_eq!(m.state().meta.phase, MatchPhase::Waiting);

    m.destroy();
    assert_eq!(m.start(), Err(MatchError::Destroyed));
}

#[test]
fn generated_start_is_reproducible() {
    let build = || {
        let mut m = Match::new(Arc::new(base_content()), 77);
        m.add_contestant(alice(), "Alice");
        m.fill_with_bots(4);
        m.start().unwrap();
        m
    };
    let a = build();
    let b = build();
    assert_eq!(a.match_id(), b.match_id());
    assert_eq!(a.state().map, b.state().map);
    assert_eq!(a.state().spawn_sites, b.state().spawn_sites);
    let capitals = |m: &Match| m.state().contestants.iter().map(|c| c.capital).collect::<Vec<_>>();
    assert_eq!(capitals(&a), capitals(&b));
}

#[test]
fn phase_changes_are_reported_with_match_id() {
    let (mut m, observer) = observed_match(base_content());
    spawn_both(&mut m);
    let recorded = observer.recorded.lock();
    let phases: Vec<MatchPhase> = recorded.phases.iter().map(|(_, p)| *p).collect();
    assert_eq!(phases, vec![MatchPhase::SpawnSelection, MatchPhase::Playing]);
    assert!(recorded.phases.iter().all(|(id, _)| *id == m.match_id()));
}

#[test]
fn snapshots_go_to_connected_humans_only() {
    let (mut m, observer) = observed_match(base_content());
    m.fill_with_bots(3);
    spawn_both(&mut m);
    observer.recorded.lock().snapshots.clear();

    step(&mut m, 1);
    let ids: Vec<ContestantId> = observer
        .recorded
        .lock()
        .snapshots
        .iter()
        .map(|(id, _)| id.clone())
        .collect();
    assert_eq!(ids, vec![alice(), bob()]);

    observer.recorded.lock().snapshots.clear();
    m.player_disconnected(&bob());
    let events = step(&mut m, 1);
    assert!(has_event(&events, |e| matches!(
        e,
        MatchEvent::ContestantDisconnected { contestant } if contestant == &bob()
    )));
    let recorded = observer.recorded.lock();
    assert_eq!(recorded.snapshots.len(), 1);
    assert_eq!(recorded.snapshots[0].0, alice());
    assert!(!recorded.snapshots[0].1.events.is_empty());
    drop(recorded);

    m.player_reconnected(&bob());
    let events = step(&mut m, 1);
    assert!(has_event(&events, |e| matches!(e, MatchEvent::ContestantReconnected { .. })));
    assert_eq!(observer.recorded.lock().snapshots.len(), 3);
}

#[test]
fn timer_expiry_finishes_with_ranked_standings() {
    let mut content = base_content();
    content.constants.match_duration_secs = 1.0;
    let (mut m, observer) = observed_match(content);
    spawn_both(&mut m);
    // Alice takes an extra tile so the ranking is decided.
    m.state_mut().map.get_mut(TilePos::new(13, 10)).unwrap().owner = Some(ALICE);
    m.state_mut().contestants[0].territory = 26;

    let events = step(&mut m, 12);
    assert_eq!(m.state().meta.phase, MatchPhase::Finished);
    assert!(has_event(&events, |e| matches!(
        e,
        MatchEvent::MatchFinished { winner: Some(w) } if w == &alice()
    )));

    let recorded = observer.recorded.lock();
    assert_eq!(recorded.results.len(), 1);
    let standings = &recorded.results[0].standings;
    assert_eq!(standings.len(), 2);
    assert_eq!(standings[0].contestant_id, alice());
    assert_eq!(standings[0].placement, 1);
    assert_eq!(standings[1].placement, 2);
    assert!(standings[0].score >= standings[1].score);
    assert_eq!(recorded.phases.last().map(|(_, p)| *p), Some(MatchPhase::Finished));
    drop(recorded);
    let kept = m.result();
    assert_eq!(kept.standings[0].contestant_id, alice());
    assert!(kept.duration_secs >= 1.0);

    // Finished is terminal.
    assert!(m.tick(DT).is_empty());
}

#[test]
fn dt_is_clamped() {
    let mut m = playing_match();
    let before = m.state().meta.phase_elapsed_secs;
    m.tick(30.0);
    let elapsed = m.state().meta.phase_elapsed_secs - before;
    assert!((elapsed - 0.25).abs() < 1e-6);

    m.tick(-5.0);
    m.tick(f64::NAN);
    let elapsed = m.state().meta.phase_elapsed_secs - before;
    assert!((elapsed - 0.25).abs() < 1e-6);
}

#[test]
fn destroy_is_idempotent_and_final() {
    let mut m = playing_match();
    let queue = m.command_queue();
    m.destroy();
    m.destroy();
    assert!(m.is_destroyed());
    assert!(m.state().squads.is_empty());
    assert!(m.state().training.is_empty());

    queue.push(alice(), 0, Command::SelectSpawn { at: ALICE_SPAWN });
    m.queue_command(alice(), Command::SelectSpawn { at: ALICE_SPAWN });
    let tick = m.state().meta.tick;
    assert!(m.tick(DT).is_empty());
    assert_eq!(m.state().meta.tick, tick);
    assert_eq!(m.add_contestant("late".into(), "Late"), JoinOutcome::Closed);
}
