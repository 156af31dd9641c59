use super::*;
use crate::test_fixtures::{playing_match, ALICE_SPAWN, BOB_SPAWN};

mod combat;
mod commands;
mod lifecycle;
mod training;
mod visibility;

// --- Shared test helpers ------------------------------------------------

const ALICE: PlayerSlot = PlayerSlot(0);
const BOB: PlayerSlot = PlayerSlot(1);
const DT: f64 = 0.1;

fn alice() -> ContestantId {
    "alice".into()
}

fn bob() -> ContestantId {
    "bob".into()
}

/// Runs `ticks` ticks at [`DT`] and returns every event produced.
fn step(m: &mut Match, ticks: usize) -> Vec<EventEnvelope> {
    (0..ticks).flat_map(|_| m.tick(DT)).collect()
}

fn squads_of(m: &Match, owner: PlayerSlot) -> Vec<Squad> {
    m.state()
        .squads
        .iter()
        .filter(|s| s.owner == owner)
        .cloned()
        .collect()
}

fn clear_squads(m: &mut Match) {
    m.state_mut().squads.clear();
    m.sync_spatial();
}

/// Drops a squad of `count` fresh units at the centre of `at`.
fn place_squad(m: &mut Match, owner: PlayerSlot, kind: UnitKind, count: usize, at: TilePos) -> SquadId {
    place_squad_at(m, owner, kind, count, at.center())
}

fn place_squad_at(
    m: &mut Match,
    owner: PlayerSlot,
    kind: UnitKind,
    count: usize,
    position: Position,
) -> SquadId {
    let hp = m.content().unit(kind).unwrap().hp;
    let state = m.state_mut();
    let id = SquadId(state.counters.next_squad_id);
    state.counters.next_squad_id += 1;
    state.squads.push(Squad {
        id,
        owner,
        units: (0..count)
            .map(|_| Unit {
                kind,
                hp,
                max_hp: hp,
            })
            .collect(),
        position,
        path: None,
        path_cursor: 0,
    });
    m.sync_spatial();
    id
}

fn squad(m: &Match, id: SquadId) -> Option<&Squad> {
    m.state().squads.iter().find(|s| s.id == id)
}

fn tile(m: &Match, at: TilePos) -> &Tile {
    m.state().map.get(at).unwrap()
}

fn gold(m: &Match, owner: PlayerSlot) -> f64 {
    m.state().contestants[owner.index()].gold
}

fn has_event(events: &[EventEnvelope], pred: impl Fn(&MatchEvent) -> bool) -> bool {
    events.iter().any(|e| pred(&e.event))
}
