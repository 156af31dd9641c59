//! Fan-out of engine callbacks to transport subscribers.
//!
//! The engine calls [`BroadcastObserver`] synchronously inside a tick, so
//! every send is non-blocking and a missing or lagging subscriber is ignored.

use std::collections::HashMap;
use std::sync::Arc;

use conquest_core::{
    ContestantId, ContestantSnapshot, MatchObserver, MatchPhase, MatchResult, PhasePayload,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const SNAPSHOT_BUFFER: usize = 16;
const NOTICE_BUFFER: usize = 64;

/// Match-wide notices delivered to every stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchNotice {
    PhaseChanged {
        match_id: Uuid,
        phase: MatchPhase,
        payload: PhasePayload,
    },
    MatchEnded {
        result: MatchResult,
    },
}

#[derive(Clone)]
pub struct SnapshotHub {
    per_contestant: Arc<Mutex<HashMap<ContestantId, broadcast::Sender<Arc<ContestantSnapshot>>>>>,
    notices: broadcast::Sender<MatchNotice>,
    result: Arc<Mutex<Option<MatchResult>>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(NOTICE_BUFFER);
        Self {
            per_contestant: Arc::new(Mutex::new(HashMap::new())),
            notices,
            result: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self, contestant: &ContestantId) -> broadcast::Receiver<Arc<ContestantSnapshot>> {
        self.per_contestant
            .lock()
            .entry(contestant.clone())
            .or_insert_with(|| broadcast::channel(SNAPSHOT_BUFFER).0)
            .subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<MatchNotice> {
        self.notices.subscribe()
    }

    pub fn result(&self) -> Option<MatchResult> {
        self.result.lock().clone()
    }

    fn publish_snapshot(&self, contestant: &ContestantId, snapshot: ContestantSnapshot) {
        let channels = self.per_contestant.lock();
        if let Some(tx) = channels.get(contestant) {
            // No receivers is fine: the player simply isn't listening.
            let _ = tx.send(Arc::new(snapshot));
        }
    }

    fn publish_notice(&self, notice: MatchNotice) {
        let _ = self.notices.send(notice);
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BroadcastObserver {
    hub: SnapshotHub,
}

impl BroadcastObserver {
    pub fn new(hub: SnapshotHub) -> Self {
        Self { hub }
    }
}

impl MatchObserver for BroadcastObserver {
    fn on_state_update(&mut self, contestant: &ContestantId, snapshot: ContestantSnapshot) {
        self.hub.publish_snapshot(contestant, snapshot);
    }

    fn on_match_end(&mut self, result: &MatchResult) {
        *self.hub.result.lock() = Some(result.clone());
        self.hub.publish_notice(MatchNotice::MatchEnded {
            result: result.clone(),
        });
    }

    fn on_phase_change(&mut self, match_id: Uuid, phase: MatchPhase, payload: &PhasePayload) {
        tracing::debug!(%match_id, ?phase, "broadcasting phase change");
        self.hub.publish_notice(MatchNotice::PhaseChanged {
            match_id,
            phase,
            payload: payload.clone(),
        });
    }
}
