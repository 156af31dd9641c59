use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Command, CommandEnvelope, CommandId, ContestantId};

#[derive(Debug, Default)]
struct Pending {
    commands: Vec<CommandEnvelope>,
    next_id: u64,
}

/// Thread-safe command buffer. Transport handlers push at any time; the
/// engine drains it once, atomically, at the start of each tick.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Arc<Mutex<Pending>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, issued_by: ContestantId, issued_tick: u64, command: Command) {
        let mut pending = self.inner.lock();
        let id = CommandId(format!("cmd_{:06}", pending.next_id));
        pending.next_id += 1;
        pending.commands.push(CommandEnvelope {
            id,
            issued_by,
            issued_tick,
            command,
        });
    }

    pub fn extend(&self, envelopes: impl IntoIterator<Item = CommandEnvelope>) {
        self.inner.lock().commands.extend(envelopes);
    }

    pub fn drain(&self) -> Vec<CommandEnvelope> {
        std::mem::take(&mut self.inner.lock().commands)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().commands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TilePos;

    #[test]
    fn drain_empties_queue_in_arrival_order() {
        let queue = CommandQueue::new();
        let handle = queue.clone();
        handle.push("a".into(), 0, Command::SelectSpawn { at: TilePos::new(1, 1) });
        queue.push("b".into(), 0, Command::SelectSpawn { at: TilePos::new(2, 2) });
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].issued_by, ContestantId::from("a"));
        assert_eq!(drained[1].id, CommandId("cmd_000001".to_string()));
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let queue = CommandQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let q = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        q.push(
                            ContestantId(format!("p{t}")),
                            0,
                            Command::SelectSpawn { at: TilePos::new(i, i) },
                        );
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(queue.drain().len(), 200);
    }
}
