//! Per-agent serialisation of registration and deletion.
//!
//! Both handlers check the store and then act on the store and the queue.
//! Holding the agent's lock across the whole sequence keeps the store record
//! and the queue entry in step.

use beacon_core::AgentId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Keyed async locks, one per agent with a lifecycle change in flight.
#[derive(Default)]
pub struct AgentLocks {
    slots: Mutex<HashMap<AgentId, Slot>>,
}

impl AgentLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the agent's lifecycle.
    pub async fn lock(&self, agent_id: AgentId) -> AgentGuard<'_> {
        let slot = self.slots.lock().entry(agent_id).or_default().clone();
        let guard = slot.clone().lock_owned().await;
        AgentGuard {
            locks: self,
            agent_id,
            slot,
            guard: Some(guard),
        }
    }

    /// Number of agents with a lock entry.
    pub fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Held while an agent is being registered or deleted.
pub struct AgentGuard<'a> {
    locks: &'a AgentLocks,
    agent_id: AgentId,
    slot: Slot,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AgentGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.locks.slots.lock();
        // Only the table and this guard still reference the slot: no waiters.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.agent_id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = AgentLocks::new();
        let id = AgentId::new();
        {
            let _guard = locks.lock(id).await;
            assert_eq!(locks.in_flight(), 1);
        }
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_agent_is_exclusive() {
        let locks = Arc::new(AgentLocks::new());
        let id = AgentId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    let _guard = locks.lock(id).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_different_agents_do_not_block() {
        let locks = AgentLocks::new();
        let _a = locks.lock(AgentId::new()).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(AgentId::new())).await;
        assert!(b.is_ok());
    }
}
