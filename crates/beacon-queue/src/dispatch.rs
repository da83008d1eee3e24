use crate::report::BroadcastReport;
use crate::worker::{self, QueueOp, WorkerHandle};
use beacon_core::{AgentId, BeaconError, BeaconResult, Command};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-agent FIFO command queues.
///
/// Every registered agent is served by its own worker task, which owns the
/// agent's sequence and applies operations in the order they arrive. The map
/// lock is only held to insert, remove or clone a worker handle, so agents
/// never contend with each other and no lock is held across an `.await`.
///
/// Workers are spawned on the ambient Tokio runtime; [`DispatchQueue::register`]
/// must be called from within one.
pub struct DispatchQueue {
    agents: RwLock<HashMap<AgentId, WorkerHandle>>,
}

impl DispatchQueue {
    /// Creates a queue with no registered agents.
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an empty queue for the agent, discarding any existing backlog.
    pub fn register(&self, agent_id: AgentId) {
        let handle = worker::spawn(agent_id);
        let previous = self.agents.write().insert(agent_id, handle);
        if previous.is_some() {
            info!(agent_id = %agent_id, "Agent re-registered, backlog discarded");
        } else {
            info!(agent_id = %agent_id, "Agent queue registered");
        }
    }

    /// Removes the agent's queue entirely. Returns whether one existed.
    pub fn evict(&self, agent_id: AgentId) -> bool {
        let removed = self.agents.write().remove(&agent_id).is_some();
        if removed {
            info!(agent_id = %agent_id, "Agent queue evicted");
        }
        removed
    }

    /// Mints a command and appends it to the agent's queue.
    ///
    /// Returns the minted command id.
    pub async fn enqueue(
        &self,
        agent_id: AgentId,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> BeaconResult<Uuid> {
        let handle = self.handle(agent_id)?;
        let command = Command::new(command, args);
        let command_id = command.id;
        ask(agent_id, &handle, |reply| QueueOp::Enqueue { command, reply }).await?;
        debug!(agent_id = %agent_id, command_id = %command_id, "Command queued");
        Ok(command_id)
    }

    /// Queues the command for every agent registered at call time.
    ///
    /// Each agent gets its own command id. Agents registering concurrently
    /// may or may not be included.
    pub async fn enqueue_all(
        &self,
        command: impl Into<String>,
        args: Vec<String>,
    ) -> BroadcastReport {
        let command = command.into();
        let mut report = BroadcastReport::default();
        for (agent_id, handle) in self.snapshot() {
            let queued = Command::new(command.clone(), args.clone());
            let command_id = queued.id;
            match ask(agent_id, &handle, |reply| QueueOp::Enqueue {
                command: queued,
                reply,
            })
            .await
            {
                Ok(()) => report.deliver(agent_id, command_id),
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Broadcast enqueue failed");
                    report.fail(agent_id, &e);
                }
            }
        }
        info!(
            command = %command,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Command broadcast"
        );
        report
    }

    /// Removes and returns the oldest pending command.
    ///
    /// `Ok(None)` means the agent is registered but has nothing pending.
    pub async fn dequeue(&self, agent_id: AgentId) -> BeaconResult<Option<Command>> {
        let handle = self.handle(agent_id)?;
        let next = ask(agent_id, &handle, |reply| QueueOp::Dequeue { reply }).await?;
        if let Some(cmd) = &next {
            debug!(agent_id = %agent_id, command_id = %cmd.id, "Command dequeued");
        }
        Ok(next)
    }

    /// Removes the most recently queued command.
    pub async fn retract_last(&self, agent_id: AgentId) -> BeaconResult<()> {
        let handle = self.handle(agent_id)?;
        match ask(agent_id, &handle, |reply| QueueOp::RetractLast { reply }).await? {
            Some(cmd) => {
                debug!(agent_id = %agent_id, command_id = %cmd.id, "Command retracted");
                Ok(())
            }
            None => Err(BeaconError::EmptyQueue(agent_id)),
        }
    }

    /// Removes the most recently queued command from every registered agent.
    ///
    /// Unlike [`retract_last`](Self::retract_last), an empty queue is not an
    /// error here: the agent is reported as skipped.
    pub async fn retract_last_all(&self) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for (agent_id, handle) in self.snapshot() {
            match ask(agent_id, &handle, |reply| QueueOp::RetractLast { reply }).await {
                Ok(Some(cmd)) => report.deliver(agent_id, cmd.id),
                Ok(None) => report.skip(agent_id),
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Broadcast retract failed");
                    report.fail(agent_id, &e);
                }
            }
        }
        info!(
            retracted = report.delivered.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Last command retracted from all agents"
        );
        report
    }

    /// Number of commands waiting for the agent.
    pub async fn pending(&self, agent_id: AgentId) -> BeaconResult<usize> {
        let handle = self.handle(agent_id)?;
        ask(agent_id, &handle, |reply| QueueOp::Pending { reply }).await
    }

    /// Whether the agent currently has a queue.
    pub fn is_registered(&self, agent_id: AgentId) -> bool {
        self.agents.read().contains_key(&agent_id)
    }

    /// Registered agents, sorted.
    pub fn agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.agents.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    /// True if no agent is registered.
    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    fn handle(&self, agent_id: AgentId) -> BeaconResult<WorkerHandle> {
        self.agents
            .read()
            .get(&agent_id)
            .cloned()
            .ok_or(BeaconError::NotRegistered(agent_id))
    }

    fn snapshot(&self) -> Vec<(AgentId, WorkerHandle)> {
        self.agents
            .read()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Sends one operation to a worker and waits for its reply.
///
/// A worker that is no longer running has no queue to offer, so it reads as
/// unregistered.
async fn ask<T>(
    agent_id: AgentId,
    handle: &WorkerHandle,
    make: impl FnOnce(oneshot::Sender<T>) -> QueueOp,
) -> BeaconResult<T> {
    let (reply, rx) = oneshot::channel();
    handle
        .send(make(reply))
        .map_err(|_| BeaconError::NotRegistered(agent_id))?;
    rx.await.map_err(|_| BeaconError::NotRegistered(agent_id))
}
