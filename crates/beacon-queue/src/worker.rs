use beacon_core::{AgentId, Command};
use std::collections::VecDeque;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Operations a per-agent worker applies to its sequence.
pub(crate) enum QueueOp {
    /// Append to the tail.
    Enqueue {
        command: Command,
        reply: oneshot::Sender<()>,
    },
    /// Remove and return the head.
    Dequeue {
        reply: oneshot::Sender<Option<Command>>,
    },
    /// Remove and return the tail.
    RetractLast {
        reply: oneshot::Sender<Option<Command>>,
    },
    /// Report the sequence length.
    Pending { reply: oneshot::Sender<usize> },
}

pub(crate) type WorkerHandle = mpsc::UnboundedSender<QueueOp>;

/// Owns one agent's command sequence; the only code that ever touches it.
struct AgentWorker {
    agent_id: AgentId,
    commands: VecDeque<Command>,
    ops: mpsc::UnboundedReceiver<QueueOp>,
}

/// Starts a worker with an empty sequence. The worker stops once every
/// handle to it has been dropped.
pub(crate) fn spawn(agent_id: AgentId) -> WorkerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = AgentWorker {
        agent_id,
        commands: VecDeque::new(),
        ops: rx,
    };
    tokio::spawn(worker.run());
    tx
}

impl AgentWorker {
    async fn run(mut self) {
        while let Some(op) = self.ops.recv().await {
            self.apply(op);
        }
        debug!(
            agent_id = %self.agent_id,
            discarded = self.commands.len(),
            "Queue worker stopped"
        );
    }

    // A dropped reply receiver means the caller went away; the mutation stands.
    fn apply(&mut self, op: QueueOp) {
        match op {
            QueueOp::Enqueue { command, reply } => {
                self.commands.push_back(command);
                let _ = reply.send(());
            }
            QueueOp::Dequeue { reply } => {
                let _ = reply.send(self.commands.pop_front());
            }
            QueueOp::RetractLast { reply } => {
                let _ = reply.send(self.commands.pop_back());
            }
            QueueOp::Pending { reply } => {
                let _ = reply.send(self.commands.len());
            }
        }
    }
}
