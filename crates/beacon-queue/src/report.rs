use beacon_core::{AgentId, BeaconError};
use serde::Serialize;
use uuid::Uuid;

/// One agent a broadcast reached, with the command it concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// The agent.
    #[serde(rename = "agentID")]
    pub agent_id: AgentId,
    /// Command queued for it, or removed from it.
    #[serde(rename = "commandID")]
    pub command_id: Uuid,
}

/// One agent a broadcast could not reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// The agent.
    #[serde(rename = "agentID")]
    pub agent_id: AgentId,
    /// Why it failed.
    pub error: String,
}

/// Per-agent outcome of `enqueue_all` / `retract_last_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Agents the operation was applied to.
    pub delivered: Vec<Delivery>,
    /// Agents left untouched because there was nothing to do.
    pub skipped: Vec<AgentId>,
    /// Agents the operation failed for.
    pub failed: Vec<Failure>,
}

impl BroadcastReport {
    pub(crate) fn deliver(&mut self, agent_id: AgentId, command_id: Uuid) {
        self.delivered.push(Delivery {
            agent_id,
            command_id,
        });
    }

    pub(crate) fn skip(&mut self, agent_id: AgentId) {
        self.skipped.push(agent_id);
    }

    pub(crate) fn fail(&mut self, agent_id: AgentId, error: &BeaconError) {
        self.failed.push(Failure {
            agent_id,
            error: error.to_string(),
        });
    }

    /// True if no agent failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of agents the broadcast considered.
    pub fn total(&self) -> usize {
        self.delivered.len() + self.skipped.len() + self.failed.len()
    }
}
