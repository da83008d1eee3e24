use async_trait::async_trait;
use beacon_core::{Agent, AgentId, BeaconResult, CommandResult};
use uuid::Uuid;

/// Durable record of registered agents.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Inserts the agent, returning the number of rows written.
    ///
    /// Fails with `DuplicateAgent` when the id is already on record.
    async fn insert_agent(&self, agent: &Agent) -> BeaconResult<u64>;
    /// Whether an agent with this id is on record.
    async fn agent_exists(&self, id: AgentId) -> BeaconResult<bool>;
    /// The stored record, if any.
    async fn get_agent(&self, id: AgentId) -> BeaconResult<Option<Agent>>;
    /// All agents, oldest registration first.
    async fn list_agents(&self) -> BeaconResult<Vec<Agent>>;
    /// Deletes the agent, returning the number of rows removed.
    async fn delete_agent(&self, id: AgentId) -> BeaconResult<u64>;
}

/// Durable history of executed commands.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// Appends a result, returning the number of rows written.
    async fn insert_command_result(&self, result: &CommandResult) -> BeaconResult<u64>;
    /// One result by agent and command id.
    async fn get_command_result(
        &self,
        agent_id: AgentId,
        command_id: Uuid,
    ) -> BeaconResult<Option<CommandResult>>;
    /// All results reported by the agent, in the order they arrived.
    async fn list_command_results(&self, agent_id: AgentId) -> BeaconResult<Vec<CommandResult>>;
}
