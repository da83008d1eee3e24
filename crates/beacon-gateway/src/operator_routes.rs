//! Endpoints used by operators to queue, retract and inspect.

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use beacon_core::{Agent, AgentId, BeaconError, BeaconResult, CommandResult};
use beacon_queue::BroadcastReport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Body of a command submission.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    /// Program or built-in the agent should run.
    pub command: String,
    /// Arguments passed to it.
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandRequest {
    // An empty command would look like the idle response to the agent.
    fn validate(self) -> BeaconResult<Self> {
        if self.command.trim().is_empty() {
            return Err(BeaconError::BadRequest("command must not be empty".into()));
        }
        Ok(self)
    }
}

/// Response to a single-agent submission.
#[derive(Debug, Serialize)]
pub struct Queued {
    /// Id minted for the queued command.
    #[serde(rename = "commandID")]
    pub command_id: Uuid,
}

/// A stored agent together with its live queue state.
#[derive(Debug, Serialize)]
pub struct AgentStatus {
    /// The stored record.
    #[serde(flatten)]
    pub agent: Agent,
    /// Whether the dispatch queue currently holds an entry for the agent.
    pub queued: bool,
    /// Commands waiting for the agent.
    pub pending: usize,
}

fn command_request(
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> ApiResult<CommandRequest> {
    let Json(req) = payload.map_err(ApiError::from)?;
    Ok(req.validate()?)
}

/// `POST /server/command/{id}`
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> ApiResult<Json<Queued>> {
    let id = AgentId::parse(&raw_id)?;
    let req = command_request(payload)?;
    let command_id = state.queue.enqueue(id, req.command, req.args).await?;
    info!(agent_id = %id, command_id = %command_id, "Command submitted");
    Ok(Json(Queued { command_id }))
}

/// `POST /server/command`
pub async fn enqueue_all(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> ApiResult<Json<BroadcastReport>> {
    let req = command_request(payload)?;
    Ok(Json(state.queue.enqueue_all(req.command, req.args).await))
}

/// `DELETE /server/command/{id}`
pub async fn retract_last(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = AgentId::parse(&raw_id)?;
    state.queue.retract_last(id).await?;
    Ok(StatusCode::OK)
}

/// `DELETE /server/command`
pub async fn retract_last_all(State(state): State<Arc<AppState>>) -> Json<BroadcastReport> {
    Json(state.queue.retract_last_all().await)
}

/// `GET /server/agent`
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<AgentStatus>>> {
    let agents = state.agents.list_agents().await?;
    let mut statuses = Vec::with_capacity(agents.len());
    for agent in agents {
        let pending = state.queue.pending(agent.id).await;
        statuses.push(AgentStatus {
            queued: pending.is_ok(),
            pending: pending.unwrap_or(0),
            agent,
        });
    }
    Ok(Json(statuses))
}

/// `DELETE /server/agent/{id}`: forgets the agent and drops its queue.
///
/// The queue entry is evicted only once the store delete succeeded, so a
/// failed delete leaves the agent fully operational. The agent's lifecycle
/// lock is held throughout, so a concurrent registration lands either before
/// the delete or after the eviction.
pub async fn delete_agent(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = AgentId::parse(&raw_id)?;

    let _lifecycle = state.lifecycle.lock(id).await;
    if !state.agents.agent_exists(id).await? {
        return Err(BeaconError::UnknownAgent(id).into());
    }

    let rows = state.agents.delete_agent(id).await?;
    if rows != 1 {
        return Err(BeaconError::Store(format!("delete agent removed {rows} rows")).into());
    }

    if !state.queue.evict(id) {
        warn!(agent_id = %id, "Deleted agent had no queue entry");
    }
    info!(agent_id = %id, "Agent deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /server/agent/{id}/results`
pub async fn list_results(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Vec<CommandResult>>> {
    let id = AgentId::parse(&raw_id)?;
    Ok(Json(state.commands.list_command_results(id).await?))
}
