//! Endpoints called by agents: register once, then poll and report.

use crate::error::{ApiError, ApiResult};
use crate::middleware::ClientIp;
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use beacon_core::{Agent, AgentId, BeaconError, CommandReport, CommandResult, PollResponse};
use std::sync::Arc;
use tracing::{debug, info};

/// `POST /agent/register/{id}`: records the agent and gives it a queue.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = AgentId::parse(&raw_id)?;
    let ip = ip
        .ok_or_else(|| BeaconError::BadRequest("unable to determine client address".into()))?;

    let _lifecycle = state.lifecycle.lock(id).await;
    if state.agents.agent_exists(id).await? {
        return Err(BeaconError::DuplicateAgent(id).into());
    }

    let rows = state.agents.insert_agent(&Agent::new(id, ip)).await?;
    if rows != 1 {
        return Err(BeaconError::Store(format!("insert agent wrote {rows} rows")).into());
    }

    state.queue.register(id);
    info!(agent_id = %id, %ip, "Agent registered");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /agent/command/{id}`: hands out the oldest pending command, or the
/// idle response.
pub async fn poll(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<PollResponse>> {
    let id = AgentId::parse(&raw_id)?;
    let next = state.queue.dequeue(id).await?;
    Ok(Json(PollResponse::from(next)))
}

/// `POST /agent/command/{id}`: stores the output of an executed command.
pub async fn report(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    payload: Result<Json<CommandReport>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let id = AgentId::parse(&raw_id)?;
    let Json(report) = payload.map_err(ApiError::from)?;

    let result = CommandResult::from_report(id, report);
    let rows = state.commands.insert_command_result(&result).await?;
    if rows != 1 {
        let msg = format!("insert command result wrote {rows} rows");
        return Err(BeaconError::Store(msg).into());
    }

    debug!(
        agent_id = %id,
        command_id = %result.command_id,
        output_len = result.output.len(),
        "Command output stored"
    );
    Ok(StatusCode::OK)
}
