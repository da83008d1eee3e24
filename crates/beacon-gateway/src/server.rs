use crate::locks::AgentLocks;
use crate::middleware::request_log_middleware;
use crate::{agent_routes, operator_routes};
use axum::{
    extract::State,
    middleware as axum_mw,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use beacon_core::BeaconResult;
use beacon_queue::DispatchQueue;
use beacon_store::{AgentStore, CommandStore};
use std::sync::Arc;
use tracing::info;

/// Shared application state.
pub struct AppState {
    /// In-memory command queues.
    pub queue: Arc<DispatchQueue>,
    /// Registered agents.
    pub agents: Arc<dyn AgentStore>,
    /// Reported command output.
    pub commands: Arc<dyn CommandStore>,
    /// Serialises registration and deletion of the same agent.
    pub lifecycle: AgentLocks,
}

impl AppState {
    /// Creates the state with an empty lock table.
    pub fn new(
        queue: Arc<DispatchQueue>,
        agents: Arc<dyn AgentStore>,
        commands: Arc<dyn CommandStore>,
    ) -> Self {
        Self {
            queue,
            agents,
            commands,
            lifecycle: AgentLocks::new(),
        }
    }
}

/// The HTTP boundary in front of the dispatch queue and the store.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the router with request logging applied to every route.
    pub fn build(
        queue: Arc<DispatchQueue>,
        agents: Arc<dyn AgentStore>,
        commands: Arc<dyn CommandStore>,
    ) -> Router {
        Self::from_state(Arc::new(AppState::new(queue, agents, commands)))
    }

    /// Build the router over an existing state.
    pub fn from_state(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/ping", get(ping_handler))
            .route("/health", get(health_handler))
            .route("/agent/register/{id}", post(agent_routes::register))
            .route(
                "/agent/command/{id}",
                get(agent_routes::poll).post(agent_routes::report),
            )
            .route(
                "/server/command",
                post(operator_routes::enqueue_all).delete(operator_routes::retract_last_all),
            )
            .route(
                "/server/command/{id}",
                post(operator_routes::enqueue).delete(operator_routes::retract_last),
            )
            .route("/server/agent", get(operator_routes::list_agents))
            .route("/server/agent/{id}", delete(operator_routes::delete_agent))
            .route(
                "/server/agent/{id}/results",
                get(operator_routes::list_results),
            )
            .layer(axum_mw::from_fn(request_log_middleware))
            .with_state(state)
    }
}

/// Gives every agent on record an empty queue.
///
/// Queues do not survive a restart but registrations do; without this, known
/// agents would poll into `NotRegistered` and be refused re-registration as
/// duplicates.
pub async fn restore_registrations(
    queue: &DispatchQueue,
    agents: &dyn AgentStore,
) -> BeaconResult<usize> {
    let known = agents.list_agents().await?;
    for agent in &known {
        queue.register(agent.id);
    }
    info!(count = known.len(), "Agent registrations restored");
    Ok(known.len())
}

async fn ping_handler() -> impl IntoResponse {
    Json(serde_json::json!({"response": "pong"}))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "beacon",
        "agents": state.queue.len(),
    }))
}
