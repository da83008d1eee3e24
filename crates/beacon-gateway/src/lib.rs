//! HTTP boundary for the Beacon control plane.
//!
//! Agents register, poll and report under `/agent`; operators queue, retract
//! and inspect under `/server`. Queue failures map to 404, store failures to
//! 500 with a generic body.

/// Routes called by agents.
pub mod agent_routes;
/// Mapping of errors onto HTTP responses.
pub mod error;
/// Per-agent lifecycle locks.
pub mod locks;
/// Request logging and client address resolution.
pub mod middleware;
/// Routes called by operators.
pub mod operator_routes;
/// Router assembly and shared state.
pub mod server;

pub use error::{ApiError, ApiResult};
pub use locks::AgentLocks;
pub use middleware::ClientIp;
pub use server::{restore_registrations, AppState, GatewayServer};
