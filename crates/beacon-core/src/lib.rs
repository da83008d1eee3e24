//! Core types and error definitions for the Beacon control plane.
//!
//! This crate provides the types shared by the dispatch queue, the store and
//! the HTTP gateway, together with the wire shapes an agent exchanges with the
//! server.
//!
//! # Main types
//!
//! - [`BeaconError`]: Unified error enum for all Beacon subsystems.
//! - [`BeaconResult`]: Convenience alias for `Result<T, BeaconError>`.
//! - [`AgentId`]: Validated identifier of a registered agent.
//! - [`Agent`]: Durable record of a registered agent.
//! - [`Command`]: A unit of work dispatched to an agent.
//! - [`PollResponse`]: What an agent receives when it polls for work.
//! - [`CommandReport`]: What an agent posts back after executing a command.
//! - [`CommandResult`]: Durable record of an executed command and its output.

/// Agent identifiers and records.
pub mod agent;
/// Commands and their wire envelopes.
pub mod command;

pub use agent::{Agent, AgentId};
pub use command::{Command, CommandReport, CommandResult, PollResponse};

// --- Error types ---

/// Top-level error type for the Beacon control plane.
///
/// The first two variants are the only failures the dispatch queue can
/// produce; everything else originates at the boundary or in the store.
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    /// The operation targeted an agent that has no queue.
    #[error("message queue has not been registered yet for id: {0}")]
    NotRegistered(AgentId),

    /// A single-agent retraction found nothing to remove.
    #[error("message queue empty for id: {0}")]
    EmptyQueue(AgentId),

    /// A path or body identifier that is not a usable agent id.
    #[error("invalid UUID: {0}")]
    InvalidAgentId(String),

    /// A malformed request payload.
    #[error("{0}")]
    BadRequest(String),

    /// Registration with an id that is already on record.
    #[error("duplicate UUID, please generate a new UUID: {0}")]
    DuplicateAgent(AgentId),

    /// An operation on an agent that is not on record.
    #[error("agent does not exist with id: {0}")]
    UnknownAgent(AgentId),

    /// An error from the persistence store.
    #[error("Store error: {0}")]
    Store(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BeaconError {
    /// Returns true for the error kinds the dispatch queue itself produces.
    pub fn is_queue_error(&self) -> bool {
        matches!(self, Self::NotRegistered(_) | Self::EmptyQueue(_))
    }
}

/// A convenience `Result` alias using [`BeaconError`].
pub type BeaconResult<T> = Result<T, BeaconError>;
