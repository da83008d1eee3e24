use crate::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A command queued for, and later executed by, a single agent.
///
/// The `id` is minted by [`Command::new`]; callers outside the dispatch queue
/// only ever see commands the queue has already created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Unique identifier of this dispatch.
    #[serde(rename = "commandID")]
    pub id: Uuid,
    /// Program to run on the agent.
    pub command: String,
    /// Ordered arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Command {
    /// Creates a command with a freshly minted id.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            command: command.into(),
            args,
        }
    }
}

/// Body of a poll response.
///
/// An idle response carries neither `commandID` nor `command`; agents treat an
/// absent or empty `command` as "nothing pending".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    /// Id of the delivered command.
    #[serde(rename = "commandID", default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<Uuid>,
    /// Program to run, absent when idle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Arguments, empty when idle.
    #[serde(default)]
    pub args: Vec<String>,
}

impl PollResponse {
    /// The "nothing pending" response.
    pub fn idle() -> Self {
        Self::default()
    }

    /// True if this response carries no command.
    pub fn is_idle(&self) -> bool {
        self.command_id.is_none() || self.command.as_deref().map_or(true, str::is_empty)
    }

    /// Converts back into a command, or `None` when idle.
    pub fn into_command(self) -> Option<Command> {
        if self.is_idle() {
            return None;
        }
        Some(Command {
            id: self.command_id?,
            command: self.command?,
            args: self.args,
        })
    }
}

impl From<Option<Command>> for PollResponse {
    fn from(command: Option<Command>) -> Self {
        match command {
            Some(cmd) => Self {
                command_id: Some(cmd.id),
                command: Some(cmd.command),
                args: cmd.args,
            },
            None => Self::idle(),
        }
    }
}

/// What an agent posts back after running a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandReport {
    /// The command as it was delivered.
    pub message: Command,
    /// Combined stdout/stderr of the run.
    #[serde(default)]
    pub output: String,
}

/// A command together with the output an agent reported for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Agent that ran the command.
    #[serde(rename = "agentID")]
    pub agent_id: AgentId,
    /// Id minted when the command was queued.
    #[serde(rename = "commandID")]
    pub command_id: Uuid,
    /// Program that was run.
    pub command: String,
    /// Arguments exactly as delivered.
    pub args: Vec<String>,
    /// Reported output.
    pub output: String,
    /// When the server received the report.
    pub received_at: DateTime<Utc>,
}

impl CommandResult {
    /// Builds a result record from an agent's report.
    pub fn from_report(agent_id: AgentId, report: CommandReport) -> Self {
        Self {
            agent_id,
            command_id: report.message.id,
            command: report.message.command,
            args: report.message.args,
            output: report.output,
            received_at: Utc::now(),
        }
    }
}
