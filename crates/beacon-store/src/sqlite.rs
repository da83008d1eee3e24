use crate::store::{AgentStore, CommandStore};
use async_trait::async_trait;
use beacon_core::{Agent, AgentId, BeaconError, BeaconResult, CommandResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS agents (
    id            TEXT PRIMARY KEY NOT NULL,
    ip            TEXT NOT NULL,
    registered_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS commands (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id    TEXT NOT NULL,
    command_id  TEXT NOT NULL,
    command     TEXT NOT NULL,
    args        TEXT NOT NULL,
    output      TEXT NOT NULL,
    received_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_commands_agent ON commands(agent_id, command_id);
";

/// SQLite-backed agent and command store.
///
/// One connection guarded by a mutex; every call runs on Tokio's blocking
/// pool so request handlers never block on disk.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> BeaconResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            BeaconError::Store(format!("Failed to open database '{}': {e}", path.display()))
        })?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "Store opened");
        Ok(store)
    }

    /// A private in-memory database, gone when the store is dropped.
    pub fn open_in_memory() -> BeaconResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BeaconError::Store(format!("Failed to open in-memory database: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> BeaconResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| BeaconError::Store(format!("Failed to create schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> BeaconResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock();
            f(&guard)
        })
        .await
        .map_err(|e| BeaconError::Store(format!("{op}: store task failed: {e}")))?
        .map_err(|e| {
            error!(op, error = %e, "Store operation failed");
            BeaconError::Store(format!("{op}: {e}"))
        })
    }
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_agent_id(row: &Row<'_>, idx: usize) -> rusqlite::Result<AgentId> {
    let raw: String = row.get(idx)?;
    AgentId::parse(&raw).map_err(|e| conversion_error(idx, e))
}

fn parse_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn parse_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let ip: String = row.get(1)?;
    Ok(Agent {
        id: parse_agent_id(row, 0)?,
        ip: ip.parse().map_err(|e| conversion_error(1, e))?,
        registered_at: parse_time(row, 2)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<CommandResult> {
    let args: String = row.get(3)?;
    Ok(CommandResult {
        agent_id: parse_agent_id(row, 0)?,
        command_id: parse_uuid(row, 1)?,
        command: row.get(2)?,
        args: serde_json::from_str(&args).map_err(|e| conversion_error(3, e))?,
        output: row.get(4)?,
        received_at: parse_time(row, 5)?,
    })
}

#[async_trait]
impl AgentStore for SqliteStore {
    async fn insert_agent(&self, agent: &Agent) -> BeaconResult<u64> {
        let id = agent.id;
        let agent = agent.clone();
        let inserted = self
            .with_conn("insert agent", move |conn| {
                let res = conn.execute(
                    "INSERT INTO agents (id, ip, registered_at) VALUES (?1, ?2, ?3)",
                    params![
                        agent.id.to_string(),
                        agent.ip.to_string(),
                        agent.registered_at.to_rfc3339()
                    ],
                );
                match res {
                    Ok(rows) => Ok(Some(rows)),
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.code == ErrorCode::ConstraintViolation =>
                    {
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .await?;
        let rows = inserted.ok_or(BeaconError::DuplicateAgent(id))?;
        Ok(rows as u64)
    }

    async fn agent_exists(&self, id: AgentId) -> BeaconResult<bool> {
        self.with_conn("check agent", move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM agents WHERE id = ?1)",
                params![id.to_string()],
                |row| row.get(0),
            )
        })
        .await
    }

    async fn get_agent(&self, id: AgentId) -> BeaconResult<Option<Agent>> {
        self.with_conn("get agent", move |conn| {
            conn.query_row(
                "SELECT id, ip, registered_at FROM agents WHERE id = ?1 LIMIT 1",
                params![id.to_string()],
                agent_from_row,
            )
            .optional()
        })
        .await
    }

    async fn list_agents(&self) -> BeaconResult<Vec<Agent>> {
        self.with_conn("list agents", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ip, registered_at FROM agents ORDER BY registered_at, id",
            )?;
            let agents = stmt.query_map([], agent_from_row)?;
            agents.collect()
        })
        .await
    }

    async fn delete_agent(&self, id: AgentId) -> BeaconResult<u64> {
        let rows = self
            .with_conn("delete agent", move |conn| {
                conn.execute("DELETE FROM agents WHERE id = ?1", params![id.to_string()])
            })
            .await?;
        Ok(rows as u64)
    }
}

#[async_trait]
impl CommandStore for SqliteStore {
    async fn insert_command_result(&self, result: &CommandResult) -> BeaconResult<u64> {
        let args = serde_json::to_string(&result.args)?;
        let result = result.clone();
        let rows = self
            .with_conn("insert command result", move |conn| {
                conn.execute(
                    "INSERT INTO commands (agent_id, command_id, command, args, output, received_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        result.agent_id.to_string(),
                        result.command_id.to_string(),
                        result.command,
                        args,
                        result.output,
                        result.received_at.to_rfc3339()
                    ],
                )
            })
            .await?;
        Ok(rows as u64)
    }

    async fn get_command_result(
        &self,
        agent_id: AgentId,
        command_id: Uuid,
    ) -> BeaconResult<Option<CommandResult>> {
        self.with_conn("get command result", move |conn| {
            conn.query_row(
                "SELECT agent_id, command_id, command, args, output, received_at
                 FROM commands WHERE agent_id = ?1 AND command_id = ?2
                 ORDER BY seq LIMIT 1",
                params![agent_id.to_string(), command_id.to_string()],
                result_from_row,
            )
            .optional()
        })
        .await
    }

    async fn list_command_results(&self, agent_id: AgentId) -> BeaconResult<Vec<CommandResult>> {
        self.with_conn("list command results", move |conn| {
            let mut stmt = conn.prepare(
                "SELECT agent_id, command_id, command, args, output, received_at
                 FROM commands WHERE agent_id = ?1 ORDER BY seq",
            )?;
            let results = stmt.query_map(params![agent_id.to_string()], result_from_row)?;
            results.collect()
        })
        .await
    }
}
