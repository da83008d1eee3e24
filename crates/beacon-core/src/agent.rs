use crate::{BeaconError, BeaconResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of an agent. Never the nil UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Uuid", into = "Uuid")]
pub struct AgentId(Uuid);

impl AgentId {
    /// Mints a fresh random agent id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses and validates an agent id from its textual form.
    pub fn parse(input: &str) -> BeaconResult<Self> {
        let id = Uuid::parse_str(input.trim())
            .map_err(|e| BeaconError::InvalidAgentId(format!("{input}: {e}")))?;
        Self::try_from(id)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Uuid> for AgentId {
    type Error = BeaconError;

    fn try_from(id: Uuid) -> BeaconResult<Self> {
        if id.is_nil() {
            return Err(BeaconError::InvalidAgentId(format!("{id}: nil UUID")));
        }
        Ok(Self(id))
    }
}

impl From<AgentId> for Uuid {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

impl FromStr for AgentId {
    type Err = BeaconError;

    fn from_str(s: &str) -> BeaconResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered agent as kept by the persistence store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// The agent's identifier.
    pub id: AgentId,
    /// Address the agent registered from.
    pub ip: IpAddr,
    /// UTC timestamp of registration.
    pub registered_at: DateTime<Utc>,
}

impl Agent {
    /// Creates an agent record stamped with the current time.
    pub fn new(id: AgentId, ip: IpAddr) -> Self {
        Self {
            id,
            ip,
            registered_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let raw = Uuid::new_v4();
        let id = AgentId::parse(&raw.to_string()).unwrap();
        assert_eq!(id.as_uuid(), raw);
        assert_eq!(id.to_string(), raw.to_string());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = AgentId::parse("not-a-uuid").unwrap_err();
        assert!(matches!(err, BeaconError::InvalidAgentId(_)));
        assert!(err.to_string().starts_with("invalid UUID: not-a-uuid"));
    }

    #[test]
    fn test_parse_rejects_nil() {
        let err = AgentId::parse("00000000-0000-0000-0000-000000000000").unwrap_err();
        assert!(matches!(err, BeaconError::InvalidAgentId(_)));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = AgentId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_deserialize_rejects_nil() {
        let json = "\"00000000-0000-0000-0000-000000000000\"";
        assert!(serde_json::from_str::<AgentId>(json).is_err());
    }
}
