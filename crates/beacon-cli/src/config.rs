//! `beacon.toml` loading and layering.
//!
//! Values resolve as defaults, then the TOML file, then `BEACON_*`
//! environment variables, then command-line flags.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BeaconConfig {
    /// Verbose logging with source locations.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long in-flight requests get to finish after a shutdown signal.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_shutdown_timeout() -> u64 {
    10
}
fn default_db_path() -> PathBuf {
    PathBuf::from("beacon.sqlite")
}

impl BeaconConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read config file '{}'", path.display())
                })
            }
        };
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Overrides values from `BEACON_*` variables found through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(debug) = lookup("BEACON_DEBUG") {
            self.debug = parse_bool(&debug)
                .with_context(|| format!("BEACON_DEBUG: expected a boolean, got '{debug}'"))?;
        }
        if let Some(host) = lookup("BEACON_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("BEACON_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("BEACON_PORT: expected a port number, got '{port}'"))?;
        }
        if let Some(path) = lookup("BEACON_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        Ok(())
    }

    /// Applies command-line flags, which take precedence over everything else.
    pub fn apply_overrides(
        &mut self,
        host: Option<String>,
        port: Option<u16>,
        db: Option<PathBuf>,
    ) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        if let Some(db) = db {
            self.store.path = db;
        }
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
