mod config;

use beacon_core::AgentId;
use beacon_gateway::{restore_registrations, GatewayServer};
use beacon_queue::DispatchQueue;
use beacon_store::{AgentStore, CommandStore, SqliteStore};
use clap::{Parser, Subcommand};
use config::BeaconConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beacon", about = "Beacon command dispatch server", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "beacon.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// SQLite database path (overrides config)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// List registered agents
    Agents,
    /// Show the command results an agent reported
    Results {
        /// Agent UUID
        agent: String,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_file(debug)
        .with_line_number(debug)
        .json()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = BeaconConfig::load(&cli.config)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Commands::Serve { host, port, db } = &cli.command {
        config.apply_overrides(host.clone(), *port, db.clone());
    }

    init_tracing(config.debug);

    match cli.command {
        Commands::Serve { .. } => serve(config).await?,
        Commands::Agents => {
            let store = SqliteStore::open(&config.store.path)?;
            let agents = store.list_agents().await?;
            if agents.is_empty() {
                println!("No agents registered.");
            } else {
                for agent in &agents {
                    println!(
                        "{}  {:<39}  {}",
                        agent.id,
                        agent.ip,
                        agent.registered_at.to_rfc3339()
                    );
                }
                println!("\nTotal: {} agent(s)", agents.len());
            }
        }
        Commands::Results { agent } => {
            let id = AgentId::parse(&agent)?;
            let store = SqliteStore::open(&config.store.path)?;
            let results = store.list_command_results(id).await?;
            if results.is_empty() {
                println!("No results for {id}.");
            }
            for result in &results {
                println!(
                    "[{}] {} {} {}",
                    result.received_at.to_rfc3339(),
                    result.command_id,
                    result.command,
                    result.args.join(" ")
                );
                println!("{}", result.output);
            }
        }
    }

    Ok(())
}

async fn serve(config: BeaconConfig) -> anyhow::Result<()> {
    let store = Arc::new(SqliteStore::open(&config.store.path)?);
    let queue = Arc::new(DispatchQueue::new());
    restore_registrations(&queue, store.as_ref()).await?;

    let app = GatewayServer::build(queue, store.clone(), store);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, db = %config.store.path.display(), "Beacon listening");

    let signalled = Arc::new(Notify::new());
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let signalled = signalled.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received, draining connections");
            signalled.notify_one();
        }
    });

    let grace = Duration::from_secs(config.server.shutdown_timeout_secs);
    tokio::select! {
        res = async { server.await } => res?,
        _ = async {
            signalled.notified().await;
            tokio::time::sleep(grace).await;
        } => warn!(
            grace_secs = grace.as_secs(),
            "Shutdown timeout elapsed, closing open connections"
        ),
    }

    info!("Beacon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
