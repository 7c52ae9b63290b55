use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use chrono::Utc;
use edgeguard_auth::{
    ChallengeStore, DeviceCredential, DeviceStatus, DeviceStore, SessionStore, SqliteStore,
};
use edgeguard_core::logging;
use edgeguard_crypto::FieldBytes;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

mod config;
mod handlers;
mod middleware;
mod state;

use state::AppState;

#[derive(Parser)]
#[command(author, version, about = "EdgeGuard device authentication gateway")]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (default).
    Serve,
    /// Register or update a device in the configured database.
    Enroll {
        #[arg(long)]
        device_id: String,
        /// Hex enrollment commitment from `edgeguard-zk commitment`
        #[arg(long)]
        commitment: String,
        #[arg(long, default_value = "")]
        public_key: String,
        /// Record the device as revoked instead of active
        #[arg(long)]
        revoked: bool,
    },
    /// Delete expired challenges and sessions from the database.
    Purge,
}

fn app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/auth/session", get(handlers::session))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_session,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/auth/challenge", post(handlers::challenge))
        .route("/auth/verify", post(handlers::verify))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/revoke", post(handlers::revoke))
        .merge(protected)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    logging::init_from_config(&config.logging);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Enroll {
            device_id,
            commitment,
            public_key,
            revoked,
        } => {
            let store = open_database(&config)?;
            let mut device =
                DeviceCredential::new(&device_id, public_key, FieldBytes::from_hex(&commitment)?)?;
            if revoked {
                device.status = DeviceStatus::Revoked;
            }
            store.upsert_device(&device)?;
            info!(device_id = %device_id, status = %device.status, "Device enrolled");
            Ok(())
        }
        Command::Purge => {
            let store = open_database(&config)?;
            let now = Utc::now();
            let challenges = store.purge_expired_challenges(now)?;
            let sessions = store.purge_expired_sessions(now)?;
            info!(challenges, sessions, "Expired records purged");
            Ok(())
        }
    }
}

async fn serve(config: edgeguard_core::Config) -> anyhow::Result<()> {
    let bind = config.server.bind.clone();
    let state = Arc::new(AppState::new(config)?);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {}", bind))?;
    info!("EdgeGuard gateway listening on {}", bind);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn open_database(config: &edgeguard_core::Config) -> anyhow::Result<SqliteStore> {
    let path = config
        .storage
        .database_path
        .as_deref()
        .context("storage.database_path (or EDGEGUARD_DATABASE) is required for this command")?;
    Ok(SqliteStore::open(path)?)
}
