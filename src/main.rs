//! paramvault - Main entry point
//!
//! Starts the HTTP control surface immediately, then runs discovery,
//! readiness polling, avatar seeding, the change listener, and
//! self-advertisement on a dedicated startup task so requests are never
//! starved by a slow (or absent) remote.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mdns_sd::ServiceDaemon;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paramvault::avatar::AvatarState;
use paramvault::config::{Args, Config};
use paramvault::osc::{ChangeListener, ParameterSender, AVATAR_CHANGE_ADDRESS};
use paramvault::oscquery::{advertise, find_service, OscQueryClient};
use paramvault::service::SyncService;
use paramvault::store::SnapshotStore;
use paramvault::{build_router, AppState};

/// Instance name this process advertises itself under
const SELF_SERVICE_NAME: &str = "ParamVault";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paramvault=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::from_args(args).context("Failed to resolve configuration")?;

    info!(
        "Starting paramvault v{} (data folder: {})",
        env!("CARGO_PKG_VERSION"),
        config.data_folder.display()
    );

    let store = SnapshotStore::new(config.saves_folder())
        .context("Failed to open snapshot store")?;
    let sender = ParameterSender::connect(config.osc_target)
        .await
        .context("Failed to bind OSC sender socket")?;
    info!("OSC output -> {}", sender.target());

    let avatar = Arc::new(AvatarState::new());
    let service = Arc::new(SyncService::new(store, sender, avatar.clone()));

    // Discovery and the listener run beside the HTTP server, not before it
    tokio::spawn(startup(config.clone(), service.clone(), avatar.clone()));

    let state = AppState::new(service, avatar);
    let app = build_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("paramvault listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Startup path: discover the remote, seed the avatar, start the listener,
/// advertise ourselves. Runs (and then hosts the listener loop) for the
/// lifetime of the process.
async fn startup(config: Config, service: Arc<SyncService>, avatar: Arc<AvatarState>) {
    let daemon = match ServiceDaemon::new() {
        Ok(daemon) => daemon,
        Err(e) => {
            error!("cannot start mDNS daemon: {e}");
            return;
        }
    };

    info!("Waiting for {} to be discovered", config.remote_service);
    let handle = match find_service(
        &daemon,
        &config.remote_service,
        config.poll_interval,
        config.discovery_timeout,
    )
    .await
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("discovery failed: {e}");
            return;
        }
    };
    info!("{} discovered at {}", handle.name, handle.http_root());

    let client = OscQueryClient::new(handle.http_root());

    info!("Waiting for {} to be ready", handle.name);
    let change_node = match client
        .wait_for_value(
            AVATAR_CHANGE_ADDRESS,
            config.poll_interval,
            config.discovery_timeout,
        )
        .await
    {
        Ok(node) => node,
        Err(e) => {
            error!("remote never became ready: {e}");
            return;
        }
    };

    // Seed the identity before the listener starts so there is no
    // observable unset window once startup completes
    match change_node.first_value().and_then(|v| v.as_str()) {
        Some(identity) => {
            avatar.observe(identity).await;
        }
        None => error!("change node carried no identity value"),
    }

    let listener = match ChangeListener::bind(avatar.clone()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("cannot bind change listener: {e}");
            return;
        }
    };

    match advertise::start(&daemon, SELF_SERVICE_NAME, listener.local_port()).await {
        Ok(http_port) => info!("self-advertisement responder on port {http_port}"),
        Err(e) => error!("self-advertisement failed: {e}"),
    }

    service.attach_remote(client).await;

    // Keeps the mDNS daemon alive alongside the receive loop
    listener.run().await;
    drop(daemon);
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
