//! Signaling Service
//!
//! WebSocket signaling coordinator for browser WebRTC meshes.
//!
//! # Servers
//!
//! - WebSocket server for client signaling (default: 0.0.0.0:8080)
//! - HTTP server for health and metrics (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Spawn the coordinator actor
//! 5. Start health HTTP server (liveness, readiness, metrics)
//! 6. Bind the WebSocket listener and mark ready
//! 7. Wait for shutdown signal

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use signaling_service::config::Config;
use signaling_service::coordinator::CoordinatorHandle;
use signaling_service::errors::SignalingError;
use signaling_service::observability::{
    health_router, init_metrics_recorder, metrics_router, HealthState,
};
use signaling_service::transport::{signaling_router, TransportState};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time the coordinator gets to disconnect stragglers after the grace period.
const COORDINATOR_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signaling_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Signaling Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        SignalingError::from(e)
    })?;

    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        health_bind_address = %config.health_bind_address,
        channel_scope = ?config.channel_scope,
        trust_forwarded_for = config.trust_forwarded_for,
        max_message_bytes = config.max_message_bytes,
        outbox_capacity = config.outbox_capacity,
        allowed_origins = ?config.allowed_origins,
        "Configuration loaded successfully"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    let health_state = Arc::new(HealthState::new());

    let scope = config
        .channel_scope
        .build(config.trust_forwarded_for);
    let coordinator = CoordinatorHandle::new(config.instance_id.clone(), scope);
    info!("Coordinator started");

    // Cancelled on shutdown signal, or along with the coordinator
    let shutdown_token = coordinator.child_token();

    // Health server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        SignalingError::Config(format!("Invalid health bind address: {e}"))
    })?;

    let app = health_router(Arc::clone(&health_state)).merge(metrics_router(prometheus_handle));

    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            SignalingError::Transport(format!(
                "Failed to bind health server to {health_addr}: {e}"
            ))
        })?;
    info!(addr = %health_addr, "Health server bound successfully");

    // Health keeps answering until the very end of shutdown
    let health_shutdown_token = coordinator.child_token();
    tokio::spawn(async move {
        let server = axum::serve(health_listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // WebSocket server
    let ws_addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.bind_address, "Invalid WebSocket bind address");
        SignalingError::Config(format!("Invalid WebSocket bind address: {e}"))
    })?;

    let router = signaling_router(TransportState {
        coordinator: coordinator.clone(),
        outbox_capacity: config.outbox_capacity,
        max_message_bytes: config.max_message_bytes,
        allowed_origins: config.allowed_origins.clone().map(Arc::from),
        shutdown: shutdown_token.clone(),
    });

    let ws_listener = tokio::net::TcpListener::bind(ws_addr).await.map_err(|e| {
        error!(error = %e, addr = %ws_addr, "Failed to bind WebSocket server");
        SignalingError::Transport(format!(
            "Failed to bind WebSocket server to {ws_addr}: {e}"
        ))
    })?;

    let ws_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        info!(addr = %ws_addr, "WebSocket server starting");
        let server = axum::serve(
            ws_listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            ws_shutdown_token.cancelled().await;
            info!("WebSocket server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "WebSocket server failed");
        }
    });

    health_state.set_ready();
    info!("Signaling Service running - press Ctrl+C to shutdown");

    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so load balancers stop sending traffic
    health_state.set_not_ready();

    // Every connection stops reading and submits its Disconnect
    shutdown_token.cancel();

    tokio::time::sleep(Duration::from_secs(config.shutdown_grace_seconds)).await;

    if let Err(e) = coordinator.shutdown(COORDINATOR_SHUTDOWN_DEADLINE).await {
        warn!(error = %e, "Coordinator shutdown error");
    }
    coordinator.cancel();

    info!("Signaling Service shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
