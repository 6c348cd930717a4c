// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `roost serve` command implementation.
//!
//! Wires the process root: SQLite store, command registry, isolation layer
//! with its sweepers, feature services, fleet manager, identity registry,
//! tenancy router, and the admin gateway. Every shared structure is
//! constructed here and injected -- no ambient globals. Graceful shutdown
//! runs off a signal-driven cancellation token.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use roost_commands::default_registry;
use roost_config::RoostConfig;
use roost_core::FleetError;
use roost_core::traits::{FleetStore, Transport};
use roost_features::FeatureSet;
use roost_gateway::{AuthConfig, GatewayState, ServerConfig, start_server};
use roost_isolation::IsolationLayer;
use roost_registry::{IdentityRegistry, TenancyRouter};
use roost_session::{FleetManager, SessionDeps, SessionSettings};
use roost_storage::SqliteStore;

use crate::transport::UnconfiguredTransport;

/// Runs the `roost serve` command until SIGINT/SIGTERM.
pub async fn run_serve(config: RoostConfig) -> Result<(), FleetError> {
    init_tracing(&config.server.log_level);
    info!(server = %config.server.name, "starting roost serve");

    let store: Arc<dyn FleetStore> = Arc::new(SqliteStore::new(
        config.storage.clone(),
        &config.server.name,
    ));
    store.initialize().await?;

    let shutdown = install_signal_handler();

    let isolation = IsolationLayer::new();
    let sweepers = isolation.spawn_sweepers(&shutdown);

    let transport: Arc<dyn Transport> = Arc::new(UnconfiguredTransport);
    let deps = SessionDeps {
        store: Arc::clone(&store),
        transport,
        commands: default_registry(),
        isolation,
        features: Arc::new(FeatureSet::new(Arc::clone(&store), &config.features)),
        ai_reply: None,
    };
    let fleet = Arc::new(FleetManager::new(
        deps,
        SessionSettings::from(&config.session),
    ));

    let resumed = fleet.resume_approved().await?;
    info!(resumed, "fleet resumed");

    let state = GatewayState {
        server_name: config.server.name.clone(),
        fleet: Arc::clone(&fleet),
        store: Arc::clone(&store),
        identity: Arc::new(IdentityRegistry::new(
            Arc::clone(&store),
            &config.server.name,
        )),
        router: Arc::new(TenancyRouter::new(
            &config.server.name,
            config.server.peers.clone(),
            config.server.bearer_token.clone(),
        )?),
        auth: AuthConfig {
            bearer_token: config.server.bearer_token.clone(),
        },
        start_time: std::time::Instant::now(),
    };
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };

    tokio::select! {
        result = start_server(&server_config, state) => result?,
        _ = shutdown.cancelled() => {
            info!("shutdown signal received");
        }
    }

    fleet.shutdown().await;
    for sweeper in sweepers {
        let _ = sweeper.await;
    }
    store.close().await?;
    info!("roost serve exited");
    Ok(())
}

/// Installs handlers for SIGTERM and SIGINT (Ctrl+C).
///
/// Returns a [`CancellationToken`] cancelled when either signal arrives.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (Ctrl+C), initiating shutdown");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("roost={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
