// SPDX-FileCopyrightText: 2026 Roost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, auth middleware, and shared state.

use std::sync::Arc;

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;

use roost_core::FleetError;
use roost_core::traits::FleetStore;
use roost_registry::{IdentityRegistry, TenancyRouter};
use roost_session::FleetManager;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub server_name: String,
    pub fleet: Arc<FleetManager>,
    pub store: Arc<dyn FleetStore>,
    pub identity: Arc<IdentityRegistry>,
    pub router: Arc<TenancyRouter>,
    pub auth: AuthConfig,
    pub start_time: std::time::Instant,
}

/// Gateway server bind configuration (mirrors `[server]` from roost-config
/// to avoid a config crate dependency here).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the gateway router.
///
/// `/health` is public; everything under `/v1` requires bearer auth,
/// including the relay endpoint called by peer servers.
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/bots", get(handlers::list_bots).post(handlers::create_bot))
        .route(
            "/v1/bots/{id}",
            get(handlers::get_bot).delete(handlers::delete_bot),
        )
        .route("/v1/bots/{id}/register", post(handlers::register_identity))
        .route("/v1/bots/{id}/start", post(handlers::start_bot))
        .route("/v1/bots/{id}/stop", post(handlers::stop_bot))
        .route("/v1/bots/{id}/restart", post(handlers::restart_bot))
        .route("/v1/bots/{id}/approve", post(handlers::approve_bot))
        .route("/v1/bots/{id}/reject", post(handlers::reject_bot))
        .route(
            "/v1/bots/{id}/features/{feature}",
            post(handlers::toggle_feature),
        )
        .route("/v1/registry", get(handlers::list_registry))
        .route(
            "/v1/registry/{identity}",
            put(handlers::edit_registry).delete(handlers::delete_registry),
        )
        .route("/v1/actions", post(handlers::submit_action))
        .route("/v1/relay", post(handlers::execute_relay))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve the gateway until the process exits.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), FleetError> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FleetError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| FleetError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}
