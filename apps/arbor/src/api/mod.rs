//! # Arbor HTTP API Module
//!
//! REST API over the menu and column trees, built on axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Store and cache counters
//! - `GET /partitions` - Partition tabs
//! - `GET /partitions/{p}/nodes` - Flat listing
//! - `GET /partitions/{p}/tree?all=` - Assembled forest
//! - `GET /partitions/{p}/options?exclude=` - Parent picker rows
//! - `POST /partitions/{p}/order` - Save sibling order
//! - `POST /nodes` - Create a node
//! - `GET|PUT|DELETE /nodes/{id}` - Read, overwrite or delete a node
//! - `POST /nodes/{id}/move` - Change the parent of a node
//! - `GET /nodes/{id}/descendants?depth=` - Descendant ids
//! - `POST /nodes/status` - Bulk enable/disable
//!
//! ## Security
//!
//! The `[server]` config section (or the matching `ARBOR_*` variables)
//! controls the API key, the rate limit and the allowed CORS origins.

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{ROLE_HEADER, RoleRegistry};
pub use middleware::limiter_for;
pub use types::{
    AckResponse, ActiveRequest, ApiError, DescendantsResponse, ErrorResponse, HealthResponse,
    MoveRequest, NodeJson, NodeListResponse, NodeRequest, NodeResponse, OptionsResponse,
    OrderRequest, PartitionsResponse, StatusResponse, TreeNodeJson, TreeResponse, UpdateResponse,
    status_for,
};

use crate::config::ServerConfig;
use crate::error::AppError;
use arbor_core::{ArborError, Role, TreeService};
use axum::{
    Router,
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TreeService>,
    pub roles: Arc<RoleRegistry>,
    pub server: Arc<ServerConfig>,
}

impl AppState {
    /// State with default server settings.
    #[must_use]
    pub fn new(service: TreeService, roles: Vec<Role>) -> Self {
        Self {
            service: Arc::new(service),
            roles: Arc::new(RoleRegistry::new(roles)),
            server: Arc::new(ServerConfig::default()),
        }
    }

    /// Replace the server settings.
    #[must_use]
    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = Arc::new(server);
        self
    }

    /// The role the request acts as.
    pub fn role(&self, headers: &HeaderMap) -> Result<Role, ApiError> {
        self.roles.resolve(headers)
    }

    /// Run a blocking engine call off the async workers.
    ///
    /// Mutations may wait on a partition lock, so engine calls never run on
    /// the reactor thread.
    pub async fn run<T, F>(&self, job: F) -> Result<T, ApiError>
    where
        F: FnOnce(&TreeService) -> Result<T, ArborError> + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || job(&service))
            .await
            .map_err(|e| ApiError::internal(format!("engine task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

fn cors_headers() -> [HeaderName; 3] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(ROLE_HEADER),
    ]
}

fn cors_methods() -> [Method; 5] {
    [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ]
}

/// Build the CORS layer from `server.cors_origins`.
///
/// - `"*"`: allows all origins (development only)
/// - unset: localhost only
/// - otherwise: a comma-separated list of allowed origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (ARBOR_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(cors_methods())
                    .allow_headers(cors_headers())
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(cors_methods())
        .allow_headers(cors_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting (if enabled)
/// 4. Authentication (if an API key is configured)
pub fn create_router(state: AppState) -> Router {
    let server = Arc::clone(&state.server);
    let cors = build_cors_layer(server.cors_origins.as_deref());

    let rate_limiter = middleware::limiter_for(&server);
    if rate_limiter.is_some() {
        tracing::info!("Rate limiting enabled: {} requests/second", server.rate_limit);
    } else {
        tracing::info!("Rate limiting disabled");
    }

    let api_key = server.api_key().map(Arc::<str>::from);
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set ARBOR_API_KEY to enable authentication."
        );
    }

    if state.roles.is_empty() {
        tracing::warn!("No roles configured: requests act as the superuser");
    } else {
        tracing::info!("{} roles configured", state.roles.len());
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/partitions", get(handlers::partitions_handler))
        .route("/partitions/{partition}/nodes", get(handlers::list_handler))
        .route("/partitions/{partition}/tree", get(handlers::tree_handler))
        .route(
            "/partitions/{partition}/options",
            get(handlers::options_handler),
        )
        .route("/partitions/{partition}/order", post(handlers::order_handler))
        .route("/nodes", post(handlers::create_handler))
        .route("/nodes/status", post(handlers::set_active_handler))
        .route(
            "/nodes/{id}",
            get(handlers::get_handler)
                .put(handlers::update_handler)
                .delete(handlers::delete_handler),
        )
        .route("/nodes/{id}/move", post(handlers::move_handler))
        .route(
            "/nodes/{id}/descendants",
            get(handlers::descendants_handler),
        );

    // Authentication runs inside the rate limiter.
    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(state: AppState) -> Result<(), AppError> {
    let addr = state.server.addr();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Arbor HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
