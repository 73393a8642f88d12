//! Management API Routes

use super::{
    auth::{auth_middleware, ApiAuth},
    handlers::*,
    types::ApiAuthConfig,
};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Management API router
pub struct ManagementApi;

impl ManagementApi {
    /// Create the management API router
    pub fn create_router(state: AppState, auth_config: ApiAuthConfig) -> Router {
        let auth = Arc::new(ApiAuth::new(auth_config));

        // Public routes (no authentication required)
        let public_routes = Router::new().route("/health", get(health_check));

        let protected_routes = Router::new()
            .route("/status", get(get_status))
            // Connection list and close requests
            .route("/connections", get(get_connections))
            .route("/connections/:uuid", get(get_connection).delete(close_connection))
            .route("/connections/:uuid/export", get(export_connection))
            // View and tracking controls
            .route("/preferences", get(get_preferences).put(update_preferences))
            .route("/tracking", put(update_tracking))
            .route("/metrics", get(export_metrics))
            // Out-of-process network core
            .route("/core/snapshot", put(core_push_snapshot))
            .route("/core/close-requests", post(core_drain_close_requests))
            .route("/core/tracking", get(core_tracking))
            .layer(middleware::from_fn_with_state(auth, auth_middleware))
            .with_state(state);

        Router::new()
            .nest("/api/v1", public_routes.merge(protected_routes))
            .layer(CorsLayer::permissive())
    }
}
