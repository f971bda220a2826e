pub mod auth;
pub mod error;
pub mod metrics;
mod products;
mod pvz;
mod receptions;
pub mod validation;

use axum::{
    error_handling::HandleErrorLayer,
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    BoxError, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::AppState;
use error::ApiError;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/dummyLogin", post(auth::dummy_login))
        .route("/login", post(auth::login))
        .route("/register", post(auth::register));

    // Protected routes; role checks happen in the handlers
    let api_routes = Router::new()
        .route("/pvz", post(pvz::create_pvz).get(pvz::list_pvz))
        .route("/receptions", post(receptions::create_reception))
        .route(
            "/pvz/:pvz_id/close_last_reception",
            post(receptions::close_last_reception),
        )
        .route("/products", post(products::add_product))
        .route(
            "/pvz/:pvz_id/delete_last_product",
            post(products::delete_last_product),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .merge(auth_routes)
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(state.config.server.request_timeout()),
        )
        .layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Turn a timeout (or any other middleware failure) into the JSON error body
async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request timed out");
        ApiError::timeout()
    } else {
        tracing::error!("Unhandled middleware error: {}", err);
        ApiError::internal()
    }
}

/// Liveness plus a round trip to the database
async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
