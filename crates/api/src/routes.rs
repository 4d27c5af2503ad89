use crate::handlers;
use crate::middleware;
use crate::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    let authenticated = Router::new()
        .route("/api/mfa/status", get(handlers::mfa::status))
        .route("/api/mfa/totp/enroll", post(handlers::mfa::enroll_totp))
        .route("/api/mfa/totp/confirm", post(handlers::mfa::confirm_totp))
        .route("/api/mfa/totp/reset", post(handlers::mfa::reset_totp))
        .route("/api/mfa/totp", delete(handlers::mfa::disable_totp))
        .route(
            "/api/mfa/backup-codes/regenerate",
            post(handlers::mfa::regenerate_backup_codes),
        )
        .route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Auth routes
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/mfa/verify", post(handlers::auth::verify_mfa))
        .merge(authenticated)
        .with_state(state)
}
