use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any
/// client. The route gate exempts `/health` explicitly; `/register` sits on
/// a path the policy table leaves open by default.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated endpoint used for monitoring and load balancer checks.
        // Returns "ok" immediately to verify the service is responsive.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // New user creation: proxies signup to the external auth provider and
        // mirrors the resulting identity into public.profiles.
        .route("/register", post(handlers::register_user))
}
