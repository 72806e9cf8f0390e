use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// The /api surface. Every route here sits behind the session guard layer
/// applied in `create_router`, so handlers always run with a confirmed
/// identity; handlers that additionally need a profile row or a role use the
/// `AuthUser` extractor on top.
///
/// Note the split between the two extractors: the profile endpoints
/// authenticate with `AuthSession` only, because they exist precisely to
/// create the profile row that `AuthUser` requires.
pub fn api_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/profile
        // The caller's own profile row; 404 until POST /api/profile has run.
        // POST /api/profile
        // Idempotent profile creation with the primary/backup fallback chain.
        .route(
            "/profile",
            get(handlers::get_profile).post(handlers::create_profile),
        )
        // --- Plan Drafting ---
        // GET /api/plans?status=...
        // Lists the caller's plans (all plans for admins), newest first.
        // POST /api/plans
        // Submits a new plan; the owner is always the session user.
        .route(
            "/plans",
            get(handlers::get_plans).post(handlers::create_plan),
        )
        // GET/PUT/DELETE /api/plans/{id}
        // Fetch, partially update, or remove a single plan. Ownership is
        // enforced in the repository queries; admins bypass it.
        .route(
            "/plans/{id}",
            get(handlers::get_plan_details)
                .put(handlers::update_plan)
                .delete(handlers::delete_plan),
        )
        // POST /api/promote
        // Role mutation: admin-only, with the self-promotion carve-out.
        .route("/promote", post(handlers::promote_user))
}
