use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Routes exclusively for users with the admin role, nested under
/// /api/admin. The session guard layer above establishes identity; the
/// handlers themselves verify `role == Admin` before touching the
/// repository, so a basic user reaching this router gets a 403, never data.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/stats
        // Dashboard counters: totals plus plans by lifecycle state.
        .route("/stats", get(handlers::get_admin_stats))
}
