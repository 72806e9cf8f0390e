/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated
/// modules. Access control is applied explicitly at the module level (via
/// Axum layers and the route gate), preventing accidental exposure of
/// protected endpoints.

/// Routes accessible to all clients: liveness and registration.
pub mod public;

/// The /api surface, protected by the session guard layer. Handlers perform
/// their own role checks where needed.
pub mod authenticated;

/// The /api/admin surface, restricted to the admin role inside the handlers.
pub mod admin;

/// Server-rendered page stubs. These are the downstream targets of the route
/// access middleware; presentation is intentionally minimal.
pub mod pages;
