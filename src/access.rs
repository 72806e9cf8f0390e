use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use uuid::Uuid;

use crate::{AppState, auth::Session, models::Role, repository::RepositoryState};

/// Path of the login view; rule 1 of the decision engine keys on it.
pub const LOGIN_PATH: &str = "/login";
/// Landing path for authenticated users; target of the home and
/// unauthorized redirects.
pub const HOME_PATH: &str = "/dashboard";

/// AccessRequirement
///
/// What a route demands of its caller: authentication, and optionally a role
/// out of an allowed set. Pure static configuration; entries never change at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRequirement {
    pub require_auth: bool,
    /// When present, the resolved role set must intersect this slice.
    /// Role checks only ever apply to authenticated requests.
    pub allowed_roles: Option<&'static [Role]>,
}

impl AccessRequirement {
    /// Open to anonymous traffic.
    pub const PUBLIC: AccessRequirement = AccessRequirement {
        require_auth: false,
        allowed_roles: None,
    };

    /// Requires a valid session, any role.
    pub const AUTHENTICATED: AccessRequirement = AccessRequirement {
        require_auth: true,
        allowed_roles: None,
    };

    /// Requires a valid session holding one of the given roles.
    pub const fn roles(allowed: &'static [Role]) -> AccessRequirement {
        AccessRequirement {
            require_auth: true,
            allowed_roles: Some(allowed),
        }
    }
}

/// PolicyTable
///
/// Static mapping from a normalized request path to its access requirement.
/// Exact entries take precedence; prefix entries (trailing-slash patterns)
/// are consulted only when no exact match exists; everything else falls back
/// to the default entry.
///
/// The default is deliberately `PUBLIC`: unlisted routes fail open, with
/// view-level checks as the second layer. See DESIGN.md for the open
/// question on this choice.
pub struct PolicyTable {
    exact: &'static [(&'static str, AccessRequirement)],
    prefix: &'static [(&'static str, AccessRequirement)],
    pub default: AccessRequirement,
}

impl PolicyTable {
    /// Pure lookup: exact match, then first matching prefix, then default.
    pub fn lookup(&self, path: &str) -> AccessRequirement {
        if let Some((_, requirement)) = self.exact.iter().find(|(p, _)| *p == path) {
            return *requirement;
        }
        if let Some((_, requirement)) = self.prefix.iter().find(|(p, _)| path.starts_with(p)) {
            return *requirement;
        }
        self.default
    }
}

/// The application's route policy, fixed at compile time. Role-restricted
/// entries cover the admin area; every other gated page only requires a
/// session.
pub static ROUTE_POLICY: PolicyTable = PolicyTable {
    exact: &[
        ("/", AccessRequirement::AUTHENTICATED),
        (LOGIN_PATH, AccessRequirement::PUBLIC),
        (HOME_PATH, AccessRequirement::AUTHENTICATED),
        ("/plans", AccessRequirement::AUTHENTICATED),
        ("/settings", AccessRequirement::AUTHENTICATED),
        ("/promote", AccessRequirement::AUTHENTICATED),
        ("/admin", AccessRequirement::roles(&[Role::Admin])),
    ],
    prefix: &[
        ("/plans/", AccessRequirement::AUTHENTICATED),
        ("/admin/", AccessRequirement::roles(&[Role::Admin])),
    ],
    default: AccessRequirement::PUBLIC,
};

/// Paths the gate never evaluates: liveness, static assets, API docs, and
/// the API itself. API routes run their own authentication check via the
/// extractors instead of relying on redirects.
pub fn is_exempt(path: &str) -> bool {
    path == "/health"
        || path == "/favicon.ico"
        || path == "/api"
        || path.starts_with("/api/")
        || path.starts_with("/api-docs")
        || path.starts_with("/swagger-ui")
        || path.starts_with("/assets/")
        || path.starts_with("/static/")
}

/// AccessDecision
///
/// The transient outcome of evaluating one request against the policy table.
/// Never persisted; recomputing with the same inputs yields the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    RedirectTo(String),
}

impl AccessDecision {
    pub fn redirect_login() -> AccessDecision {
        AccessDecision::RedirectTo(LOGIN_PATH.to_string())
    }

    pub fn redirect_home() -> AccessDecision {
        AccessDecision::RedirectTo(HOME_PATH.to_string())
    }

    /// Carries the reason flag so the destination view can render an
    /// "access denied" message; the redirect itself is silent.
    pub fn redirect_unauthorized() -> AccessDecision {
        AccessDecision::RedirectTo(format!("{HOME_PATH}?unauthorized=true"))
    }
}

/// decide
///
/// The access decision engine. Rule order is load-bearing:
///   1. an authenticated user asking for the login view goes home, before
///      any policy is consulted;
///   2. a protected route with no session redirects to login;
///   3. a role-restricted route with no intersecting role redirects to the
///      unauthorized view (only ever reached for authenticated requests);
///   4. everything else is allowed.
pub fn decide(
    path: &str,
    requirement: AccessRequirement,
    session: Option<&Session>,
    roles: &[Role],
) -> AccessDecision {
    if path == LOGIN_PATH && session.is_some() {
        return AccessDecision::redirect_home();
    }

    if requirement.require_auth && session.is_none() {
        return AccessDecision::redirect_login();
    }

    if let Some(allowed) = requirement.allowed_roles {
        if session.is_some() && !roles.iter().any(|role| allowed.contains(role)) {
            return AccessDecision::redirect_unauthorized();
        }
    }

    AccessDecision::Allow
}

/// resolve_roles
///
/// The role resolver: one lookup against the profile store. A missing row, a
/// NULL role, or a failing lookup all degrade to `{basic}`: a lookup
/// failure must neither grant elevated access nor block the request. Errors
/// are recorded and swallowed here, never propagated.
pub async fn resolve_roles(repo: &RepositoryState, user_id: Uuid) -> Vec<Role> {
    match repo.get_profile_role(user_id).await {
        Ok(Some(role)) => vec![role],
        Ok(None) => vec![Role::Basic],
        Err(e) => {
            tracing::warn!("role lookup failed for {user_id}, defaulting to basic: {e}");
            vec![Role::Basic]
        }
    }
}

/// route_gate
///
/// The request-gating middleware. For every non-exempt request it resolves
/// the session, resolves the role set, evaluates the policy table, and
/// either passes the request through or answers with a redirect.
///
/// Fault policy: a session-resolver fault allows the request through
/// (fail open on infrastructure error, fail closed on policy mismatch) and
/// defers enforcement to view-level checks. A role-resolver fault degrades
/// to the basic role inside `resolve_roles`. Neither fault aborts the
/// pipeline.
pub async fn route_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    if is_exempt(&path) {
        return next.run(request).await;
    }

    let requirement = ROUTE_POLICY.lookup(&path);

    let session = match state.identity.resolve_session(request.headers()).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!("session resolution failed, allowing request through: {e}");
            return next.run(request).await;
        }
    };

    // Sequential by necessity: the role lookup needs the session's subject.
    let roles = match &session {
        Some(s) => resolve_roles(&state.repo, s.user_id).await,
        None => Vec::new(),
    };

    match decide(&path, requirement, session.as_ref(), &roles) {
        AccessDecision::Allow => next.run(request).await,
        AccessDecision::RedirectTo(target) => {
            tracing::debug!(path = %path, target = %target, "route access redirect");
            Redirect::to(&target).into_response()
        }
    }
}
