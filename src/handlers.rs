use crate::{
    AppState,
    auth::{AuthSession, AuthUser},
    models::{
        self, AdminStats, CreatePlanRequest, CreateProfileRequest, Plan, PlanStatus, Profile,
        ProfileCreationResponse, PromoteRequest, PromoteResponse, RegisterUserRequest, Role,
        UpdatePlanRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

// --- Filter Structs ---

/// PlanFilter
///
/// Accepted query parameters for the plan listing endpoint (GET /api/plans).
/// An unrecognized status value is rejected by the Query extractor with a 400.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PlanFilter {
    /// Optional filter for plans in a specific lifecycle state.
    pub status: Option<PlanStatus>,
}

/// SupabaseAuthResponse
///
/// Minimal struct to deserialize the response from the external auth
/// provider's /auth/v1/signup endpoint, capturing the new user's UUID.
#[derive(Deserialize)]
struct SupabaseAuthResponse {
    id: Uuid,
}

// --- Registration ---

/// register_user
///
/// [Public Route] Handles initial user registration via the external auth
/// provider.
///
/// *Flow*: calls the provider's signup endpoint, retrieves the canonical
/// `auth.users.id`, then creates the mirrored row in `public.profiles` under
/// the same primary key. The password travels to the provider only.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 200, description = "Registered", body = Profile),
        (status = 400, description = "Rejected by the auth provider")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<Profile>, StatusCode> {
    // Step 1: create the account with the external provider.
    let client = reqwest::Client::new();
    let auth_url = format!("{}/auth/v1/signup", state.config.supabase_url);

    let response = client
        .post(auth_url)
        .header("apikey", &state.config.supabase_key)
        .header("Content-Type", "application/json")
        .json(&serde_json::json!({ "email": payload.email, "password": payload.password }))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("signup call to auth provider failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !response.status().is_success() {
        // Provider rejected the signup (duplicate email, weak password, ...).
        return Err(StatusCode::BAD_REQUEST);
    }

    // Step 2: extract the canonical user id from the provider response.
    let supabase_user = response
        .json::<SupabaseAuthResponse>()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // Step 3: mirror the profile locally under the provider-issued key.
    let name = payload.name.unwrap_or_else(|| "User".to_string());
    let role = payload.role.unwrap_or_default();

    let profile = state
        .repo
        .create_profile(supabase_user.id, &payload.email, &name, role)
        .await
        .map_err(|e| {
            tracing::error!("profile mirror insert failed after signup: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(profile))
}

// --- Profile ---

/// get_profile
///
/// [Authenticated Route] Returns the caller's own profile row.
/// 404 means the session is valid but the mirror row has not been created
/// yet; the client is expected to POST /api/profile next.
#[utoipa::path(
    get,
    path = "/api/profile",
    responses(
        (status = 200, description = "Profile", body = Profile),
        (status = 404, description = "No profile row yet")
    )
)]
pub async fn get_profile(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
) -> Result<Json<Profile>, StatusCode> {
    match state.repo.get_profile(session.user_id).await {
        Ok(Some(profile)) => Ok(Json(profile)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("profile fetch failed: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// create_profile
///
/// [Authenticated Route] Idempotent creation of the caller's profile row,
/// with a fallback chain:
///   1. an existing row short-circuits with 200;
///   2. the primary insert carries the full shape (id, email, name);
///   3. on failure, a minimal upsert of the bare id relies on column
///      defaults (the "backup method");
///   4. if both inserts fail, the combined errors surface as a 500.
///
/// Uses `AuthSession` rather than `AuthUser` deliberately: this endpoint
/// runs before the profile row exists, so requiring one would deadlock the
/// flow.
#[utoipa::path(
    post,
    path = "/api/profile",
    request_body = CreateProfileRequest,
    responses(
        (status = 200, description = "Profile already exists", body = ProfileCreationResponse),
        (status = 201, description = "Profile created", body = ProfileCreationResponse),
        (status = 500, description = "All creation methods failed")
    )
)]
pub async fn create_profile(
    AuthSession(session): AuthSession,
    State(state): State<AppState>,
    Json(payload): Json<CreateProfileRequest>,
) -> impl IntoResponse {
    // Short-circuit when the row already exists.
    match state.repo.get_profile(session.user_id).await {
        Ok(Some(existing)) => {
            return (
                StatusCode::OK,
                Json(ProfileCreationResponse {
                    message: "Profile already exists".to_string(),
                    profile: existing,
                }),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("profile existence check failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Server error during profile creation" })),
            )
                .into_response();
        }
    }

    let email = session.email.clone().unwrap_or_default();
    let name = payload.name.unwrap_or_else(|| "User".to_string());

    // Primary insert with the full row shape.
    let primary_error = match state
        .repo
        .create_profile(session.user_id, &email, &name, Role::Basic)
        .await
    {
        Ok(profile) => {
            return (
                StatusCode::CREATED,
                Json(ProfileCreationResponse {
                    message: "Profile created successfully".to_string(),
                    profile,
                }),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("primary profile insert failed: {e}");
            e
        }
    };

    // Backup method: minimal upsert, column defaults fill the rest.
    match state.repo.upsert_profile_minimal(session.user_id).await {
        Ok(profile) => (
            StatusCode::CREATED,
            Json(ProfileCreationResponse {
                message: "Profile created with backup method".to_string(),
                profile,
            }),
        )
            .into_response(),
        Err(backup_error) => {
            tracing::error!("backup profile insert failed: {backup_error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": format!(
                        "All profile creation methods failed: {primary_error}, Backup: {backup_error}"
                    )
                })),
            )
                .into_response()
        }
    }
}

// --- Plans ---

/// get_plans
///
/// [Authenticated Route] Lists plans, newest first, optionally filtered by
/// status. Non-admin callers only see their own rows; an admin sees every
/// plan in the system. The database's row-level policies apply the same
/// split, so this is the inner of two layers.
#[utoipa::path(
    get,
    path = "/api/plans",
    params(PlanFilter),
    responses((status = 200, description = "Plans", body = [Plan]))
)]
pub async fn get_plans(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<PlanFilter>,
) -> Json<Vec<models::Plan>> {
    let plans = match auth.role {
        Role::Admin => state.repo.get_all_plans(filter.status).await,
        Role::Basic | Role::Moderator => state.repo.get_plans(auth.id, filter.status).await,
    };
    Json(plans)
}

/// create_plan
///
/// [Authenticated Route] Submits a new plan. The owner is taken from the
/// session, never from the payload. A blank name is rejected up front.
#[utoipa::path(
    post,
    path = "/api/plans",
    request_body = CreatePlanRequest,
    responses(
        (status = 201, description = "Created", body = Plan),
        (status = 400, description = "Missing name")
    )
)]
pub async fn create_plan(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<models::Plan>), StatusCode> {
    if payload.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.repo.create_plan(payload, id).await {
        Ok(plan) => Ok((StatusCode::CREATED, Json(plan))),
        Err(e) => {
            tracing::error!("create_plan failed: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// get_plan_details
///
/// [Authenticated Route] Retrieves a single plan by id. Non-admin callers
/// are restricted to their own rows; "not yours" and "missing" are both 404
/// so ids cannot be probed.
#[utoipa::path(
    get,
    path = "/api/plans/{id}",
    params(("id" = Uuid, Path, description = "Plan ID")),
    responses(
        (status = 200, description = "Found", body = Plan),
        (status = 404, description = "Not found or not visible")
    )
)]
pub async fn get_plan_details(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<models::Plan>, StatusCode> {
    let plan = match auth.role {
        Role::Admin => state.repo.get_plan(id).await,
        Role::Basic | Role::Moderator => state.repo.get_plan_authorized(id, auth.id).await,
    };
    match plan {
        Some(plan) => Ok(Json(plan)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// update_plan
///
/// [Authenticated Route] Partial update of name, description, and status.
/// The repository enforces ownership for non-admin callers; an admin may
/// update any plan.
#[utoipa::path(
    put,
    path = "/api/plans/{id}",
    request_body = UpdatePlanRequest,
    responses(
        (status = 200, description = "Updated", body = Plan),
        (status = 400, description = "Empty name"),
        (status = 404, description = "Not found or not owner")
    )
)]
pub async fn update_plan(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePlanRequest>,
) -> Result<Json<models::Plan>, StatusCode> {
    // A present-but-blank name would wipe the field; reject it.
    if payload.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let updated = match auth.role {
        Role::Admin => state.repo.update_plan_admin(id, payload).await,
        Role::Basic | Role::Moderator => state.repo.update_plan(id, auth.id, payload).await,
    };
    match updated {
        Some(plan) => Ok(Json(plan)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// delete_plan
///
/// [Authenticated Route] Deletes a plan. Owner-only for non-admin callers;
/// admins may delete any plan. A zero-row delete reports 404 whether the
/// plan was missing or simply not theirs.
#[utoipa::path(
    delete,
    path = "/api/plans/{id}",
    params(("id" = Uuid, Path, description = "Plan ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found or not owner")
    )
)]
pub async fn delete_plan(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    let deleted = match auth.role {
        Role::Admin => state.repo.delete_plan_admin(id).await,
        Role::Basic | Role::Moderator => state.repo.delete_plan(id, auth.id).await,
    };
    if deleted {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// --- Promotion & Admin ---

/// promote_user
///
/// [Authenticated Route] Sets a user's role: the only mutation path for
/// `profiles.role`.
///
/// *Authorization*: admins may promote anyone; a non-admin may only target
/// their own row (the self-promotion carve-out used for initial bootstrap).
#[utoipa::path(
    post,
    path = "/api/promote",
    request_body = PromoteRequest,
    responses(
        (status = 200, description = "Role updated", body = PromoteResponse),
        (status = 403, description = "Not an admin and not self"),
        (status = 404, description = "Target profile missing")
    )
)]
pub async fn promote_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PromoteRequest>,
) -> Result<Json<PromoteResponse>, StatusCode> {
    let target = payload.user_id.unwrap_or(auth.id);
    let is_self = target == auth.id;

    if auth.role != Role::Admin && !is_self {
        return Err(StatusCode::FORBIDDEN);
    }

    match state.repo.set_role(target, payload.role).await {
        Ok(true) => Ok(Json(PromoteResponse {
            success: true,
            message: format!("User promoted to {}", payload.role),
        })),
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("promote_user failed: {e}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// get_admin_stats
///
/// [Admin Route] Core application counters for the admin dashboard.
///
/// *RBAC*: strict enforcement of the admin role before touching the
/// repository.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminStats),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn get_admin_stats(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<AdminStats>, StatusCode> {
    if role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(state.repo.get_stats().await))
}
