use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Role & Status Enumerations ---

/// Role
///
/// The closed set of permission labels carried by `public.profiles.role`.
/// Roles are coarse-grained: `Basic` is the baseline for every new account,
/// `Moderator` and `Admin` are granted only through the promotion endpoint.
///
/// The database stores the role as lowercase text. Decoding is total: any
/// value outside the known set degrades to `Basic`, so a bad row can never
/// grant elevated access or fail a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    Basic,
    Moderator,
    Admin,
}

impl Role {
    /// The canonical text form, as stored in the `role` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Basic => "basic",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Total conversion from stored text. Unknown values map to `Basic`.
    pub fn from_db(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            _ => Role::Basic,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Used by the `#[sqlx(try_from = "String")]` field attribute on Profile.
impl TryFrom<String> for Role {
    type Error = std::convert::Infallible;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(Role::from_db(&value))
    }
}

/// ParsePlanStatusError
///
/// Returned when a plan status string is not one of the recognized values.
/// Surfaces as a 400 at the API edge and as a column-decode error in the
/// repository (a row with a bad status is a data bug, not a request bug).
#[derive(Debug, Error)]
#[error("unrecognized plan status: {0:?}")]
pub struct ParsePlanStatusError(pub String);

/// PlanStatus
///
/// Lifecycle of a business plan. New plans start as `Submitted`; the owner
/// (or an admin) moves them through the remaining states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum PlanStatus {
    #[default]
    Submitted,
    InProgress,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Submitted => "submitted",
            PlanStatus::InProgress => "in-progress",
            PlanStatus::Completed => "completed",
            PlanStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanStatus {
    type Err = ParsePlanStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(PlanStatus::Submitted),
            "in-progress" => Ok(PlanStatus::InProgress),
            "completed" => Ok(PlanStatus::Completed),
            "cancelled" => Ok(PlanStatus::Cancelled),
            other => Err(ParsePlanStatusError(other.to_string())),
        }
    }
}

impl TryFrom<String> for PlanStatus {
    type Error = ParsePlanStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// --- Core Application Schemas (Mapped to Database) ---

/// Profile
///
/// The user's canonical identity record in the `public.profiles` table,
/// mirroring a row in the external provider's `auth.users`. The `role`
/// column is the single source of truth for authorization decisions.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    // Primary key, also the foreign key to the external auth.users table.
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Plan
///
/// A business plan record from the `public.plans` table. This is the primary
/// data structure for the drafting workflow.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Plan {
    pub id: Uuid,
    // FK to public.profiles.id (owner).
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    // Whether the draft was produced by the AI assistant rather than typed in.
    pub ai_generated: bool,
    #[sqlx(try_from = "String")]
    pub status: PlanStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// CreatePlanRequest
///
/// Input payload for submitting a new plan (POST /api/plans).
/// Only `name` is required; the rest fall back to documented defaults
/// (`ai_generated = true`, `status = submitted`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub ai_generated: Option<bool>,
    pub status: Option<PlanStatus>,
}

/// UpdatePlanRequest
///
/// Partial update payload for modifying an existing plan (PUT /api/plans/{id}).
/// Uses `Option<T>` for all fields so that only the provided fields are
/// written; omitted fields keep their stored values.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePlanRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PlanStatus>,
}

/// RegisterUserRequest
///
/// Input payload for the public registration endpoint (POST /register).
/// The password is only passed through to the external auth provider and
/// never persisted or logged by this application.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Option<Role>,
}

/// CreateProfileRequest
///
/// Input payload for the idempotent profile-creation endpoint (POST /api/profile).
/// The identity (id, email) comes from the session; only the display name is
/// taken from the body.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateProfileRequest {
    pub name: Option<String>,
}

/// PromoteRequest
///
/// Input payload for the role-mutation endpoint (POST /api/promote).
/// When `user_id` is absent the caller promotes their own row.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PromoteRequest {
    pub user_id: Option<Uuid>,
    pub role: Role,
}

// --- Output Schemas ---

/// ProfileCreationResponse
///
/// Output of POST /api/profile. The `message` distinguishes the three
/// success shapes of the fallback chain: already existed, created via the
/// primary insert, or created via the minimal backup upsert.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileCreationResponse {
    pub message: String,
    pub profile: Profile,
}

/// PromoteResponse
///
/// Output of POST /api/promote.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PromoteResponse {
    pub success: bool,
    pub message: String,
}

/// AdminStats
///
/// Output schema for the administrative statistics endpoint (GET /api/admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct AdminStats {
    pub total_plans: i64,
    pub total_profiles: i64,
    /// Plans still in the `submitted` state, awaiting drafting work.
    pub submitted_plans: i64,
    pub completed_plans: i64,
}
