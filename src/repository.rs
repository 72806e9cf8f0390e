use crate::models::{AdminStats, CreatePlanRequest, Plan, PlanStatus, Profile, Role, UpdatePlanRequest};
use async_trait::async_trait;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// RepositoryError
///
/// Typed failure for persistence operations whose callers need to tell an
/// infrastructure fault apart from a clean "no row" result (the profile and
/// role lookups that feed the access middleware). Plan reads keep the simpler
/// log-and-degrade convention and never surface this type.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing the
/// handlers and the access middleware to interact with the data layer without
/// knowing the concrete implementation (Postgres, mock).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's async task
/// boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    // Full profile row, or None when the mirror row has not been created yet.
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, RepositoryError>;
    // Role column only; one round trip per request from the middleware.
    // Ok(None) means "no profile row"; a NULL role decodes to Basic.
    async fn get_profile_role(&self, id: Uuid) -> Result<Option<Role>, RepositoryError>;
    // Primary insert with the full row shape.
    async fn create_profile(
        &self,
        id: Uuid,
        email: &str,
        name: &str,
        role: Role,
    ) -> Result<Profile, RepositoryError>;
    // Backup path of the profile-creation fallback chain: insert the bare id
    // and let column defaults fill the rest.
    async fn upsert_profile_minimal(&self, id: Uuid) -> Result<Profile, RepositoryError>;
    // Role mutation; returns false when no row matched.
    async fn set_role(&self, id: Uuid, role: Role) -> Result<bool, RepositoryError>;

    // --- Plan Retrieval ---
    // Listing scoped to one owner, newest first, with an optional status filter.
    async fn get_plans(&self, owner: Uuid, status: Option<PlanStatus>) -> Vec<Plan>;
    // Admin access: every plan in the system regardless of owner.
    async fn get_all_plans(&self, status: Option<PlanStatus>) -> Vec<Plan>;
    // Retrieval by id with no ownership restriction (admin view).
    async fn get_plan(&self, id: Uuid) -> Option<Plan>;
    // Retrieval restricted to the owner.
    async fn get_plan_authorized(&self, id: Uuid, user_id: Uuid) -> Option<Plan>;

    // --- Plan Actions ---
    async fn create_plan(
        &self,
        req: CreatePlanRequest,
        user_id: Uuid,
    ) -> Result<Plan, RepositoryError>;
    // Owner-only: updates only if user_id matches. Uses COALESCE for partial updates.
    async fn update_plan(&self, id: Uuid, user_id: Uuid, req: UpdatePlanRequest) -> Option<Plan>;
    /// Admin override: update any plan by id (no ownership check).
    async fn update_plan_admin(&self, id: Uuid, req: UpdatePlanRequest) -> Option<Plan>;
    // Owner-only: deletes only if user_id matches.
    async fn delete_plan(&self, id: Uuid, user_id: Uuid) -> bool;
    /// Admin override: delete any plan by id (no ownership check).
    async fn delete_plan_admin(&self, id: Uuid) -> bool;

    // --- Admin ---
    async fn get_stats(&self) -> AdminStats;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PLAN_COLUMNS: &str =
    "id, user_id, name, description, ai_generated, status, created_at, updated_at";

const PROFILE_COLUMNS: &str = "id, email, name, role, created_at, updated_at";

#[async_trait]
impl Repository for PostgresRepository {
    // --- PROFILES ---

    /// get_profile
    ///
    /// Full profile lookup used by the API layer. Errors propagate so the
    /// caller can distinguish "no profile yet" from a failing database.
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, RepositoryError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    /// get_profile_role
    ///
    /// Narrow lookup of the `role` column for the access middleware.
    /// A NULL role in an existing row decodes to Basic; a missing row is
    /// reported as Ok(None) and left to the caller's policy.
    async fn get_profile_role(&self, id: Uuid) -> Result<Option<Role>, RepositoryError> {
        let row: Option<Option<String>> =
            sqlx::query_scalar("SELECT role FROM profiles WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|role| role.as_deref().map_or(Role::Basic, Role::from_db)))
    }

    /// create_profile
    ///
    /// Primary insert of the mirror row in `public.profiles` after external
    /// auth success. Fails (and is retried by the handler's fallback chain)
    /// when the row shape conflicts with constraints or RLS.
    async fn create_profile(
        &self,
        id: Uuid,
        email: &str,
        name: &str,
        role: Role,
    ) -> Result<Profile, RepositoryError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "INSERT INTO profiles (id, email, name, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, NOW(), NOW()) RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(email)
        .bind(name)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(profile)
    }

    /// upsert_profile_minimal
    ///
    /// Backup path of the fallback chain: inserts only the id and relies on
    /// column defaults for everything else. `ON CONFLICT` makes the retry
    /// idempotent if the primary insert partially succeeded.
    async fn upsert_profile_minimal(&self, id: Uuid) -> Result<Profile, RepositoryError> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "INSERT INTO profiles (id) VALUES ($1) \
             ON CONFLICT (id) DO UPDATE SET updated_at = NOW() \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(profile)
    }

    /// set_role
    ///
    /// The only mutation path for `profiles.role`. Returns false when the
    /// target row does not exist.
    async fn set_role(&self, id: Uuid, role: Role) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE profiles SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- PLAN RETRIEVAL ---

    /// get_plans
    ///
    /// Owner-scoped listing with an optional status filter, built with
    /// QueryBuilder for safe parameterization.
    async fn get_plans(&self, owner: Uuid, status: Option<PlanStatus>) -> Vec<Plan> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE user_id = "
        ));
        builder.push_bind(owner);

        if let Some(s) = status {
            builder.push(" AND status = ");
            builder.push_bind(s.as_str());
        }

        builder.push(" ORDER BY created_at DESC");

        match builder.build_query_as::<Plan>().fetch_all(&self.pool).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("get_plans error: {:?}", e);
                vec![]
            }
        }
    }

    /// get_all_plans
    ///
    /// Administrative listing across all owners. **Note**: no `user_id`
    /// restriction; callers must have verified the admin role.
    async fn get_all_plans(&self, status: Option<PlanStatus>) -> Vec<Plan> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {PLAN_COLUMNS} FROM plans"));

        if let Some(s) = status {
            builder.push(" WHERE status = ");
            builder.push_bind(s.as_str());
        }

        builder.push(" ORDER BY created_at DESC");

        match builder.build_query_as::<Plan>().fetch_all(&self.pool).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("get_all_plans error: {:?}", e);
                vec![]
            }
        }
    }

    /// get_plan
    ///
    /// Retrieval of any plan by id (no ownership check). For callers that
    /// have already established admin access.
    async fn get_plan(&self, id: Uuid) -> Option<Plan> {
        sqlx::query_as::<_, Plan>(&format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_plan error: {:?}", e);
                None
            })
    }

    /// get_plan_authorized
    ///
    /// Retrieves a plan only when the querying user owns it. The ownership
    /// filter lives in the query so a non-owner cannot distinguish "missing"
    /// from "not yours".
    async fn get_plan_authorized(&self, id: Uuid, user_id: Uuid) -> Option<Plan> {
        sqlx::query_as::<_, Plan>(&format!(
            "SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_plan_authorized error: {:?}", e);
            None
        })
    }

    // --- PLAN ACTIONS ---

    /// create_plan
    ///
    /// Inserts a new plan with the documented defaults: empty description,
    /// `ai_generated = true`, `status = submitted`.
    async fn create_plan(
        &self,
        req: CreatePlanRequest,
        user_id: Uuid,
    ) -> Result<Plan, RepositoryError> {
        let new_id = Uuid::new_v4();
        let plan = sqlx::query_as::<_, Plan>(&format!(
            "INSERT INTO plans (id, user_id, name, description, ai_generated, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) RETURNING {PLAN_COLUMNS}"
        ))
        .bind(new_id)
        .bind(user_id)
        .bind(&req.name)
        .bind(req.description.unwrap_or_default())
        .bind(req.ai_generated.unwrap_or(true))
        .bind(req.status.unwrap_or_default().as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(plan)
    }

    /// update_plan
    ///
    /// Updates a plan only if `user_id` matches the owner. Uses COALESCE so
    /// only the provided fields are written.
    async fn update_plan(&self, id: Uuid, user_id: Uuid, req: UpdatePlanRequest) -> Option<Plan> {
        sqlx::query_as::<_, Plan>(&format!(
            "UPDATE plans \
             SET name = COALESCE($3, name), \
                 description = COALESCE($4, description), \
                 status = COALESCE($5, status), \
                 updated_at = NOW() \
             WHERE id = $1 AND user_id = $2 \
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(req.name)
        .bind(req.description)
        .bind(req.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_plan error: {:?}", e);
            None
        })
    }

    /// update_plan_admin
    ///
    /// **Admin override**: same partial update without the ownership filter.
    async fn update_plan_admin(&self, id: Uuid, req: UpdatePlanRequest) -> Option<Plan> {
        sqlx::query_as::<_, Plan>(&format!(
            "UPDATE plans \
             SET name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 status = COALESCE($4, status), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PLAN_COLUMNS}"
        ))
        .bind(id)
        .bind(req.name)
        .bind(req.description)
        .bind(req.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("update_plan_admin error: {:?}", e);
            None
        })
    }

    /// delete_plan
    ///
    /// Deletes a plan only if the provided `user_id` matches the owner.
    async fn delete_plan(&self, id: Uuid, user_id: Uuid) -> bool {
        match sqlx::query("DELETE FROM plans WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("delete_plan error: {:?}", e);
                false
            }
        }
    }

    /// delete_plan_admin
    ///
    /// **Admin override**: deletes a plan without checking ownership.
    async fn delete_plan_admin(&self, id: Uuid) -> bool {
        match sqlx::query("DELETE FROM plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
        {
            Ok(res) => res.rows_affected() > 0,
            Err(e) => {
                tracing::error!("admin delete_plan error: {:?}", e);
                false
            }
        }
    }

    // --- ADMIN ---

    /// get_stats
    ///
    /// Compiles the counters for the administrative dashboard in one call.
    async fn get_stats(&self) -> AdminStats {
        let total_plans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let total_profiles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(0);
        let submitted_plans: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM plans WHERE status = 'submitted'")
                .fetch_one(&self.pool)
                .await
                .unwrap_or(0);
        let completed_plans: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM plans WHERE status = 'completed'")
                .fetch_one(&self.pool)
                .await
                .unwrap_or(0);
        AdminStats {
            total_plans,
            total_profiles,
            submitted_plans,
            completed_plans,
        }
    }
}
