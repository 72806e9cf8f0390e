use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use planforge::{
    AppState,
    auth::{AuthSession, AuthUser, Claims, JwtIdentityProvider, SESSION_COOKIE},
    config::{AppConfig, Env},
    models::{
        AdminStats, CreatePlanRequest, Plan, PlanStatus, Profile, Role, UpdatePlanRequest,
    },
    repository::{Repository, RepositoryError},
};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

// --- Mock Repository for Auth Logic ---

#[derive(Default)]
struct MockAuthRepo {
    profile_to_return: Option<Profile>,
    lookup_fails: bool,
}

#[async_trait]
impl Repository for MockAuthRepo {
    async fn get_profile(&self, _id: Uuid) -> Result<Option<Profile>, RepositoryError> {
        if self.lookup_fails {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.profile_to_return.clone())
    }
    async fn get_profile_role(&self, _id: Uuid) -> Result<Option<Role>, RepositoryError> {
        if self.lookup_fails {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(self.profile_to_return.as_ref().map(|p| p.role))
    }
    // Placeholder implementations for the unused trait methods.
    async fn create_profile(
        &self,
        _id: Uuid,
        _email: &str,
        _name: &str,
        _role: Role,
    ) -> Result<Profile, RepositoryError> {
        Ok(Profile::default())
    }
    async fn upsert_profile_minimal(&self, _id: Uuid) -> Result<Profile, RepositoryError> {
        Ok(Profile::default())
    }
    async fn set_role(&self, _id: Uuid, _role: Role) -> Result<bool, RepositoryError> {
        Ok(false)
    }
    async fn get_plans(&self, _owner: Uuid, _status: Option<PlanStatus>) -> Vec<Plan> {
        vec![]
    }
    async fn get_all_plans(&self, _status: Option<PlanStatus>) -> Vec<Plan> {
        vec![]
    }
    async fn get_plan(&self, _id: Uuid) -> Option<Plan> {
        None
    }
    async fn get_plan_authorized(&self, _id: Uuid, _user_id: Uuid) -> Option<Plan> {
        None
    }
    async fn create_plan(
        &self,
        _req: CreatePlanRequest,
        _user_id: Uuid,
    ) -> Result<Plan, RepositoryError> {
        Ok(Plan::default())
    }
    async fn update_plan(
        &self,
        _id: Uuid,
        _user_id: Uuid,
        _req: UpdatePlanRequest,
    ) -> Option<Plan> {
        None
    }
    async fn update_plan_admin(&self, _id: Uuid, _req: UpdatePlanRequest) -> Option<Plan> {
        None
    }
    async fn delete_plan(&self, _id: Uuid, _user_id: Uuid) -> bool {
        false
    }
    async fn delete_plan_admin(&self, _id: Uuid) -> bool {
        false
    }
    async fn get_stats(&self) -> AdminStats {
        AdminStats::default()
    }
}

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: Uuid = Uuid::from_u128(1);

fn create_token(user_id: Uuid, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id,
        iat: now as usize,
        exp: (now + exp_offset) as usize,
        email: Some("drafter@example.com".to_string()),
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, repo: MockAuthRepo, jwt_secret: String) -> AppState {
    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = jwt_secret.clone();

    AppState {
        repo: Arc::new(repo),
        identity: Arc::new(JwtIdentityProvider::new(jwt_secret)),
        config,
    }
}

fn basic_profile(id: Uuid, role: Role) -> Profile {
    Profile {
        id,
        email: "drafter@example.com".to_string(),
        name: "Drafter".to_string(),
        role,
        ..Profile::default()
    }
}

/// Helper to get the mutable Parts struct from a generated Request.
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_session_cookie(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).unwrap(),
    );
}

// --- Session Resolution Tests ---

#[tokio::test]
async fn test_session_from_valid_cookie_jwt() {
    let token = create_token(TEST_USER_ID, 3600);
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo::default(),
        TEST_JWT_SECRET.to_string(),
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, &token);

    let session = AuthSession::from_request_parts(&mut parts, &app_state).await;

    assert!(session.is_ok());
    let AuthSession(session) = session.unwrap();
    assert_eq!(session.user_id, TEST_USER_ID);
    assert_eq!(session.email.as_deref(), Some("drafter@example.com"));
}

#[tokio::test]
async fn test_session_from_bearer_token() {
    let token = create_token(TEST_USER_ID, 3600);
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo::default(),
        TEST_JWT_SECRET.to_string(),
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );

    let session = AuthSession::from_request_parts(&mut parts, &app_state).await;
    assert!(session.is_ok());
    assert_eq!(session.unwrap().0.user_id, TEST_USER_ID);
}

#[tokio::test]
async fn test_session_failure_with_missing_credentials() {
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo::default(),
        TEST_JWT_SECRET.to_string(),
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    let session = AuthSession::from_request_parts(&mut parts, &app_state).await;

    assert!(session.is_err());
    assert_eq!(session.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_expired_token_is_anonymous() {
    // Expired an hour ago, well past the default validation leeway.
    let token = create_token(TEST_USER_ID, -3600);
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo::default(),
        TEST_JWT_SECRET.to_string(),
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, &token);

    let session = AuthSession::from_request_parts(&mut parts, &app_state).await;
    assert!(session.is_err());
    assert_eq!(session.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_anonymous() {
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo::default(),
        TEST_JWT_SECRET.to_string(),
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, "not-a-jwt");

    let session = AuthSession::from_request_parts(&mut parts, &app_state).await;
    assert!(session.is_err());
    assert_eq!(session.unwrap_err(), StatusCode::UNAUTHORIZED);
}

// --- AuthUser (session + profile) Tests ---

#[tokio::test]
async fn test_auth_user_success_with_valid_jwt() {
    let token = create_token(TEST_USER_ID, 3600);

    let mock_repo = MockAuthRepo {
        profile_to_return: Some(basic_profile(TEST_USER_ID, Role::Basic)),
        ..MockAuthRepo::default()
    };
    let app_state = create_app_state(Env::Production, mock_repo, TEST_JWT_SECRET.to_string());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(auth_user.is_ok());
    let user = auth_user.unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, Role::Basic);
    assert_eq!(user.email, "drafter@example.com");
}

#[tokio::test]
async fn test_auth_user_rejects_unknown_subject() {
    // A valid token whose subject has no profile row is not an active user.
    let token = create_token(TEST_USER_ID, 3600);
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo::default(),
        TEST_JWT_SECRET.to_string(),
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(auth_user.is_err());
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_user_profile_fault_maps_to_500() {
    // The API surface fails closed with a server error, unlike the page
    // gate's fail-open policy.
    let token = create_token(TEST_USER_ID, 3600);
    let mock_repo = MockAuthRepo {
        lookup_fails: true,
        ..MockAuthRepo::default()
    };
    let app_state = create_app_state(Env::Production, mock_repo, TEST_JWT_SECRET.to_string());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_session_cookie(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(auth_user.is_err());
    assert_eq!(auth_user.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);
}

// --- Local Bypass Tests ---

#[tokio::test]
async fn test_local_bypass_success() {
    let mock_user_id = Uuid::new_v4();
    let mock_repo = MockAuthRepo {
        profile_to_return: Some(basic_profile(mock_user_id, Role::Admin)),
        ..MockAuthRepo::default()
    };
    let app_state = create_app_state(Env::Local, mock_repo, TEST_JWT_SECRET.to_string());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&mock_user_id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(auth_user.is_ok());
    let user = auth_user.unwrap();
    assert_eq!(user.id, mock_user_id);
    assert_eq!(user.role, Role::Admin);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let mock_user_id = Uuid::new_v4();
    let app_state = create_app_state(
        Env::Production,
        MockAuthRepo::default(),
        TEST_JWT_SECRET.to_string(),
    );

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    // Provide ONLY the local bypass header.
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        header::HeaderValue::from_str(&mock_user_id.to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(auth_user.is_err());
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}
