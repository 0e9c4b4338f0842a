use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, ProfileResponse, PublicUser, RefreshRequest,
            RegisterRequest, UpdateApiKeyRequest,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        repo_types::User,
        services::{
            hash_password, is_valid_email, mask_api_key, normalize_email, validate_registration,
            verify_password,
        },
    },
    error::ApiError,
    state::AppState,
    subscriptions::{self, services::generation_gate},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/api-key", put(update_api_key))
}

fn issue_tokens(state: &AppState, user: &User) -> Result<AuthResponse, ApiError> {
    let keys = JwtKeys::from_ref(state);
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user: PublicUser {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        },
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    if let Err(reason) = validate_registration(&mut payload) {
        warn!(email = %payload.email, reason, "registration rejected");
        return Err(ApiError::bad_request(reason));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let hash = hash_password(&payload.password)?;
    let Some((user, sub)) = User::create_with_trial(
        &state.db,
        &payload.name,
        &payload.email,
        &hash,
        &payload.veo3_api_key,
    )
    .await?
    else {
        warn!(email = %payload.email, "email registered concurrently");
        return Err(ApiError::conflict("Email already registered"));
    };

    info!(user_id = %user.id, email = %user.email, plan = ?sub.plan, "user registered");
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, &user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::bad_request("Invalid email"));
    }

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    let sub = subscriptions::repo::find_by_user(&state.db, user_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {} has no subscription", user_id))?;

    let api_key = user.api_key().map(str::to_string);
    let gate = generation_gate(&sub, api_key.is_some(), OffsetDateTime::now_utc());
    Ok(Json(ProfileResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        created_at: user.created_at,
        has_api_key: api_key.is_some(),
        api_key_hint: api_key.as_deref().map(mask_api_key),
        subscription: sub,
        can_generate: gate.is_ok(),
        blocked_reason: gate.err(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_api_key(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateApiKeyRequest>,
) -> Result<StatusCode, ApiError> {
    let key = payload.api_key.trim();
    if key.is_empty() {
        return Err(ApiError::bad_request("API key must not be empty"));
    }
    if !User::set_api_key(&state.db, user_id, key).await? {
        return Err(ApiError::unauthorized("User not found"));
    }
    info!(%user_id, "api key updated");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    async fn post_json(uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(json!({})))
    }

    #[tokio::test]
    async fn register_rejects_mismatched_passwords_before_touching_db() {
        let (status, body) = post_json(
            "/api/v1/auth/register",
            json!({
                "name": "Budi",
                "email": "budi@example.com",
                "password": "password-1",
                "confirm_password": "password-2",
                "veo3_api_key": "r8_key"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Passwords do not match");
    }

    #[tokio::test]
    async fn login_rejects_invalid_email() {
        let (status, _) = post_json(
            "/api/v1/auth/login",
            json!({ "email": "not-an-email", "password": "whatever" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let state = AppState::fake();
        let access = JwtKeys::from_ref(&state).sign_access(uuid::Uuid::new_v4()).unwrap();
        let (status, body) =
            post_json("/api/v1/auth/refresh", json!({ "refresh_token": access })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "not a refresh token");
    }

    #[tokio::test]
    async fn me_requires_token() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn public_user_serialization() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".to_string(),
            name: "Test".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("id"));
    }
}
