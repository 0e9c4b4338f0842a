use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use super::jwt::JwtKeys;
use crate::error::ApiError;

/// Extracts and validates an access JWT, returning the user ID.
pub struct AuthUser(pub Uuid);

/// Succeeds only for a valid admin JWT.
pub struct AdminUser;

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header"))
}

fn claims_of_kind<S>(parts: &Parts, state: &S, kind: TokenKind) -> Result<Claims, ApiError>
where
    JwtKeys: FromRef<S>,
{
    let token = bearer_token(parts)?;
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        ApiError::unauthorized("Invalid or expired token")
    })?;
    if claims.kind != kind {
        return Err(match kind {
            TokenKind::Admin => ApiError::forbidden("Admin token required"),
            _ => ApiError::unauthorized("Access token required"),
        });
    }
    Ok(claims)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = claims_of_kind(parts, state, TokenKind::Access)?;
        Ok(AuthUser(claims.sub))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        claims_of_kind(parts, state, TokenKind::Admin)?;
        Ok(AdminUser)
    }
}
