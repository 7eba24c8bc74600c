use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

/// Identity a cart or order belongs to: an authenticated user, or an
/// anonymous session keyed by the `x-session-id` header.
#[derive(Debug, Clone)]
pub struct CartOwner {
    pub owner_id: Uuid,
    pub user_id: Option<Uuid>,
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, "admin")
}

pub fn ensure_seller(user: &AuthUser) -> Result<(), AppError> {
    if user.role != "seller" && user.role != "admin" {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn bearer_user(parts: &axum::http::request::Parts) -> Result<Option<AuthUser>, AppError> {
    let auth_header = match parts.headers.get(header::AUTHORIZATION) {
        Some(value) => value,
        None => return Ok(None),
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

    if !auth_str.starts_with("Bearer ") {
        return Err(AppError::BadRequest("Invalid Authorization scheme".into()));
    }
    let token = auth_str.trim_start_matches("Bearer ").trim();

    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::BadRequest("Invalid user id in token".into()))?;

    Ok(Some(AuthUser {
        user_id,
        role: decoded.claims.role.clone(),
    }))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        bearer_user(parts)?.ok_or(AppError::Unauthorized)
    }
}

impl<S> FromRequestParts<S> for CartOwner
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = bearer_user(parts)? {
            return Ok(CartOwner {
                owner_id: user.user_id,
                user_id: Some(user.user_id),
            });
        }

        let session = parts
            .headers
            .get("x-session-id")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::BadRequest("Missing Authorization or x-session-id header".into())
            })?;
        let session_id = Uuid::parse_str(session)
            .map_err(|_| AppError::BadRequest("x-session-id must be a UUID".into()))?;

        Ok(CartOwner {
            owner_id: session_id,
            user_id: None,
        })
    }
}
