use axum::{
    async_trait,
    body::Body,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{json_body, ApiError};
use crate::db::{DummyLoginRequest, LoginRequest, RegisterRequest, Role, TokenResponse, UserResponse};
use crate::engine::Claims;
use crate::AppState;

/// Authenticated caller, placed in request extensions by [`auth_middleware`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: Role,
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
        }
    }
}

impl CurrentUser {
    /// Fail with 403 unless the caller has one of `roles`
    pub fn require(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, role = %self.role, "Access denied");
            Err(ApiError::forbidden())
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .copied()
            .ok_or_else(|| ApiError::unauthorized("unauthorized"))
    }
}

/// Pull the bearer token out of an `Authorization` header value
fn extract_bearer(header: Option<&str>) -> Result<&str, ApiError> {
    let header = header.ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;
    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(ApiError::unauthorized("invalid authorization header format")),
    }
}

/// Auth middleware that validates bearer tokens
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let token = extract_bearer(header)?;

    let claims = state
        .services
        .identity
        .validate_token(token)
        .map_err(|e| {
            tracing::warn!(uri = %request.uri(), "Authentication failed: {}", e);
            ApiError::from(e)
        })?;

    request.extensions_mut().insert(CurrentUser::from(claims));
    Ok(next.run(request).await)
}

/// POST /dummyLogin
pub async fn dummy_login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DummyLoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let request = json_body(payload)?;
    let token = state.services.identity.dummy_login(&request.role)?;
    Ok(Json(TokenResponse { token }))
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let request = json_body(payload)?;
    let token = state
        .services
        .identity
        .login(&request.email, &request.password)
        .await?;
    Ok(Json(TokenResponse { token }))
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let request = json_body(payload)?;
    let user = state
        .services
        .identity
        .register(&request.email, &request.password, &request.role)
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc.def")).unwrap(), "abc.def");

        let missing = extract_bearer(None).unwrap_err();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(missing.message(), "missing authorization header");

        for bad in ["abc.def", "Basic abc", "Bearer ", "bearer abc"] {
            let err = extract_bearer(Some(bad)).unwrap_err();
            assert_eq!(err.message(), "invalid authorization header format");
        }
    }

    #[test]
    fn test_require_role() {
        let user = CurrentUser {
            id: Uuid::new_v4(),
            role: Role::Employee,
        };
        assert!(user.require(&[Role::Employee, Role::Moderator]).is_ok());
        let err = user.require(&[Role::Moderator]).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
