use crate::handlers::auth::ErrorResponse;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use curio_auth::{Claims, JwtService};
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated user context
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

impl TryFrom<Claims> for AuthUser {
    type Error = curio_auth::AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims.user_id()?,
            email: claims.email,
        })
    }
}

/// Extract and validate JWT from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "missing_auth_header",
                    "Authorization header is required",
                )),
            )
        })?
        .to_str()
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "invalid_auth_header",
                    "Invalid Authorization header format",
                )),
            )
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "invalid_auth_scheme",
                "Authorization header must use Bearer scheme",
            )),
        )
    })?;

    Ok(token.to_string())
}

/// Validate JWT and return the user it was issued for
pub fn validate_token(jwt: &JwtService, token: &str) -> Result<AuthUser, (StatusCode, Json<ErrorResponse>)> {
    jwt.validate_access_token(token)
        .and_then(AuthUser::try_from)
        .map_err(|e| {
            tracing::debug!("Token validation failed: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("invalid_token", &e.to_string())),
            )
        })
}

/// Middleware to require a valid access token
pub async fn require_auth(
    State(state): State<Arc<crate::AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let token = extract_bearer_token(&headers)?;
    let auth_user = validate_token(&state.jwt, &token)?;

    // Add user context to request extensions
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}
