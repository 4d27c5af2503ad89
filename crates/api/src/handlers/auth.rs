use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use curio_auth::AuthError;
use curio_authz::AuthzError;
use curio_models::{IssuedSession, LoginAttempt, LoginStage, NewUser, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
        }
    }
}

/// Map a service error onto a status code and a stable error code.
pub fn auth_error(err: AuthError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match &err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
        AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired"),
        AuthError::UserInactive => (StatusCode::FORBIDDEN, "user_inactive"),
        AuthError::UserNotFound | AuthError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        AuthError::InvalidMfaCode => (StatusCode::BAD_REQUEST, "invalid_mfa_code"),
        AuthError::MfaNotEnrolled => (StatusCode::BAD_REQUEST, "mfa_not_enrolled"),
        AuthError::MfaAlreadyEnabled => (StatusCode::CONFLICT, "mfa_already_enabled"),
        AuthError::InvalidLoginStage { .. } => (StatusCode::CONFLICT, "invalid_login_stage"),
        AuthError::AlreadyExists(_) => (StatusCode::CONFLICT, "already_exists"),
        AuthError::WeakPassword(_) => (StatusCode::BAD_REQUEST, "weak_password"),
        AuthError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        _ => {
            tracing::error!("Request failed: {}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal_error", "Internal server error")),
            );
        }
    };

    (status, Json(ErrorResponse::new(code, &err.to_string())))
}

pub fn authz_error(err: AuthzError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        AuthzError::ValidationError(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("validation_error", &msg)),
        ),
        AuthzError::PermissionDenied(msg) => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new("permission_denied", &msg)),
        ),
        other => {
            tracing::error!("Authorization store failure: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal_error", "Internal server error")),
            )
        }
    }
}

fn internal_error(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!("{}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("internal_error", "Internal server error")),
    )
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyMfaRequest {
    pub challenge_token: Uuid,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginResponse {
    Success {
        #[serde(flatten)]
        session: IssuedSession,
    },
    MfaRequired {
        challenge_token: Uuid,
        expires_at: DateTime<Utc>,
    },
}

/// Register a new user and attach the default role
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), (StatusCode, Json<ErrorResponse>)> {
    let user = state
        .accounts
        .register(NewUser {
            email: request.email,
            password: request.password,
            name: request.name,
        })
        .await
        .map_err(auth_error)?;

    state
        .roles
        .assign_default_role(user.id)
        .await
        .map_err(authz_error)?;

    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

/// Password step of the login
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut attempt = LoginAttempt::new();

    let stage = state
        .gate
        .submit_password(&mut attempt, &request.email, &request.password)
        .await
        .map_err(auth_error)?;

    match stage {
        LoginStage::Authenticated => {
            let session = attempt
                .session
                .take()
                .ok_or_else(|| internal_error("Authenticated attempt without a session"))?;
            Ok(Json(LoginResponse::Success { session }))
        }
        LoginStage::AwaitingSecondFactor => {
            let expires_at = attempt
                .expires_at
                .ok_or_else(|| internal_error("Second-factor challenge without expiry"))?;

            state
                .challenges
                .save_attempt(&attempt)
                .await
                .map_err(auth_error)?;

            Ok(Json(LoginResponse::MfaRequired {
                challenge_token: attempt.id,
                expires_at,
            }))
        }
        LoginStage::Rejected | LoginStage::AwaitingPassword => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "invalid_credentials",
                "Invalid email or password",
            )),
        )),
    }
}

/// Second-factor step of the login
/// POST /api/auth/mfa/verify
pub async fn verify_mfa(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyMfaRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, Json<ErrorResponse>)> {
    // Taking the challenge out of the store serializes submissions for it; a
    // parallel request sees no challenge and gets to check no code.
    let mut attempt = state
        .challenges
        .take_attempt(request.challenge_token)
        .await
        .map_err(auth_error)?
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new(
                    "invalid_challenge",
                    "Login challenge not found, already used or in use",
                )),
            )
        })?;

    let stage = match state
        .gate
        .submit_second_factor(&mut attempt, &request.code)
        .await
    {
        Ok(stage) => stage,
        Err(e) => {
            if attempt.stage == LoginStage::AwaitingSecondFactor {
                if let Err(save_err) = state.challenges.save_attempt(&attempt).await {
                    tracing::error!("Failed to restore login challenge: {}", save_err);
                }
            }
            return Err(auth_error(e));
        }
    };

    match stage {
        LoginStage::Authenticated => {
            let session = attempt
                .session
                .take()
                .ok_or_else(|| internal_error("Authenticated attempt without a session"))?;
            Ok(Json(LoginResponse::Success { session }))
        }
        LoginStage::AwaitingSecondFactor => {
            state
                .challenges
                .save_attempt(&attempt)
                .await
                .map_err(auth_error)?;

            Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("invalid_mfa_code", "Invalid verification code")),
            ))
        }
        LoginStage::Rejected | LoginStage::AwaitingPassword => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(
                "login_rejected",
                "Login rejected, start again with your password",
            )),
        )),
    }
}
