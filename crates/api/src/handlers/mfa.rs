use crate::handlers::auth::{auth_error, ErrorResponse};
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use base64::Engine as _;
use curio_auth::{generate_qr_code, TotpEnrollment};
use curio_models::MfaStatus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct MfaStatusResponse {
    pub status: MfaStatus,
    pub backup_codes_remaining: usize,
}

#[derive(Debug, Serialize)]
pub struct TotpEnrollResponse {
    pub secret: String,
    pub provisioning_uri: String,
    /// PNG data URL for authenticator apps
    pub qr_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmTotpRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct BackupCodesResponse {
    pub backup_codes: Vec<String>,
}

fn enroll_response(
    enrollment: TotpEnrollment,
) -> Result<Json<TotpEnrollResponse>, (StatusCode, Json<ErrorResponse>)> {
    let png = generate_qr_code(&enrollment.provisioning_uri).map_err(auth_error)?;
    let qr_code = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    );

    Ok(Json(TotpEnrollResponse {
        secret: enrollment.secret,
        provisioning_uri: enrollment.provisioning_uri,
        qr_code,
    }))
}

/// GET /api/mfa/status
pub async fn status(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<MfaStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let status = state.mfa.status(auth_user.user_id).await.map_err(auth_error)?;
    let backup_codes_remaining = state
        .mfa
        .backup_codes_remaining(auth_user.user_id)
        .await
        .map_err(auth_error)?;

    Ok(Json(MfaStatusResponse {
        status,
        backup_codes_remaining,
    }))
}

/// Start TOTP enrollment; the credential stays pending until confirmed
/// POST /api/mfa/totp/enroll
pub async fn enroll_totp(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<TotpEnrollResponse>, (StatusCode, Json<ErrorResponse>)> {
    let enrollment = state
        .mfa
        .begin_enrollment(auth_user.user_id, &auth_user.email)
        .await
        .map_err(auth_error)?;

    enroll_response(enrollment)
}

/// Confirm enrollment with a code from the authenticator app
/// POST /api/mfa/totp/confirm
pub async fn confirm_totp(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<ConfirmTotpRequest>,
) -> Result<Json<BackupCodesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let backup_codes = state
        .mfa
        .confirm_enrollment(auth_user.user_id, &request.code)
        .await
        .map_err(auth_error)?;

    Ok(Json(BackupCodesResponse { backup_codes }))
}

/// Replace the current credential with a new pending one
/// POST /api/mfa/totp/reset
pub async fn reset_totp(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<TotpEnrollResponse>, (StatusCode, Json<ErrorResponse>)> {
    let enrollment = state
        .mfa
        .reset(auth_user.user_id, &auth_user.email)
        .await
        .map_err(auth_error)?;

    enroll_response(enrollment)
}

/// DELETE /api/mfa/totp
pub async fn disable_totp(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state
        .mfa
        .disable(auth_user.user_id)
        .await
        .map_err(auth_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/mfa/backup-codes/regenerate
pub async fn regenerate_backup_codes(
    State(state): State<Arc<AppState>>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<BackupCodesResponse>, (StatusCode, Json<ErrorResponse>)> {
    let backup_codes = state
        .mfa
        .regenerate_backup_codes(auth_user.user_id)
        .await
        .map_err(auth_error)?;

    Ok(Json(BackupCodesResponse { backup_codes }))
}
