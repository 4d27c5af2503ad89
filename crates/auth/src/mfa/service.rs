use super::backup_codes::{
    generate_backup_codes, hash_backup_code, normalize_backup_code, verify_backup_code,
    CODE_LENGTH,
};
use super::totp::{unix_time, TotpEngine, TotpSecret};
use crate::error::{AuthError, Result};
use crate::store::CredentialStore;
use chrono::{DateTime, Utc};
use curio_models::{MfaStatus, TotpCredential};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Data handed to the user when enrollment starts.
#[derive(Debug, Clone, Serialize)]
pub struct TotpEnrollment {
    pub secret: String,
    pub provisioning_uri: String,
}

/// TOTP enrollment lifecycle and backup-code management for a user.
pub struct MfaService {
    engine: TotpEngine,
    credentials: Arc<dyn CredentialStore>,
    backup_code_count: usize,
}

impl MfaService {
    pub fn new(
        engine: TotpEngine,
        credentials: Arc<dyn CredentialStore>,
        backup_code_count: usize,
    ) -> Self {
        Self {
            engine,
            credentials,
            backup_code_count,
        }
    }

    pub fn engine(&self) -> &TotpEngine {
        &self.engine
    }

    pub async fn credential(&self, user_id: Uuid) -> Result<Option<TotpCredential>> {
        self.credentials.find_credential(user_id).await
    }

    pub async fn status(&self, user_id: Uuid) -> Result<MfaStatus> {
        let credential = self.credentials.find_credential(user_id).await?;
        Ok(MfaStatus::from_credential(credential.as_ref()))
    }

    /// Generate a new secret and store it as a pending credential.
    ///
    /// A pending credential from an abandoned enrollment is replaced; an enabled
    /// one must be disabled or reset first.
    pub async fn begin_enrollment(&self, user_id: Uuid, account_name: &str) -> Result<TotpEnrollment> {
        if let Some(existing) = self.credentials.find_credential(user_id).await? {
            if existing.enabled {
                return Err(AuthError::MfaAlreadyEnabled);
            }
        }

        let secret = self.engine.generate_secret()?;
        let provisioning_uri = self.engine.provisioning_uri(&secret, account_name);

        self.credentials
            .save_credential(&TotpCredential::pending(user_id, secret.as_str().to_string()))
            .await?;

        tracing::info!(user_id = %user_id, "TOTP enrollment started");

        Ok(TotpEnrollment {
            secret: secret.into_string(),
            provisioning_uri,
        })
    }

    /// Enable the pending credential once `code` verifies, and issue backup codes.
    pub async fn confirm_enrollment(&self, user_id: Uuid, code: &str) -> Result<Vec<String>> {
        self.confirm_enrollment_at(user_id, code, unix_time(Utc::now()))
            .await
    }

    pub async fn confirm_enrollment_at(
        &self,
        user_id: Uuid,
        code: &str,
        time: u64,
    ) -> Result<Vec<String>> {
        let credential = self
            .credentials
            .find_credential(user_id)
            .await?
            .ok_or(AuthError::MfaNotEnrolled)?;

        if credential.enabled {
            return Err(AuthError::MfaAlreadyEnabled);
        }

        let secret = TotpSecret::from_base32(&credential.secret)?;
        if !self.engine.verify_code(&secret, code, time)? {
            tracing::warn!(user_id = %user_id, "TOTP enrollment confirmation failed");
            return Err(AuthError::InvalidMfaCode);
        }

        // Codes first: a credential must never be enabled without them
        let backup_codes = self.store_new_backup_codes(user_id).await?;
        self.credentials.enable_credential(user_id, Utc::now()).await?;

        tracing::info!(user_id = %user_id, "TOTP enabled");

        Ok(backup_codes)
    }

    /// Replace the backup-code set of an enabled credential.
    pub async fn regenerate_backup_codes(&self, user_id: Uuid) -> Result<Vec<String>> {
        self.require_enabled(user_id).await?;
        let backup_codes = self.store_new_backup_codes(user_id).await?;

        tracing::info!(user_id = %user_id, "Backup codes regenerated");

        Ok(backup_codes)
    }

    /// Turn the second factor off, dropping the secret and all backup codes.
    pub async fn disable(&self, user_id: Uuid) -> Result<()> {
        self.credentials.delete_credential(user_id).await?;
        tracing::info!(user_id = %user_id, "TOTP disabled");
        Ok(())
    }

    /// Discard the current credential and start over with a new secret.
    pub async fn reset(&self, user_id: Uuid, account_name: &str) -> Result<TotpEnrollment> {
        self.credentials.delete_credential(user_id).await?;
        self.begin_enrollment(user_id, account_name).await
    }

    /// Record a successful TOTP login.
    pub async fn touch(&self, user_id: Uuid, used_at: DateTime<Utc>) -> Result<()> {
        self.credentials.touch_credential(user_id, used_at).await
    }

    pub async fn backup_codes_remaining(&self, user_id: Uuid) -> Result<usize> {
        Ok(self.credentials.unused_backup_codes(user_id).await?.len())
    }

    /// Use up a backup code. Unknown and already used codes both yield `false`.
    pub async fn consume_backup_code(&self, user_id: Uuid, submitted: &str) -> Result<bool> {
        // Anything that cannot be a backup code never reaches the hashes
        if normalize_backup_code(submitted).len() != CODE_LENGTH {
            return Ok(false);
        }

        for code in self.credentials.unused_backup_codes(user_id).await? {
            if verify_backup_code(submitted, &code.code_hash)? {
                // Losing a race against a concurrent consumer counts as a miss
                return self
                    .credentials
                    .mark_backup_code_used(user_id, code.id, Utc::now())
                    .await;
            }
        }

        Ok(false)
    }

    async fn require_enabled(&self, user_id: Uuid) -> Result<TotpCredential> {
        match self.credentials.find_credential(user_id).await? {
            Some(credential) if credential.enabled => Ok(credential),
            _ => Err(AuthError::MfaNotEnrolled),
        }
    }

    async fn store_new_backup_codes(&self, user_id: Uuid) -> Result<Vec<String>> {
        let codes = generate_backup_codes(self.backup_code_count);
        let hashes = codes
            .iter()
            .map(|code| hash_backup_code(code))
            .collect::<Result<Vec<_>>>()?;

        self.credentials.replace_backup_codes(user_id, &hashes).await?;
        Ok(codes)
    }
}
