//! Second-factor login gate.
//!
//! A [`LoginAttempt`] moves `AwaitingPassword -> AwaitingSecondFactor ->
//! Authenticated`, or straight to `Authenticated` when the account has no
//! enabled second factor. Any failed password, expired challenge or exhausted
//! retry budget ends in `Rejected`. Sessions are issued only on the transition
//! into `Authenticated`.

use crate::error::{AuthError, Result};
use crate::mfa::{unix_time, MfaService, TotpSecret};
use crate::password::PasswordHasher;
use crate::store::UserStore;
use chrono::{DateTime, Duration, Utc};
use curio_models::{IssuedSession, LoginAttempt, LoginStage, User};
use std::sync::Arc;
use uuid::Uuid;

/// Issues a session for a fully authenticated user.
pub trait SessionIssuer: Send + Sync {
    fn issue(&self, user: &User) -> Result<IssuedSession>;
}

#[derive(Debug, Clone)]
pub struct LoginGateConfig {
    /// How long the second-factor challenge stays open.
    pub challenge_ttl: Duration,
    /// Failed second-factor submissions tolerated before rejecting.
    pub max_second_factor_attempts: i32,
}

impl Default for LoginGateConfig {
    fn default() -> Self {
        Self {
            challenge_ttl: Duration::minutes(5),
            max_second_factor_attempts: 5,
        }
    }
}

pub struct LoginGate {
    users: Arc<dyn UserStore>,
    mfa: Arc<MfaService>,
    sessions: Arc<dyn SessionIssuer>,
    config: LoginGateConfig,
}

impl LoginGate {
    pub fn new(
        users: Arc<dyn UserStore>,
        mfa: Arc<MfaService>,
        sessions: Arc<dyn SessionIssuer>,
        config: LoginGateConfig,
    ) -> Self {
        Self {
            users,
            mfa,
            sessions,
            config,
        }
    }

    pub async fn submit_password(
        &self,
        attempt: &mut LoginAttempt,
        email: &str,
        password: &str,
    ) -> Result<LoginStage> {
        self.submit_password_at(attempt, email, password, Utc::now())
            .await
    }

    /// First step: check the password and decide whether a second factor is needed.
    pub async fn submit_password_at(
        &self,
        attempt: &mut LoginAttempt,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginStage> {
        match attempt.stage {
            LoginStage::AwaitingPassword => {}
            LoginStage::Rejected => return Ok(LoginStage::Rejected),
            stage => return Err(AuthError::InvalidLoginStage { stage }),
        }

        let email = email.trim().to_lowercase();

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            PasswordHasher::verify_dummy(password);
            tracing::warn!(attempt_id = %attempt.id, "Login rejected: unknown email");
            attempt.reject();
            return Ok(attempt.stage);
        };

        if !self.password_matches(&user, password)? {
            tracing::warn!(attempt_id = %attempt.id, user_id = %user.id, "Login rejected: invalid password");
            attempt.reject();
            return Ok(attempt.stage);
        }

        if !user.is_active {
            tracing::warn!(attempt_id = %attempt.id, user_id = %user.id, "Login rejected: inactive user");
            attempt.reject();
            return Ok(attempt.stage);
        }

        let second_factor_enabled = self
            .mfa
            .credential(user.id)
            .await?
            .is_some_and(|credential| credential.enabled);

        if second_factor_enabled {
            attempt.await_second_factor(user.id, now + self.config.challenge_ttl);
            tracing::debug!(attempt_id = %attempt.id, user_id = %user.id, "Second factor required");
            return Ok(attempt.stage);
        }

        self.complete(attempt, &user).await
    }

    pub async fn submit_second_factor(
        &self,
        attempt: &mut LoginAttempt,
        code: &str,
    ) -> Result<LoginStage> {
        self.submit_second_factor_at(attempt, code, Utc::now()).await
    }

    /// Second step: accept a TOTP code, falling back to a backup code.
    pub async fn submit_second_factor_at(
        &self,
        attempt: &mut LoginAttempt,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginStage> {
        match attempt.stage {
            LoginStage::AwaitingSecondFactor => {}
            LoginStage::Rejected => return Ok(LoginStage::Rejected),
            stage => return Err(AuthError::InvalidLoginStage { stage }),
        }

        let user_id = attempt
            .user_id
            .ok_or_else(|| AuthError::Internal("Second-factor attempt without a user".to_string()))?;

        if attempt.is_expired_at(now) {
            tracing::warn!(attempt_id = %attempt.id, user_id = %user_id, "Second-factor challenge expired");
            attempt.reject();
            return Ok(attempt.stage);
        }

        let credential = match self.mfa.credential(user_id).await? {
            Some(credential) if credential.enabled => credential,
            // Second factor was disabled after the password step
            _ => {
                attempt.reject();
                return Ok(attempt.stage);
            }
        };

        let secret = TotpSecret::from_base32(&credential.secret)?;
        if self.mfa.engine().verify_code(&secret, code, unix_time(now))? {
            self.mfa.touch(user_id, now).await?;
            return self.complete_for(attempt, user_id).await;
        }

        if self.mfa.consume_backup_code(user_id, code).await? {
            tracing::info!(attempt_id = %attempt.id, user_id = %user_id, "Backup code used for login");
            return self.complete_for(attempt, user_id).await;
        }

        let failures = attempt.record_failed_second_factor();
        if failures >= self.config.max_second_factor_attempts {
            tracing::warn!(
                attempt_id = %attempt.id,
                user_id = %user_id,
                failures,
                "Login rejected: too many invalid second-factor codes"
            );
            attempt.reject();
        } else {
            tracing::debug!(attempt_id = %attempt.id, user_id = %user_id, failures, "Invalid second-factor code");
        }

        Ok(attempt.stage)
    }

    fn password_matches(&self, user: &User, password: &str) -> Result<bool> {
        match user.password_hash.as_deref() {
            Some(hash) => PasswordHasher::verify(password, hash),
            None => {
                PasswordHasher::verify_dummy(password);
                Ok(false)
            }
        }
    }

    async fn complete_for(&self, attempt: &mut LoginAttempt, user_id: Uuid) -> Result<LoginStage> {
        let user = self
            .users
            .find_user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.is_active {
            attempt.reject();
            return Ok(attempt.stage);
        }

        self.complete(attempt, &user).await
    }

    async fn complete(&self, attempt: &mut LoginAttempt, user: &User) -> Result<LoginStage> {
        let session = self.sessions.issue(user)?;
        self.users.update_last_login(user.id).await?;
        attempt.authenticate(user.id, session);

        tracing::info!(attempt_id = %attempt.id, user_id = %user.id, "Login authenticated");

        Ok(attempt.stage)
    }
}
