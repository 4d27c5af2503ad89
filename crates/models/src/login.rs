use crate::session::IssuedSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LoginStage {
    AwaitingPassword,
    AwaitingSecondFactor,
    Authenticated,
    Rejected,
}

/// State of a single login attempt.
///
/// `Authenticated` is entered either from `AwaitingPassword` (no second factor
/// on the account) or from `AwaitingSecondFactor` after a valid code. The
/// transition helpers below are the only writers of `stage`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub stage: LoginStage,
    pub user_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub failed_second_factor_attempts: i32,
    pub created_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[serde(skip)]
    pub session: Option<IssuedSession>,
}

impl Default for LoginAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginAttempt {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stage: LoginStage::AwaitingPassword,
            user_id: None,
            expires_at: None,
            failed_second_factor_attempts: 0,
            created_at: Utc::now(),
            session: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.stage, LoginStage::Authenticated | LoginStage::Rejected)
    }

    /// True once `now` has reached `expires_at`. Attempts without a deadline never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn await_second_factor(&mut self, user_id: Uuid, expires_at: DateTime<Utc>) {
        self.stage = LoginStage::AwaitingSecondFactor;
        self.user_id = Some(user_id);
        self.expires_at = Some(expires_at);
        self.failed_second_factor_attempts = 0;
    }

    pub fn authenticate(&mut self, user_id: Uuid, session: IssuedSession) {
        self.stage = LoginStage::Authenticated;
        self.user_id = Some(user_id);
        self.expires_at = None;
        self.session = Some(session);
    }

    pub fn reject(&mut self) {
        self.stage = LoginStage::Rejected;
        self.expires_at = None;
        self.session = None;
    }

    /// Count a failed second-factor submission and return the new total.
    pub fn record_failed_second_factor(&mut self) -> i32 {
        self.failed_second_factor_attempts += 1;
        self.failed_second_factor_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_attempt_awaits_password() {
        let attempt = LoginAttempt::new();
        assert_eq!(attempt.stage, LoginStage::AwaitingPassword);
        assert!(attempt.user_id.is_none());
        assert!(!attempt.is_terminal());
        assert!(!attempt.is_expired_at(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_expiry_boundary() {
        let mut attempt = LoginAttempt::new();
        let expires_at = Utc::now() + Duration::minutes(5);
        attempt.await_second_factor(Uuid::new_v4(), expires_at);

        assert!(!attempt.is_expired_at(expires_at - Duration::seconds(1)));
        assert!(attempt.is_expired_at(expires_at));
    }

    #[test]
    fn test_reject_clears_session() {
        let mut attempt = LoginAttempt::new();
        let user_id = Uuid::new_v4();
        attempt.authenticate(user_id, IssuedSession::bearer("token".to_string(), 3600));
        assert!(attempt.session.is_some());

        attempt.reject();
        assert_eq!(attempt.stage, LoginStage::Rejected);
        assert!(attempt.session.is_none());
        assert!(attempt.is_terminal());
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&LoginStage::AwaitingSecondFactor).unwrap();
        assert_eq!(json, "\"awaiting_second_factor\"");
    }
}
