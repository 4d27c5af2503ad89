use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// TOTP credential owned by a single user.
///
/// `secret` is the base32 (RFC 4648, unpadded) encoding of the shared key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TotpCredential {
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub secret: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl TotpCredential {
    /// A freshly generated credential awaiting confirmation.
    pub fn pending(user_id: Uuid, secret: String) -> Self {
        Self {
            user_id,
            secret,
            enabled: false,
            created_at: Utc::now(),
            confirmed_at: None,
            last_used_at: None,
        }
    }

    pub fn status(&self) -> MfaStatus {
        if self.enabled {
            MfaStatus::Enabled
        } else {
            MfaStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BackupCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code_hash: String,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl BackupCode {
    pub fn new(user_id: Uuid, code_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            code_hash,
            used_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.used_at.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MfaStatus {
    /// No credential on file.
    Disabled,
    /// Secret generated, waiting for the first valid code.
    Pending,
    Enabled,
}

impl MfaStatus {
    pub fn from_credential(credential: Option<&TotpCredential>) -> Self {
        credential.map_or(MfaStatus::Disabled, TotpCredential::status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_credential() {
        let credential = TotpCredential::pending(Uuid::new_v4(), "JBSWY3DPEHPK3PXP".to_string());
        assert!(!credential.enabled);
        assert!(credential.confirmed_at.is_none());
        assert_eq!(credential.status(), MfaStatus::Pending);
    }

    #[test]
    fn test_status_from_credential() {
        assert_eq!(MfaStatus::from_credential(None), MfaStatus::Disabled);

        let mut credential = TotpCredential::pending(Uuid::new_v4(), "JBSWY3DPEHPK3PXP".to_string());
        credential.enabled = true;
        assert_eq!(MfaStatus::from_credential(Some(&credential)), MfaStatus::Enabled);
    }

    #[test]
    fn test_secret_not_serialized() {
        let credential = TotpCredential::pending(Uuid::new_v4(), "JBSWY3DPEHPK3PXP".to_string());
        let json = serde_json::to_string(&credential).unwrap();
        assert!(!json.contains("JBSWY3DPEHPK3PXP"));
    }

    #[test]
    fn test_backup_code_availability() {
        let mut code = BackupCode::new(Uuid::new_v4(), "hash".to_string());
        assert!(code.is_available());

        code.used_at = Some(Utc::now());
        assert!(!code.is_available());
    }
}
