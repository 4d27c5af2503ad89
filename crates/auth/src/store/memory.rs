use super::{ChallengeStore, CredentialStore, UserStore};
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curio_models::{BackupCode, LoginAttempt, NewUser, TotpCredential, User};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local store implementing every auth storage trait.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    credentials: RwLock<HashMap<Uuid, TotpCredential>>,
    backup_codes: RwLock<HashMap<Uuid, Vec<BackupCode>>>,
    attempts: RwLock<HashMap<Uuid, LoginAttempt>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_user_active(&self, id: Uuid, is_active: bool) {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.is_active = is_active;
        }
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create_user(&self, new_user: &NewUser, password_hash: &str) -> Result<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == new_user.email) {
            return Err(AuthError::AlreadyExists(format!(
                "User with email {} already exists",
                new_user.email
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.clone(),
            name: new_user.name.clone(),
            password_hash: Some(password_hash.to_string()),
            is_active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_last_login(&self, id: Uuid) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(AuthError::UserNotFound)?;
        user.last_login_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_credential(&self, user_id: Uuid) -> Result<Option<TotpCredential>> {
        Ok(self.credentials.read().await.get(&user_id).cloned())
    }

    async fn save_credential(&self, credential: &TotpCredential) -> Result<()> {
        self.credentials
            .write()
            .await
            .insert(credential.user_id, credential.clone());
        Ok(())
    }

    async fn enable_credential(&self, user_id: Uuid, confirmed_at: DateTime<Utc>) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        let credential = credentials
            .get_mut(&user_id)
            .ok_or(AuthError::MfaNotEnrolled)?;
        credential.enabled = true;
        credential.confirmed_at = Some(confirmed_at);
        Ok(())
    }

    async fn touch_credential(&self, user_id: Uuid, used_at: DateTime<Utc>) -> Result<()> {
        if let Some(credential) = self.credentials.write().await.get_mut(&user_id) {
            credential.last_used_at = Some(used_at);
        }
        Ok(())
    }

    async fn delete_credential(&self, user_id: Uuid) -> Result<()> {
        self.credentials.write().await.remove(&user_id);
        self.backup_codes.write().await.remove(&user_id);
        Ok(())
    }

    async fn replace_backup_codes(&self, user_id: Uuid, code_hashes: &[String]) -> Result<()> {
        let codes = code_hashes
            .iter()
            .map(|hash| BackupCode::new(user_id, hash.clone()))
            .collect();
        self.backup_codes.write().await.insert(user_id, codes);
        Ok(())
    }

    async fn unused_backup_codes(&self, user_id: Uuid) -> Result<Vec<BackupCode>> {
        let codes = self.backup_codes.read().await;
        Ok(codes
            .get(&user_id)
            .map(|codes| codes.iter().filter(|c| c.is_available()).cloned().collect())
            .unwrap_or_default())
    }

    async fn mark_backup_code_used(
        &self,
        user_id: Uuid,
        code_id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<bool> {
        // Check and mark under one write guard
        let mut codes = self.backup_codes.write().await;
        let Some(code) = codes
            .get_mut(&user_id)
            .and_then(|codes| codes.iter_mut().find(|c| c.id == code_id))
        else {
            return Ok(false);
        };

        if !code.is_available() {
            return Ok(false);
        }

        code.used_at = Some(used_at);
        Ok(true)
    }
}

#[async_trait]
impl ChallengeStore for InMemoryStore {
    async fn save_attempt(&self, attempt: &LoginAttempt) -> Result<()> {
        self.attempts
            .write()
            .await
            .insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn take_attempt(&self, id: Uuid) -> Result<Option<LoginAttempt>> {
        Ok(self.attempts.write().await.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryStore::new();
        let new_user = NewUser {
            email: "curator@example.com".to_string(),
            password: "Collect1ons".to_string(),
            name: None,
        };

        store.create_user(&new_user, "hash").await.unwrap();
        let err = store.create_user(&new_user, "hash").await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_mark_backup_code_used_once() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .replace_backup_codes(user_id, &["h1".to_string(), "h2".to_string()])
            .await
            .unwrap();

        let codes = store.unused_backup_codes(user_id).await.unwrap();
        assert_eq!(codes.len(), 2);

        let code_id = codes[0].id;
        assert!(store.mark_backup_code_used(user_id, code_id, Utc::now()).await.unwrap());
        assert!(!store.mark_backup_code_used(user_id, code_id, Utc::now()).await.unwrap());
        assert_eq!(store.unused_backup_codes(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_mark_single_winner() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = Uuid::new_v4();
        store
            .replace_backup_codes(user_id, &["h1".to_string()])
            .await
            .unwrap();
        let code_id = store.unused_backup_codes(user_id).await.unwrap()[0].id;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .mark_backup_code_used(user_id, code_id, Utc::now())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_delete_credential_clears_backup_codes() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        store
            .save_credential(&TotpCredential::pending(user_id, "JBSWY3DPEHPK3PXP".to_string()))
            .await
            .unwrap();
        store
            .replace_backup_codes(user_id, &["h1".to_string()])
            .await
            .unwrap();

        store.delete_credential(user_id).await.unwrap();

        assert!(store.find_credential(user_id).await.unwrap().is_none());
        assert!(store.unused_backup_codes(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_take_attempt_has_single_owner() {
        let store = Arc::new(InMemoryStore::new());
        let attempt = LoginAttempt::new();
        store.save_attempt(&attempt).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let id = attempt.id;
                tokio::spawn(async move { store.take_attempt(id).await.unwrap() })
            })
            .collect();

        let mut owners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                owners += 1;
            }
        }
        assert_eq!(owners, 1);
        assert!(store.take_attempt(attempt.id).await.unwrap().is_none());
    }
}
