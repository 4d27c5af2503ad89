use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curio_auth::CredentialStore;
use curio_models::{BackupCode, TotpCredential};
use sqlx::PgPool;
use uuid::Uuid;

/// TOTP credentials (`totp_credentials`) and backup codes (`mfa_backup_codes`).
pub struct CredentialRepository {
    pool: PgPool,
}

impl CredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: Uuid) -> Result<Option<TotpCredential>> {
        let credential = sqlx::query_as::<_, TotpCredential>(
            "SELECT * FROM totp_credentials WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(credential)
    }

    pub async fn upsert(&self, credential: &TotpCredential) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO totp_credentials (user_id, secret, enabled, created_at, confirmed_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                secret = EXCLUDED.secret,
                enabled = EXCLUDED.enabled,
                created_at = EXCLUDED.created_at,
                confirmed_at = EXCLUDED.confirmed_at,
                last_used_at = EXCLUDED.last_used_at
            "#,
        )
        .bind(credential.user_id)
        .bind(&credential.secret)
        .bind(credential.enabled)
        .bind(credential.created_at)
        .bind(credential.confirmed_at)
        .bind(credential.last_used_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn enable(&self, user_id: Uuid, confirmed_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE totp_credentials SET enabled = TRUE, confirmed_at = $2 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(confirmed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn touch(&self, user_id: Uuid, used_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE totp_credentials SET last_used_at = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(used_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete the credential and all backup codes in one transaction.
    pub async fn delete(&self, user_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM mfa_backup_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM totp_credentials WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn replace_backup_codes(&self, user_id: Uuid, code_hashes: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM mfa_backup_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for code_hash in code_hashes {
            sqlx::query("INSERT INTO mfa_backup_codes (id, user_id, code_hash) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(code_hash)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn unused_backup_codes(&self, user_id: Uuid) -> Result<Vec<BackupCode>> {
        let codes = sqlx::query_as::<_, BackupCode>(
            "SELECT * FROM mfa_backup_codes WHERE user_id = $1 AND used_at IS NULL ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(codes)
    }

    /// Conditional update; only the first caller for a given code sees a row change.
    pub async fn mark_backup_code_used(
        &self,
        user_id: Uuid,
        code_id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE mfa_backup_codes SET used_at = $3 WHERE id = $1 AND user_id = $2 AND used_at IS NULL",
        )
        .bind(code_id)
        .bind(user_id)
        .bind(used_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CredentialStore for CredentialRepository {
    async fn find_credential(&self, user_id: Uuid) -> curio_auth::Result<Option<TotpCredential>> {
        Ok(self.find(user_id).await?)
    }

    async fn save_credential(&self, credential: &TotpCredential) -> curio_auth::Result<()> {
        Ok(self.upsert(credential).await?)
    }

    async fn enable_credential(
        &self,
        user_id: Uuid,
        confirmed_at: DateTime<Utc>,
    ) -> curio_auth::Result<()> {
        Ok(self.enable(user_id, confirmed_at).await?)
    }

    async fn touch_credential(&self, user_id: Uuid, used_at: DateTime<Utc>) -> curio_auth::Result<()> {
        Ok(self.touch(user_id, used_at).await?)
    }

    async fn delete_credential(&self, user_id: Uuid) -> curio_auth::Result<()> {
        Ok(self.delete(user_id).await?)
    }

    async fn replace_backup_codes(
        &self,
        user_id: Uuid,
        code_hashes: &[String],
    ) -> curio_auth::Result<()> {
        Ok(CredentialRepository::replace_backup_codes(self, user_id, code_hashes).await?)
    }

    async fn unused_backup_codes(&self, user_id: Uuid) -> curio_auth::Result<Vec<BackupCode>> {
        Ok(CredentialRepository::unused_backup_codes(self, user_id).await?)
    }

    async fn mark_backup_code_used(
        &self,
        user_id: Uuid,
        code_id: Uuid,
        used_at: DateTime<Utc>,
    ) -> curio_auth::Result<bool> {
        Ok(CredentialRepository::mark_backup_code_used(self, user_id, code_id, used_at).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Database, DatabaseConfig};
    use crate::repositories::users::UserRepository;
    use curio_models::NewUser;

    async fn setup() -> (Database, Uuid) {
        let db = Database::new(DatabaseConfig {
            apply_schema: true,
            ..DatabaseConfig::from_env()
        })
            .await
            .expect("Failed to connect to database");
        let user = UserRepository::new(db.pool().clone())
            .create(
                &NewUser {
                    email: format!("{}@example.com", Uuid::new_v4()),
                    password: String::new(),
                    name: None,
                },
                "hash",
            )
            .await
            .unwrap();
        (db, user.id)
    }

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_backup_code_marked_once_under_concurrency() {
        let (db, user_id) = setup().await;
        let repo = std::sync::Arc::new(CredentialRepository::new(db.pool().clone()));

        repo.upsert(&TotpCredential::pending(user_id, "JBSWY3DPEHPK3PXP".to_string()))
            .await
            .unwrap();
        repo.replace_backup_codes(user_id, &["hash-a".to_string()])
            .await
            .unwrap();
        let code_id = repo.unused_backup_codes(user_id).await.unwrap()[0].id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.mark_backup_code_used(user_id, code_id, Utc::now())
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(repo.unused_backup_codes(user_id).await.unwrap().is_empty());

        repo.delete(user_id).await.unwrap();
        assert!(repo.find(user_id).await.unwrap().is_none());
    }
}
