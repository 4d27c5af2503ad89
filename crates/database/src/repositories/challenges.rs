use crate::error::Result;
use async_trait::async_trait;
use curio_auth::ChallengeStore;
use curio_models::LoginAttempt;
use sqlx::PgPool;
use uuid::Uuid;

/// Login attempts waiting for their second factor, in `login_challenges`.
pub struct ChallengeRepository {
    pool: PgPool,
}

impl ChallengeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, attempt: &LoginAttempt) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO login_challenges (id, stage, user_id, expires_at, failed_second_factor_attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                stage = EXCLUDED.stage,
                user_id = EXCLUDED.user_id,
                expires_at = EXCLUDED.expires_at,
                failed_second_factor_attempts = EXCLUDED.failed_second_factor_attempts
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.stage)
        .bind(attempt.user_id)
        .bind(attempt.expires_at)
        .bind(attempt.failed_second_factor_attempts)
        .bind(attempt.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete and return the challenge. Concurrent callers race on the
    /// row lock and only one of them receives it.
    pub async fn take(&self, id: Uuid) -> Result<Option<LoginAttempt>> {
        let attempt = sqlx::query_as::<_, LoginAttempt>(
            "DELETE FROM login_challenges WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    /// Remove challenges whose window has closed. Returns the number removed.
    pub async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM login_challenges WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ChallengeStore for ChallengeRepository {
    async fn save_attempt(&self, attempt: &LoginAttempt) -> curio_auth::Result<()> {
        Ok(self.upsert(attempt).await?)
    }

    async fn take_attempt(&self, id: Uuid) -> curio_auth::Result<Option<LoginAttempt>> {
        Ok(self.take(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Database, DatabaseConfig};
    use std::sync::Arc;

    #[tokio::test]
    #[ignore] // Only run with database available
    async fn test_take_has_single_owner() {
        let db = Database::new(DatabaseConfig {
            apply_schema: true,
            ..DatabaseConfig::from_env()
        })
            .await
            .expect("Failed to connect to database");
        let repo = Arc::new(ChallengeRepository::new(db.pool().clone()));

        let attempt = LoginAttempt::new();
        repo.upsert(&attempt).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            let id = attempt.id;
            handles.push(tokio::spawn(async move { repo.take(id).await.unwrap() }));
        }

        let mut owners = 0;
        for handle in handles {
            if let Some(taken) = handle.await.unwrap() {
                assert_eq!(taken.stage, attempt.stage);
                owners += 1;
            }
        }
        assert_eq!(owners, 1);
    }
}
