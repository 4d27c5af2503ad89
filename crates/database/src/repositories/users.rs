use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use curio_auth::UserStore;
use curio_models::{NewUser, User};
use sqlx::PgPool;
use uuid::Uuid;

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, new_user: &NewUser, password_hash: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("User", "email"),
            other => other,
        })?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("User", &id.to_string()))?;

        Ok(user)
    }

    /// Find user by (already normalized) email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn update_last_login(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("User", &id.to_string()));
        }

        Ok(())
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_user_by_email(&self, email: &str) -> curio_auth::Result<Option<User>> {
        Ok(self.find_by_email(email).await?)
    }

    async fn find_user_by_id(&self, id: Uuid) -> curio_auth::Result<Option<User>> {
        match self.find_by_id(id).await {
            Ok(user) => Ok(Some(user)),
            Err(DatabaseError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_user(&self, new_user: &NewUser, password_hash: &str) -> curio_auth::Result<User> {
        Ok(self.create(new_user, password_hash).await?)
    }

    async fn update_last_login(&self, id: Uuid) -> curio_auth::Result<()> {
        Ok(UserRepository::update_last_login(self, id).await?)
    }
}
