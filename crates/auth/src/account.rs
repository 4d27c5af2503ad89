use crate::error::{AuthError, Result};
use crate::password::PasswordHasher;
use crate::store::UserStore;
use curio_models::{NewUser, User};
use std::sync::Arc;
use validator::Validate;

/// Account creation.
///
/// Registration only creates the user. Role assignment is a separate step the
/// caller runs afterwards.
pub struct AccountService {
    users: Arc<dyn UserStore>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn register(&self, request: NewUser) -> Result<User> {
        request.validate()?;

        let new_user = NewUser {
            email: request.email.trim().to_lowercase(),
            ..request
        };

        if self.users.find_user_by_email(&new_user.email).await?.is_some() {
            return Err(AuthError::AlreadyExists(format!(
                "User with email {} already exists",
                new_user.email
            )));
        }

        let password_hash = PasswordHasher::hash(&new_user.password)?;
        let user = self.users.create_user(&new_user, &password_hash).await?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(user)
    }
}
