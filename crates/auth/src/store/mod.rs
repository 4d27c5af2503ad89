//! Persistence seams used by the auth services.
//!
//! The services only see these traits. `curio-database` provides the Postgres
//! implementations and [`InMemoryStore`] backs tests and local development.

mod memory;

pub use memory::InMemoryStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curio_models::{BackupCode, LoginAttempt, NewUser, TotpCredential, User};
use uuid::Uuid;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Lookup by normalized (trimmed, lower-cased) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Fails with `AlreadyExists` when the email is taken.
    async fn create_user(&self, new_user: &NewUser, password_hash: &str) -> Result<User>;

    async fn update_last_login(&self, id: Uuid) -> Result<()>;
}

/// Storage for a user's TOTP credential and backup codes.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_credential(&self, user_id: Uuid) -> Result<Option<TotpCredential>>;

    /// Insert the credential, replacing any existing one for the same user.
    async fn save_credential(&self, credential: &TotpCredential) -> Result<()>;

    async fn enable_credential(&self, user_id: Uuid, confirmed_at: DateTime<Utc>) -> Result<()>;

    async fn touch_credential(&self, user_id: Uuid, used_at: DateTime<Utc>) -> Result<()>;

    /// Remove the credential together with every backup code of the user.
    async fn delete_credential(&self, user_id: Uuid) -> Result<()>;

    /// Replace the whole backup-code set with freshly hashed codes.
    async fn replace_backup_codes(&self, user_id: Uuid, code_hashes: &[String]) -> Result<()>;

    async fn unused_backup_codes(&self, user_id: Uuid) -> Result<Vec<BackupCode>>;

    /// Mark a code used if and only if it is still unused.
    ///
    /// Must be a single atomic check-and-set: of several concurrent calls for
    /// the same code exactly one returns `true`.
    async fn mark_backup_code_used(
        &self,
        user_id: Uuid,
        code_id: Uuid,
        used_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Pending login attempts carried between the password and second-factor requests.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn save_attempt(&self, attempt: &LoginAttempt) -> Result<()>;

    /// Remove and return the attempt in one atomic step.
    ///
    /// The caller owns the attempt until it saves it back, so of several
    /// concurrent submissions for one challenge only one gets to check a code.
    async fn take_attempt(&self, id: Uuid) -> Result<Option<LoginAttempt>>;
}
