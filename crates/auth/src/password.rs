use crate::error::{AuthError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::OnceLock;

const MIN_PASSWORD_LENGTH: usize = 8;

pub struct PasswordHasher;

impl PasswordHasher {
    /// Hash a password using Argon2id
    pub fn hash(password: &str) -> Result<String> {
        Self::validate_password(password)?;
        Self::hash_unchecked(password)
    }

    /// Verify a password against a hash
    pub fn verify(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AuthError::PasswordHashError(e.to_string()))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::PasswordHashError(e.to_string())),
        }
    }

    /// Spend the same work as a real verification when there is no account to
    /// check against, so response time does not reveal whether an email exists.
    pub fn verify_dummy(password: &str) {
        static DUMMY_HASH: OnceLock<String> = OnceLock::new();
        let hash = DUMMY_HASH.get_or_init(|| Self::hash_unchecked("dummy-password").unwrap_or_default());
        let _ = Self::verify(password, hash);
    }

    /// Check if a password needs rehashing (algorithm params changed)
    pub fn needs_rehash(hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed_hash) => parsed_hash.algorithm != argon2::Algorithm::Argon2id.ident(),
            Err(_) => true,
        }
    }

    fn hash_unchecked(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::PasswordHashError(e.to_string()))?
            .to_string();

        Ok(password_hash)
    }

    fn validate_password(password: &str) -> Result<()> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        if !password.chars().any(|c| c.is_uppercase()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        if !password.chars().any(|c| c.is_lowercase()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one lowercase letter".to_string(),
            ));
        }

        if !password.chars().any(|c| c.is_numeric()) {
            return Err(AuthError::WeakPassword(
                "Password must contain at least one number".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let password = "MySecureP@ssw0rd";
        let hash = PasswordHasher::hash(password).expect("Failed to hash password");

        assert!(PasswordHasher::verify(password, &hash).unwrap());
        assert!(!PasswordHasher::verify("WrongPassword1!", &hash).unwrap());
        assert!(!PasswordHasher::needs_rehash(&hash));
    }

    #[test]
    fn test_password_validation() {
        assert!(PasswordHasher::hash("Short1!").is_err());
        assert!(PasswordHasher::hash("nouppercase1!").is_err());
        assert!(PasswordHasher::hash("NOLOWERCASE1!").is_err());
        assert!(PasswordHasher::hash("NoNumbers!").is_err());
        assert!(PasswordHasher::hash("ValidP@ssw0rd").is_ok());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(PasswordHasher::verify("ValidP@ssw0rd", "plaintext").is_err());
        assert!(PasswordHasher::needs_rehash("plaintext"));
    }
}
