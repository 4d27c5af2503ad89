use crate::error::{AuthError, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng};
use std::collections::HashSet;

pub const DEFAULT_BACKUP_CODE_COUNT: usize = 10;
pub(crate) const CODE_LENGTH: usize = 8;

// No 0, O, 1, I
const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate `count` unique backup recovery codes formatted `XXXX-XXXX`.
///
/// Returns plaintext codes that should be shown to the user once.
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    let mut rng = OsRng;
    let mut seen = HashSet::with_capacity(count);
    let mut codes = Vec::with_capacity(count);

    while codes.len() < count {
        let code: String = (0..CODE_LENGTH)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();

        if seen.insert(code.clone()) {
            codes.push(format!("{}-{}", &code[..4], &code[4..]));
        }
    }

    codes
}

/// Canonical form used for hashing: no separators, upper case.
pub fn normalize_backup_code(code: &str) -> String {
    code.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Hash a backup code for storage (Argon2 with salt).
pub fn hash_backup_code(code: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(normalize_backup_code(code).as_bytes(), &salt)
        .map_err(AuthError::from)?;

    Ok(password_hash.to_string())
}

/// Verify a backup code against its hash.
pub fn verify_backup_code(code: &str, hash: &str) -> Result<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AuthError::PasswordHashError(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(normalize_backup_code(code).as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_backup_codes() {
        let codes = generate_backup_codes(DEFAULT_BACKUP_CODE_COUNT);
        assert_eq!(codes.len(), DEFAULT_BACKUP_CODE_COUNT);

        for code in &codes {
            // Format: XXXX-XXXX
            assert_eq!(code.len(), 9);
            assert_eq!(code.chars().nth(4), Some('-'));
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
        }
    }

    #[test]
    fn test_generated_codes_are_unique() {
        let codes = generate_backup_codes(200);
        let unique: HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), 200);
    }

    #[test]
    fn test_custom_count() {
        assert_eq!(generate_backup_codes(8).len(), 8);
        assert!(generate_backup_codes(0).is_empty());
    }

    #[test]
    fn test_hash_and_verify_backup_code() {
        let code = "ABCD-EFGH";
        let hash = hash_backup_code(code).unwrap();

        assert!(verify_backup_code(code, &hash).unwrap());
        assert!(!verify_backup_code("ABCD-EFGJ", &hash).unwrap());
    }

    #[test]
    fn test_code_normalization() {
        let hash = hash_backup_code("ABCD-EFGH").unwrap();

        assert!(verify_backup_code("ABCDEFGH", &hash).unwrap());
        assert!(verify_backup_code("abcd-efgh", &hash).unwrap());
        assert!(verify_backup_code(" abcd efgh ", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(verify_backup_code("ABCD-EFGH", "not-a-hash").is_err());
    }
}
