use serde::{Deserialize, Serialize};

/// Credentials handed to the client once a login attempt is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedSession {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl IssuedSession {
    pub fn bearer(access_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
