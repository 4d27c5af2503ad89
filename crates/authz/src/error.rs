use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthzError>;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AuthzError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthzError::ValidationError(err.to_string())
    }
}
