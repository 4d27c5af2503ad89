use curio_auth::AuthError;
use curio_authz::AuthzError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(sqlx::Error),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Database error: {0}")]
    Other(String),
}

impl DatabaseError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} with id {} not found", entity, id))
    }

    pub fn duplicate(entity: &str, field: &str) -> Self {
        Self::DuplicateEntry(format!("{} with {} already exists", entity, field))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return DatabaseError::DuplicateEntry(db.message().to_string());
            }
            if db.is_foreign_key_violation() {
                return DatabaseError::ConstraintViolation(db.message().to_string());
            }
        }

        DatabaseError::ConnectionError(err)
    }
}

impl From<DatabaseError> for AuthError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => AuthError::NotFound(msg),
            DatabaseError::DuplicateEntry(msg) => AuthError::AlreadyExists(msg),
            other => AuthError::Database(other.to_string()),
        }
    }
}

impl From<DatabaseError> for AuthzError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => AuthzError::NotFound(msg),
            DatabaseError::DuplicateEntry(msg) => AuthzError::AlreadyExists(msg),
            DatabaseError::ConstraintViolation(msg) => AuthzError::NotFound(msg),
            other => AuthzError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_auth_not_found() {
        let err: AuthError = DatabaseError::not_found("User", "42").into();
        assert!(matches!(err, AuthError::NotFound(msg) if msg.contains("42")));
    }

    #[test]
    fn test_duplicate_maps_to_already_exists() {
        let err: AuthError = DatabaseError::duplicate("User", "email").into();
        assert!(matches!(err, AuthError::AlreadyExists(_)));

        let err: AuthzError = DatabaseError::duplicate("Role", "name").into();
        assert!(matches!(err, AuthzError::AlreadyExists(_)));
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err: AuthError = DatabaseError::from(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, AuthError::Database(_)));
    }
}
