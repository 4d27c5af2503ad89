pub mod auth;
pub mod health;
pub mod mfa;

// Re-export common types
pub use auth::ErrorResponse;
