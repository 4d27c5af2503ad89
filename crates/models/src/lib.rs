pub mod login;
pub mod mfa;
pub mod role;
pub mod session;
pub mod user;

// Re-export commonly used types
pub use login::{LoginAttempt, LoginStage};
pub use mfa::{BackupCode, MfaStatus, TotpCredential};
pub use role::{NewRole, Permission, Role, UserRole};
pub use session::IssuedSession;
pub use user::{NewUser, User, UserProfile};
