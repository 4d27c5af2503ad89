pub mod account;
pub mod config;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod mfa;
pub mod password;
pub mod store;

pub use account::AccountService;
pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use gate::{LoginGate, LoginGateConfig, SessionIssuer};
pub use jwt::{Claims, JwtService, TokenType};
pub use mfa::{
    generate_backup_codes, generate_qr_code, MfaService, TotpConfig, TotpEngine, TotpEnrollment,
    TotpSecret,
};
pub use password::PasswordHasher;
pub use store::{ChallengeStore, CredentialStore, InMemoryStore, UserStore};
