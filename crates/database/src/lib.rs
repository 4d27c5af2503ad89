pub mod connection;
pub mod error;
pub mod repositories;

pub use connection::{Database, DatabaseConfig, SCHEMA};
pub use error::{DatabaseError, Result};
pub use repositories::{
    challenges::ChallengeRepository, credentials::CredentialRepository, roles::RoleRepository,
    users::UserRepository,
};
