pub mod challenges;
pub mod credentials;
pub mod roles;
pub mod users;
