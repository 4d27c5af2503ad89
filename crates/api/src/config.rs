use anyhow::Context;
use curio_auth::AuthConfig;
use curio_authz::DEFAULT_ROLE;
use curio_database::DatabaseConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub default_role: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database: DatabaseConfig::from_env(),
            auth: AuthConfig::from_env(),
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_expiration_hours: std::env::var("JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            default_role: std::env::var("DEFAULT_ROLE")
                .unwrap_or_else(|_| DEFAULT_ROLE.to_string()),
        })
    }
}
