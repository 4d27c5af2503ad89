// Curio API Server
// Login with an optional TOTP second factor, plus MFA self-service

mod config;
mod handlers;
mod middleware;
mod routes;

use config::Config;
use curio_auth::{
    AccountService, ChallengeStore, CredentialStore, JwtService, LoginGate, MfaService,
    TotpEngine, UserStore,
};
use curio_authz::{AuthzStore, RoleService};
use curio_database::{
    ChallengeRepository, CredentialRepository, Database, RoleRepository, UserRepository,
};
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

pub struct AppState {
    pub accounts: AccountService,
    pub roles: RoleService,
    pub mfa: Arc<MfaService>,
    pub gate: LoginGate,
    pub challenges: Arc<dyn ChallengeStore>,
    pub jwt: Arc<JwtService>,
}

/// Storage backends the services are wired to.
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub challenges: Arc<dyn ChallengeStore>,
    pub authz: Arc<dyn AuthzStore>,
}

impl AppState {
    pub fn new(config: &Config, stores: Stores) -> Self {
        let jwt = Arc::new(JwtService::new(&config.jwt_secret, config.jwt_expiration_hours));
        let mfa = Arc::new(MfaService::new(
            TotpEngine::new(config.auth.totp.clone()),
            stores.credentials,
            config.auth.backup_code_count,
        ));
        let gate = LoginGate::new(
            stores.users.clone(),
            mfa.clone(),
            jwt.clone(),
            config.auth.gate.clone(),
        );

        Self {
            accounts: AccountService::new(stores.users),
            roles: RoleService::new(stores.authz, config.default_role.clone()),
            mfa,
            gate,
            challenges: stores.challenges,
            jwt,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,curio_api=debug,tower_http=debug")),
        )
        .init();

    tracing::info!("Starting Curio API Server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    tracing::info!("Server: {}:{}", config.server_host, config.server_port);

    // Initialize database
    let database = Database::new(config.database.clone()).await?;
    database.ping().await?;
    tracing::info!("Database connected");

    let pool = database.pool().clone();
    let challenge_repository = Arc::new(ChallengeRepository::new(pool.clone()));

    let state = Arc::new(AppState::new(
        &config,
        Stores {
            users: Arc::new(UserRepository::new(pool.clone())),
            credentials: Arc::new(CredentialRepository::new(pool.clone())),
            challenges: challenge_repository.clone(),
            authz: Arc::new(RoleRepository::new(pool)),
        },
    ));

    let default_role = state.roles.ensure_default_role().await?;
    tracing::info!("Default role: {}", default_role.name);

    // Expired login challenges are never resumed
    let cleanup_interval = config
        .auth
        .gate
        .challenge_ttl
        .to_std()
        .unwrap_or(Duration::from_secs(300));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        loop {
            ticker.tick().await;
            match challenge_repository.delete_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Expired login challenges removed"),
                Err(e) => tracing::warn!("Login challenge cleanup failed: {}", e),
            }
        }
    });

    // Create router
    let app = routes::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server ready at http://{}", addr);

    axum::serve(listener, app).await?;

    database.close().await;
    Ok(())
}
