use mimalloc::MiMalloc;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use backend_api::config::{Config, DEFAULT_LOG_FILTER};
use backend_api::db::PgConnector;
use backend_api::secrets::SecretManagerResolver;
use backend_api::{AppError, server, startup};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "backend-api terminated");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let cfg = Config::from_env()?;
    info!(
        db_user = %cfg.db_user,
        db_name = %cfg.db_name,
        secret = %cfg.db_secret_id,
        db_target = ?cfg.target,
        port = cfg.port,
        "configuration loaded"
    );

    let tokens = startup::token_source(&cfg)?;
    let secrets = SecretManagerResolver::new(cfg.secret_manager_endpoint.clone(), tokens.clone());
    let connector = PgConnector::new(tokens, cfg.sqladmin_endpoint.clone(), cfg.acquire_timeout);
    let probe = startup::bootstrap(&cfg, &secrets, &connector).await?;

    let addr = cfg.listen_addr();
    let listener = startup::bind(addr).await?;
    info!("backend-api listening on {}", addr);
    server::serve(listener, probe, server::shutdown_signal()).await
}
