use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use replicate_gateway::{
    api::{self, auth::ApiKey, AppState, GatewaySettings},
    config::Config,
    ratelimit::RedisCounterStore,
    AppResult, PredictionService, RateLimiter, ReplicateClient,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    // Load configuration
    Config::dotenv_load();
    let config = Config::new()?;
    config.log_summary();

    // Provider client and counter store live for the whole process
    let replicate = ReplicateClient::connect(
        config.replicate_api_url.clone(),
        config.replicate_api_token.clone(),
        &config.replicate_model,
        &config.replicate_model_version,
    )
    .await?;
    let store = RedisCounterStore::connect(&config.redis_url).await?;
    tracing::info!("Connected to counter store");

    let state = Arc::new(AppState {
        predictions: PredictionService::new(Arc::new(replicate)),
        limiter: RateLimiter::new(Arc::new(store)),
        api_key: ApiKey::new(config.api_access_key.as_str()),
        settings: GatewaySettings {
            model: config.replicate_model.clone(),
            version: config.replicate_model_version.clone(),
            trigger_word: config.trigger_word.clone(),
            require_trigger_word: config.require_trigger_word,
            list_max_results: config.list_max_results,
        },
    });
    let app = api::create_app(state);

    let socket_address = config.socket_address();
    tracing::info!("listening on {}", socket_address);
    let served = axum::Server::try_bind(&socket_address)?
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Dropping the router released the last handle on the counter store
    tracing::info!("Server stopped, counter store connection released");
    Ok(served?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
