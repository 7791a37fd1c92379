use inkroom_core::storage::open_storage;
use inkroom_server::{ServerConfig, serve, state::AppState};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkroom_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env().inspect_err(|e| error!("bad configuration: {}", e))?;
    let storage = open_storage(&config.storage_url)
        .inspect_err(|e| error!(url = %config.storage_url, "cannot open storage: {}", e))?;

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("InkRoom relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:{}/ws/{{room}}", config.port);
    info!(storage = %config.storage_url, default_room = %config.default_room, "relay configured");

    serve(listener, AppState::from_config(&config, storage)).await?;
    Ok(())
}
