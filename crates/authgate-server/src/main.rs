use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use authgate_server::{MemoryUserStore, build_router, build_state, create_store, load_config};

#[tokio::main]
async fn main() {
    // Load .env if present, for local development. A missing file is fine.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: failed to load .env file: {e}");
        }
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("AUTHGATE_CONFIG").ok();
    let config = match load_config(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            // Unusable configuration (e.g. missing token secrets) is fatal.
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let store = create_store(&config.redis).await;

    // TODO: replace with a database-backed user store once one lands; the
    // in-memory store only serves demos and tests.
    let users = Arc::new(MemoryUserStore::new());

    let state = match build_state(&config, store, users) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %addr, "authgate server listening");
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
