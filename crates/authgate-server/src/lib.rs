//! # authgate-server
//!
//! HTTP authentication server: credential login, access/refresh token pairs,
//! rotation, revocation, and login rate limiting, backed by a shared Redis
//! key-value store with graceful degradation to an in-process store.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use authgate_auth::{AuthError, RevocationStore, TokenCodec, TokenService};
use authgate_cache::{Cache, KeyValueStore, MemoryStore, RateLimiter, RedisStore};

pub use config::{AppConfig, RateLimitConfig, RedisConfig, ServerConfig, load_config};
pub use state::AppState;
pub use user::{MemoryUserStore, UserRecord, UserStore};

/// Creates the shared key-value store from configuration.
///
/// - Redis disabled: in-process store (single-instance deployments).
/// - Redis enabled: connect and verify with a PING; if the pool cannot be
///   built or the PING fails, fall back to the in-process store so the
///   server still starts. Revocation and rate limiting then degrade to
///   per-instance scope, which the log calls out.
pub async fn create_store(config: &RedisConfig) -> Arc<dyn KeyValueStore> {
    if !config.enabled {
        tracing::info!("Redis disabled, using in-process store");
        return Arc::new(MemoryStore::new());
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    if let Some(ref mut pool_config) = redis_config.pool {
        pool_config.max_size = config.pool_size;
        pool_config.timeouts.wait = Some(Duration::from_millis(config.timeout_ms));
        pool_config.timeouts.create = Some(Duration::from_millis(config.timeout_ms));
        pool_config.timeouts.recycle = Some(Duration::from_millis(config.timeout_ms));
    }

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e,
                "failed to create Redis pool, falling back to in-process store; \
                 revocation and rate limits will not be shared across instances");
            return Arc::new(MemoryStore::new());
        }
    };

    let store = RedisStore::new(pool, config.prefix.as_str());
    match store.ping().await {
        Ok(()) => {
            tracing::info!("connected to Redis");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e,
                "failed to reach Redis, falling back to in-process store; \
                 revocation and rate limits will not be shared across instances");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Builds the application state from configuration and injected stores.
///
/// # Errors
///
/// Returns [`AuthError::Configuration`] when the token configuration cannot
/// sign tokens. Callers must treat this as fatal.
pub fn build_state(
    config: &AppConfig,
    store: Arc<dyn KeyValueStore>,
    users: Arc<dyn UserStore>,
) -> Result<AppState, AuthError> {
    let codec = Arc::new(TokenCodec::new(&config.auth)?);
    let tokens = Arc::new(TokenService::new(
        codec,
        RevocationStore::new(store.clone()),
    ));

    Ok(AppState {
        tokens,
        cache: Cache::new(store.clone()),
        rate_limiter: RateLimiter::new(store),
        rate_limit: config.rate_limit.clone(),
        users,
    })
}

/// Builds the router. Login is behind the rate limiter; every token
/// endpoint shares the same state.
pub fn build_router(state: AppState) -> Router {
    let login = Router::new()
        .route("/auth/login", post(handlers::login))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::login_rate_limit,
        ));

    Router::new()
        .merge(login)
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/logout-all", post(handlers::logout_all))
        .route("/auth/me", get(handlers::me))
        .route("/healthz", get(handlers::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
