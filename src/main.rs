//! Local demo server for the session store.
//!
//! `SESSION_BACKEND=dynamodb` provisions and uses a DynamoDB table (set
//! `SESSION_ENDPOINT` to point at DynamoDB Local); anything else keeps
//! sessions in memory.

use std::env;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

use dynamo_session_store::config::Config;
use dynamo_session_store::session::AnyBackend;
use dynamo_session_store::session::dynamodb::DynamoDbBackend;
use dynamo_session_store::session::memory::InMemoryBackend;
use dynamo_session_store::session::store::SessionStore;
use dynamo_session_store::{AppState, create_app};

#[tokio::main]
async fn main() {
    // Load .env for local dev
    let _ = dotenvy::dotenv();

    // Init tracing: JSON when asked for, pretty otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        fmt().json().with_env_filter(filter).init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    let config = Config::from_env().expect("Failed to load configuration");
    let key_pairs = config
        .key_pairs()
        .expect("Failed to load session keys");

    let backend = if config.session_backend == "dynamodb" {
        tracing::info!(
            "Using DynamoDB session backend (table: {})",
            config.store.table
        );
        let backend = DynamoDbBackend::connect(&config.store)
            .await
            .expect("Failed to provision DynamoDB session table");
        AnyBackend::DynamoDb(backend)
    } else {
        tracing::info!("Using in-memory session backend");
        AnyBackend::Memory(InMemoryBackend::new())
    };

    let mut store = SessionStore::with_backend(backend, &config.store, &key_pairs)
        .expect("Failed to build session store");
    store.options_mut().secure = config.session_https_only;
    store.options_mut().domain = config.cookie_domain.clone();

    let state = Arc::new(AppState {
        config: config.clone(),
        store: Arc::new(store),
    });

    let app = create_app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting local server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
