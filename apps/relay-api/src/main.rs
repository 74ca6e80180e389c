use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_api::builds::fetcher::HttpFetcher;
use relay_api::builds::store::JsonFileStore;
use relay_api::builds::{BuildFetcher, BuildStore};
use relay_api::config::Config;
use relay_api::hub::RoomMap;
use relay_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let store: Arc<dyn BuildStore> = Arc::new(JsonFileStore::new(&config.builds_path));
    let fetcher: Arc<dyn BuildFetcher> = Arc::new(HttpFetcher::new(&config.upstream_url));
    let rooms = Arc::new(RoomMap::new(
        store.clone(),
        fetcher,
        config.poll_interval,
    ));

    tracing::info!(
        upstream = %config.upstream_url,
        builds_path = %config.builds_path,
        poll_interval_secs = config.poll_interval.as_secs(),
        "relay-api configured"
    );

    let state = AppState {
        store,
        rooms,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = relay_api::routes::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "relay-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
