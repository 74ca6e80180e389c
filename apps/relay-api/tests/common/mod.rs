use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use relay_api::builds::store::MemoryStore;
use relay_api::builds::{BuildFetcher, BuildRecord, BuildStore};
use relay_api::config::Config;
use relay_api::error::FetchError;
use relay_api::hub::RoomMap;
use relay_api::AppState;

/// Fetcher driven by a queue of scripted responses. An empty queue behaves
/// like an unreachable upstream.
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<BuildRecord, FetchError>>>,
}

impl ScriptedFetcher {
    pub fn new(responses: Vec<Result<BuildRecord, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn unreachable() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl BuildFetcher for ScriptedFetcher {
    async fn fetch_candidate(&self) -> Result<BuildRecord, FetchError> {
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(FetchError::Parse("build hash")))
    }
}

/// Start a real TCP server for WebSocket testing. Returns the bound address
/// and the state so tests can inspect rooms and the store directly.
pub async fn start_server(fetcher: Arc<dyn BuildFetcher>) -> (SocketAddr, AppState) {
    let store: Arc<dyn BuildStore> = Arc::new(MemoryStore::new());
    let config = Config {
        port: 0,
        upstream_url: "http://127.0.0.1:9/app".to_string(),
        builds_path: "unused.json".to_string(),
        poll_interval: Duration::from_secs(60),
    };
    let rooms = Arc::new(RoomMap::new(store.clone(), fetcher, config.poll_interval));

    let state = AppState {
        store,
        rooms,
        config: Arc::new(config),
    };

    let app = relay_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}
