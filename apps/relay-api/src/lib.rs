pub mod builds;
pub mod config;
pub mod error;
pub mod hub;
pub mod routes;

use std::sync::Arc;

use builds::BuildStore;
use config::Config;
use hub::RoomMap;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BuildStore>,
    pub rooms: Arc<RoomMap>,
    pub config: Arc<Config>,
}
