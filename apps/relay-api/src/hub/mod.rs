pub mod events;
pub mod registry;
pub mod room;
pub mod server;
pub mod supervisor;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::builds::{BuildFetcher, BuildStore};

use room::Room;

/// Room used when the upgrade request doesn't name one.
pub const DEFAULT_ROOM: &str = "main";

/// Per-name room instances. Rooms are created on first use and are fully
/// isolated from each other.
pub struct RoomMap {
    rooms: DashMap<String, Arc<Room>>,
    store: Arc<dyn BuildStore>,
    fetcher: Arc<dyn BuildFetcher>,
    poll_interval: Duration,
}

impl RoomMap {
    pub fn new(
        store: Arc<dyn BuildStore>,
        fetcher: Arc<dyn BuildFetcher>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            store,
            fetcher,
            poll_interval,
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<Room> {
        self.rooms
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(room = %name, "creating room");
                Arc::new(Room::new(
                    name,
                    self.store.clone(),
                    self.fetcher.clone(),
                    self.poll_interval,
                ))
            })
            .clone()
    }
}
