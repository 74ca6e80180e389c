//! One stateful room: connection set, broadcast handling, and the shared
//! build-check timer.
//!
//! All registry mutation, fan-out target selection, and supervisor
//! transitions happen under a single mutex, which is never held across an
//! await. Delivery goes through each connection's unbounded outbound queue,
//! so fan-out under the lock never blocks on a slow peer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;

use crate::builds::{BuildFetcher, BuildRecord, BuildStore};

use super::events::{ClientEvent, ServerEvent};
use super::registry::{Connection, ConnectionRegistry, Role, ANONYMOUS};
use super::supervisor::PollSupervisor;

struct RoomInner {
    registry: ConnectionRegistry,
    supervisor: PollSupervisor,
}

/// A single addressable room instance.
pub struct Room {
    name: String,
    store: Arc<dyn BuildStore>,
    fetcher: Arc<dyn BuildFetcher>,
    poll_interval: Duration,
    inner: Mutex<RoomInner>,
}

impl Room {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn BuildStore>,
        fetcher: Arc<dyn BuildFetcher>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            fetcher,
            poll_interval,
            inner: Mutex::new(RoomInner {
                registry: ConnectionRegistry::new(),
                supervisor: PollSupervisor::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Admit a connection. Registration and the poll-timer check-and-set
    /// happen atomically; the subscriber's immediate build refresh runs
    /// afterwards and is best-effort.
    pub async fn join(
        self: &Arc<Self>,
        role: Role,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> String {
        let id = relay_common::id::prefixed_ulid(relay_common::id::prefix::CONNECTION);

        {
            let mut inner = self.inner.lock();
            inner.registry.add(Connection {
                id: id.clone(),
                display_name: None,
                role,
                tx: tx.clone(),
            });
            if role == Role::Subscriber {
                let room = self.clone();
                inner
                    .supervisor
                    .ensure_started(move || spawn_poll_task(room));
            }
        }

        tracing::info!(room = %self.name, connection = %id, ?role, "connection admitted");

        if role == Role::Subscriber {
            if let Some(record) = self.refresh_build().await {
                if tx.send(ServerEvent::Build { data: record }).is_err() {
                    tracing::debug!(connection = %id, "connection gone before build send");
                }
            }
        }

        id
    }

    /// Remove a connection and stop the timer if no subscriber remains.
    /// Close and error paths both land here; calling it twice is harmless.
    pub fn leave(&self, id: &str) {
        let mut inner = self.inner.lock();
        inner.registry.remove(id);
        let interested = inner.registry.subscriber_count();
        inner.supervisor.stop_if_unneeded(interested);
        drop(inner);
        tracing::info!(room = %self.name, connection = %id, "connection removed");
    }

    /// Interpret one inbound text frame. Malformed frames and unknown tags
    /// are dropped; they never affect other connections.
    pub fn handle_frame(&self, id: &str, text: &str) {
        let event: ClientEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(room = %self.name, connection = %id, %e, "dropping malformed frame");
                return;
            }
        };

        match event {
            ClientEvent::Message { data } => {
                let inner = self.inner.lock();
                let name = inner
                    .registry
                    .find(id)
                    .map(|c| c.display_name().to_string())
                    .unwrap_or_else(|| ANONYMOUS.to_string());
                broadcast(&inner.registry, ServerEvent::Message { name, data });
            }
            ClientEvent::ChangeName { data } => {
                let mut inner = self.inner.lock();
                inner.registry.set_name(id, data);
                let roster = inner.registry.names();
                broadcast(&inner.registry, ServerEvent::List { data: roster });
            }
        }
    }

    /// One fetch → dedup-append round-trip. Falls back to the stored latest
    /// when the upstream is unreachable; `None` means nothing to send.
    async fn refresh_build(&self) -> Option<BuildRecord> {
        let candidate = match self.fetcher.fetch_candidate().await {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(room = %self.name, %e, "build refresh failed, using stored latest");
                return match self.store.get_latest().await {
                    Ok(latest) => latest,
                    Err(e) => {
                        tracing::error!(room = %self.name, %e, "build store unavailable");
                        None
                    }
                };
            }
        };

        match self.store.append_if_absent(candidate).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                tracing::error!(room = %self.name, %e, "failed to persist build record");
                None
            }
        }
    }

    /// One execution of the periodic build check. Any failure logs and
    /// skips the cycle; the timer keeps running.
    pub async fn poll_once(&self) {
        let history = match self.store.get_all().await {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(room = %self.name, %e, "poll skipped: store read failed");
                return;
            }
        };

        let candidate = match self.fetcher.fetch_candidate().await {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!(room = %self.name, %e, "poll skipped: fetch failed");
                return;
            }
        };

        if history.iter().any(|b| b.hash == candidate.hash) {
            return;
        }

        let stored = match self.store.append_if_absent(candidate).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(room = %self.name, %e, "poll skipped: store append failed");
                return;
            }
        };

        tracing::info!(room = %self.name, hash = %stored.hash, sequence = %stored.sequence_id, "new build observed");

        let inner = self.inner.lock();
        for conn in inner.registry.all().filter(|c| c.role == Role::Subscriber) {
            if conn
                .tx
                .send(ServerEvent::NewBuild {
                    data: stored.clone(),
                })
                .is_err()
            {
                tracing::debug!(connection = %conn.id, "subscriber gone during build fan-out");
            }
        }
    }

    /// Whether the poll timer is currently running (for tests and health).
    pub fn is_polling(&self) -> bool {
        self.inner.lock().supervisor.is_active()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().registry.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().registry.subscriber_count()
    }
}

/// Deliver an event to every connection. A dead peer's queue just reports
/// closed; its own read loop handles cleanup.
fn broadcast(registry: &ConnectionRegistry, event: ServerEvent) {
    for conn in registry.all() {
        if conn.tx.send(event.clone()).is_err() {
            tracing::debug!(connection = %conn.id, "peer gone during broadcast");
        }
    }
}

fn spawn_poll_task(room: Arc<Room>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = time::interval(room.poll_interval);
        // First tick fires immediately; admission already did that check.
        timer.tick().await;
        loop {
            timer.tick().await;
            room.poll_once().await;
        }
    })
}
