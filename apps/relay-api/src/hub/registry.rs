//! In-memory set of live connections for one room.

use tokio::sync::mpsc;

use super::events::ServerEvent;

/// Fallback display name used at broadcast time.
pub const ANONYMOUS: &str = "Anonymous";

/// Declared role of a connection, fixed at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Interested in build-change notifications; keeps the poll timer alive.
    Subscriber,
    /// Participates only in chat-style broadcast.
    Peer,
}

impl Role {
    /// Parse the role selector from the upgrade request. Anything other than
    /// the two recognized values is an admission error.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "subscriber" => Some(Role::Subscriber),
            "peer" => Some(Role::Peer),
            _ => None,
        }
    }
}

/// One live connection: identity, optional display name, role, and the
/// outbound queue drained by its writer task.
pub struct Connection {
    pub id: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub tx: mpsc::UnboundedSender<ServerEvent>,
}

impl Connection {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(ANONYMOUS)
    }
}

/// Live connections in insertion order. Not persisted — rebuilt from scratch
/// when the room restarts.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Idempotent: removing an absent connection is a no-op.
    pub fn remove(&mut self, id: &str) {
        self.connections.retain(|c| c.id != id);
    }

    pub fn all(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn find(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// No-op when the connection is absent — a rename can race a close.
    pub fn set_name(&mut self, id: &str, name: String) {
        if let Some(conn) = self.connections.iter_mut().find(|c| c.id == id) {
            conn.display_name = Some(name);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|c| c.role == Role::Subscriber)
            .count()
    }

    /// Current roster of display names, insertion order.
    pub fn names(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|c| c.display_name().to_string())
            .collect()
    }
}
