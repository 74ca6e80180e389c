//! Wire-format messages exchanged with room clients.

use serde::{Deserialize, Serialize};

use crate::builds::BuildRecord;

/// A frame received from a client. Frames that fail to parse into one of
/// these shapes (including unknown `type` tags) are dropped by the room.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Chat text broadcast to the whole room.
    Message { data: String },
    /// Change the sender's display name; triggers a roster refresh.
    ChangeName { data: String },
}

/// A frame sent to a client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full roster of display names, insertion order.
    List { data: Vec<String> },
    /// Chat text relayed from one connection to the room.
    Message { name: String, data: String },
    /// The latest stored build, sent to a subscriber at admission.
    Build { data: BuildRecord },
    /// A freshly observed build, pushed to subscribers by the poll timer.
    NewBuild { data: BuildRecord },
}
