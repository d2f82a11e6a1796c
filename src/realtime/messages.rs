//! Wire messages exchanged over real-time sessions.
//!
//! Every frame is a JSON text frame tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Channel name that addresses every session.
pub const BROADCAST_CHANNEL: &str = "*";

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        session: Uuid,
    },
    Subscribed {
        channel: String,
    },
    Unsubscribed {
        channel: String,
    },
    Pong,
    Event {
        channel: String,
        event: String,
        data: Value,
        sent_at: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn event(channel: impl Into<String>, event: impl Into<String>, data: Value) -> Self {
        Self::Event {
            channel: channel.into(),
            event: event.into(),
            data,
            sent_at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to a text frame payload.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
