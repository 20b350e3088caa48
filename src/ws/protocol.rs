//! WebSocket protocol message definitions
//! These are the wire types for the chat feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Messages sent from server to feed subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// A line broadcast to in-game chat
    Chat {
        text: String,
        sent_at: DateTime<Utc>,
    },

    /// Subscriber fell behind and missed lines
    Lagged {
        skipped: u64,
    },
}

impl ServerMsg {
    pub fn chat(text: impl Into<String>) -> Self {
        Self::Chat {
            text: text.into(),
            sent_at: Utc::now(),
        }
    }
}
