//! Outbound relay: game chat broadcast and the IRC side channel

pub mod irc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::ws::protocol::ServerMsg;

/// Where a relayed line should go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// In-game chat only
    Chat,
    /// IRC side channel only
    Irc,
    /// Both chat and IRC
    ChatAndIrc,
}

impl Target {
    pub fn includes_chat(self) -> bool {
        matches!(self, Target::Chat | Target::ChatAndIrc)
    }

    pub fn includes_irc(self) -> bool {
        matches!(self, Target::Irc | Target::ChatAndIrc)
    }
}

/// Fire-and-forget outbound text capability.
///
/// Called from inside the match loop, so implementations must not block.
pub trait Relay: Send + Sync {
    fn relay(&self, text: &str, target: Target);
}

/// Production relay: chat lines go to a broadcast channel (websocket feed),
/// IRC lines to the bridge task.
#[derive(Clone)]
pub struct RelayHub {
    chat_tx: broadcast::Sender<ServerMsg>,
    irc_tx: mpsc::UnboundedSender<String>,
}

impl RelayHub {
    pub fn new(
        chat_tx: broadcast::Sender<ServerMsg>,
        irc_tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self { chat_tx, irc_tx }
    }

    /// Subscribe to the chat feed
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.chat_tx.subscribe()
    }
}

impl Relay for RelayHub {
    fn relay(&self, text: &str, target: Target) {
        debug!(?target, text, "Relaying line");

        if target.includes_chat() {
            // No subscribers is fine, nobody is watching the feed
            let _ = self.chat_tx.send(ServerMsg::chat(text));
        }

        if target.includes_irc() && self.irc_tx.send(text.to_string()).is_err() {
            debug!("IRC bridge closed, dropping line");
        }
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::{Relay, Target};

    /// Records every relayed line, in order
    #[derive(Clone, Default)]
    pub struct RecordingRelay {
        lines: Arc<Mutex<Vec<(String, Target)>>>,
    }

    impl RecordingRelay {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn lines(&self) -> Vec<(String, Target)> {
            self.lines.lock().clone()
        }

        pub fn texts(&self) -> Vec<String> {
            self.lines.lock().iter().map(|(t, _)| t.clone()).collect()
        }

        pub fn take(&self) -> Vec<(String, Target)> {
            std::mem::take(&mut *self.lines.lock())
        }
    }

    impl Relay for RecordingRelay {
        fn relay(&self, text: &str, target: Target) {
            self.lines.lock().push((text.to_string(), target));
        }
    }
}
