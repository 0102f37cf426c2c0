//! # Lavalink Module
//!
//! Node client adapter used by the script functions.
//!
//! The node connection, REST calls and wire models come from `lavalink-rs`. Queues stay on
//! our side so loop modes, history and autoplay decide what plays next:
//!
//! - [`client`] - the node calls players and search make, behind a mockable trait
//! - [`hooks`] - builds the client and forwards its events, watches reconnects
//! - [`manager`] - players by guild, search, track-end handling, event stream
//! - [`player`] - one guild's session: queue, volume, filters, attributes
//! - [`autoplay`] - continues playback with a recommendation when the queue runs out
//!
//! Voice credentials come from the Discord gateway relay (see `bot::voice`).

pub mod autoplay;
pub mod client;
pub mod error;
pub mod event;
pub mod filters;
pub mod hooks;
pub mod manager;
pub mod player;
pub mod queue;
pub mod track;

pub use client::NodeClient;
pub use error::NodeError;
pub use event::{EventKind, NodeEvent};
pub use manager::NodeManager;
pub use player::PlayerHandle;
pub use track::{Track, TrackExt};

/// Connection parameters for the audio node.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    pub identifier: String,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub secure: bool,
    /// Reconnect attempts reported before the node counts as lost
    pub retry_amount: u32,
    /// Log connection state changes
    pub logging: bool,
}

impl NodeOptions {
    /// `host:port` as the client expects it.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            identifier: "Main Node".to_string(),
            host: "localhost".to_string(),
            port: 2333,
            password: "youshallnotpass".to_string(),
            secure: false,
            retry_amount: 7,
            logging: true,
        }
    }
}
