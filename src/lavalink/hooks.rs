//! Lavalink client construction and the hooks that feed node events into the manager.
//!
//! Hooks run inside the client's tasks; they only forward what arrived to the manager
//! over a channel, which handles messages one at a time.

use lavalink_rs::{
    client::LavalinkClient,
    hook,
    model::{client::NodeDistributionStrategy, events},
    node::NodeBuilder,
};
use serenity::model::id::UserId;
use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{event::NodeEvent, manager::NodeManager, NodeOptions};

/// The client retries a lost node on this interval, so reconnect attempts are counted on it.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(15);

/// What the node reported, as forwarded by the hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeMessage {
    Ready { session_id: String, resumed: bool },
    PlayerUpdate(events::PlayerUpdate),
    TrackStart(events::TrackStart),
    TrackEnd(events::TrackEnd),
    TrackException(events::TrackException),
    TrackStuck(events::TrackStuck),
    WebSocketClosed(events::WebSocketClosed),
}

/// User data of the client, reached from every hook.
pub struct NodeHooks {
    tx: mpsc::UnboundedSender<NodeMessage>,
}

fn forward(client: &LavalinkClient, message: NodeMessage) {
    match client.data::<NodeHooks>() {
        Ok(hooks) => {
            // Closed only while the process shuts down
            let _ = hooks.tx.send(message);
        }
        Err(e) => error!("❌ Lavalink client without hook data: {}", e),
    }
}

#[hook]
async fn ready(client: LavalinkClient, session_id: String, event: &events::Ready) {
    forward(
        &client,
        NodeMessage::Ready {
            session_id,
            resumed: event.resumed,
        },
    );
}

#[hook]
async fn player_update(client: LavalinkClient, _session_id: String, event: &events::PlayerUpdate) {
    forward(&client, NodeMessage::PlayerUpdate(event.clone()));
}

#[hook]
async fn track_start(client: LavalinkClient, _session_id: String, event: &events::TrackStart) {
    forward(&client, NodeMessage::TrackStart(event.clone()));
}

#[hook]
async fn track_end(client: LavalinkClient, _session_id: String, event: &events::TrackEnd) {
    forward(&client, NodeMessage::TrackEnd(event.clone()));
}

#[hook]
async fn track_exception(client: LavalinkClient, _session_id: String, event: &events::TrackException) {
    forward(&client, NodeMessage::TrackException(event.clone()));
}

#[hook]
async fn track_stuck(client: LavalinkClient, _session_id: String, event: &events::TrackStuck) {
    forward(&client, NodeMessage::TrackStuck(event.clone()));
}

#[hook]
async fn websocket_closed(client: LavalinkClient, _session_id: String, event: &events::WebSocketClosed) {
    forward(&client, NodeMessage::WebSocketClosed(event.clone()));
}

/// Builds the client for the configured node and connects it. Messages from the node
/// arrive on `tx`.
pub async fn build_client(
    options: &NodeOptions,
    user_id: UserId,
    tx: mpsc::UnboundedSender<NodeMessage>,
) -> LavalinkClient {
    let events = events::Events {
        ready: Some(ready),
        player_update: Some(player_update),
        track_start: Some(track_start),
        track_end: Some(track_end),
        track_exception: Some(track_exception),
        track_stuck: Some(track_stuck),
        websocket_closed: Some(websocket_closed),
        ..Default::default()
    };

    let node = NodeBuilder {
        hostname: options.address(),
        is_ssl: options.secure,
        events: events::Events::default(),
        password: options.password.clone(),
        user_id: user_id.into(),
        session_id: None,
    };

    LavalinkClient::new_with_data(
        events,
        vec![node],
        NodeDistributionStrategy::main_fallback(),
        Arc::new(NodeHooks { tx }),
    )
    .await
}

/// Connection change seen by [`NodeWatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchChange {
    Lost,
    Retrying(u32),
    GaveUp,
    Recovered,
}

/// Counts the client's reconnect attempts against the configured budget.
#[derive(Debug)]
pub struct NodeWatch {
    retry_amount: u32,
    running: bool,
    attempt: u32,
}

impl NodeWatch {
    pub fn new(retry_amount: u32, running: bool) -> Self {
        Self {
            retry_amount,
            running,
            attempt: 0,
        }
    }

    /// Feeds one check of the node state. Once the budget is spent the watch stays quiet
    /// until the node is back.
    pub fn observe(&mut self, running: bool) -> Option<WatchChange> {
        let was_running = std::mem::replace(&mut self.running, running);
        match (was_running, running) {
            (true, true) => None,
            (false, true) => {
                self.attempt = 0;
                Some(WatchChange::Recovered)
            }
            (true, false) => {
                self.attempt = 0;
                Some(WatchChange::Lost)
            }
            (false, false) => {
                if self.attempt > self.retry_amount {
                    return None;
                }
                self.attempt += 1;
                if self.attempt > self.retry_amount {
                    Some(WatchChange::GaveUp)
                } else {
                    Some(WatchChange::Retrying(self.attempt))
                }
            }
        }
    }
}

fn node_running(client: &LavalinkClient) -> bool {
    client
        .nodes
        .iter()
        .any(|node| node.is_running.load(Ordering::SeqCst))
}

/// Reports the node connection state until the process exits.
pub async fn watch(manager: Arc<NodeManager>, client: LavalinkClient) {
    let options = manager.options().clone();
    let mut state = NodeWatch::new(options.retry_amount, node_running(&client));
    let mut ticker = tokio::time::interval(RECONNECT_INTERVAL);

    loop {
        ticker.tick().await;
        let Some(change) = state.observe(node_running(&client)) else {
            continue;
        };

        match change {
            WatchChange::Lost => {
                if options.logging {
                    warn!(
                        "🔴 disconnect: connection to {} ({}) lost",
                        options.identifier, options.host
                    );
                }
                manager.node_disconnected("connection lost".to_string()).await;
            }
            WatchChange::Retrying(attempt) => {
                if options.logging {
                    warn!(
                        "🟡 reconnect {}: reinstating connection to {} ({}) in {}",
                        attempt,
                        options.identifier,
                        options.host,
                        humantime::format_duration(RECONNECT_INTERVAL)
                    );
                }
                manager.emit(NodeEvent::NodeReconnect {
                    identifier: options.identifier.clone(),
                    attempt,
                });
            }
            WatchChange::GaveUp => {
                if options.logging {
                    error!(
                        "💀 destroyed: connection to {} ({}) destroyed after {} attempts",
                        options.identifier, options.host, options.retry_amount
                    );
                }
                manager.emit(NodeEvent::NodeError {
                    identifier: options.identifier.clone(),
                    message: format!("gave up after {} reconnect attempts", options.retry_amount),
                });
            }
            WatchChange::Recovered => {
                info!("Node {} is reachable again", options.identifier);
            }
        }
    }
}
