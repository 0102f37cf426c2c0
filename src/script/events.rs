//! Custom event scripts: registrations per node event and the loop that runs them.

use parking_lot::RwLock;
use serenity::model::id::ChannelId;
use std::{collections::HashMap, num::NonZeroU64, sync::Arc};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{error, info, warn};

use super::{context::Invocation, interpreter::Interpreter};
use crate::{
    config::EventScript,
    lavalink::{EventKind, NodeEvent, NodeManager, TrackExt},
};

#[derive(Debug, Clone, PartialEq)]
pub struct EventRegistration {
    pub event: EventKind,
    /// Channel for the script output; the player's text channel when unset.
    pub channel: Option<ChannelId>,
    pub name: String,
    pub code: String,
}

/// Scripts per node event, in registration order.
#[derive(Debug, Default)]
pub struct EventRegistry {
    entries: RwLock<HashMap<EventKind, Vec<EventRegistration>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_event(&self, registration: EventRegistration) {
        self.entries
            .write()
            .entry(registration.event)
            .or_default()
            .push(registration);
    }

    pub fn subscribe(
        &self,
        event: EventKind,
        channel: Option<ChannelId>,
        name: impl Into<String>,
        code: impl Into<String>,
    ) {
        self.add_event(EventRegistration {
            event,
            channel,
            name: name.into(),
            code: code.into(),
        });
    }

    pub fn registrations(&self, event: EventKind) -> Vec<EventRegistration> {
        self.entries.read().get(&event).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers scripts from the scripts file. Entries with an unknown event or a bad
    /// channel are logged and skipped. Returns how many were registered.
    pub fn load(&self, scripts: &[EventScript]) -> usize {
        let mut loaded = 0;
        for script in scripts {
            let event = match script.event.parse::<EventKind>() {
                Ok(event) => event,
                Err(name) => {
                    error!("❌ Failed to load event script {}: unknown event \"{}\"", script.name, name);
                    continue;
                }
            };

            let channel = match script.channel.as_deref().map(str::parse::<NonZeroU64>) {
                None => None,
                Some(Ok(id)) => Some(ChannelId::from(id)),
                Some(Err(_)) => {
                    error!("❌ Failed to load event script {}: invalid channel", script.name);
                    continue;
                }
            };

            self.subscribe(event, channel, script.name.clone(), script.code.clone());
            loaded += 1;
        }
        loaded
    }
}

/// Forwards node events to the interpreter, one registration at a time.
pub struct EventDispatcher {
    registry: Arc<EventRegistry>,
    node: Arc<NodeManager>,
    interpreter: Arc<dyn Interpreter>,
    debug: bool,
}

impl EventDispatcher {
    pub fn new(
        registry: Arc<EventRegistry>,
        node: Arc<NodeManager>,
        interpreter: Arc<dyn Interpreter>,
        debug: bool,
    ) -> Self {
        Self {
            registry,
            node,
            interpreter,
            debug,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        let events = self.node.subscribe();
        tokio::spawn(self.run(events))
    }

    pub async fn run(self, mut events: broadcast::Receiver<NodeEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.dispatch(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("⚠️ Event dispatcher fell behind, {} node events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("Event dispatcher stopped");
    }

    /// Runs every registration for the event in order. A failing script is logged and does
    /// not stop the rest. Returns how many scripts ran.
    pub async fn dispatch(&self, event: &NodeEvent) -> usize {
        let kind = event.kind();
        let registrations = self.registry.registrations(kind);
        if registrations.is_empty() {
            return 0;
        }

        // Events sent after the player is gone carry its channel and requester themselves
        let guild_id = event.guild_id();
        let (text_channel, author) = match guild_id.and_then(|g| self.node.get_player(g)) {
            Some(player) => {
                let state = player.lock().await;
                (
                    event.text_channel().or(state.text_channel),
                    event
                        .requester()
                        .or_else(|| state.queue.current().and_then(TrackExt::requester)),
                )
            }
            None => (event.text_channel(), event.requester()),
        };
        let payload = event.payload();

        let mut ran = 0;
        for registration in registrations {
            let channel = registration.channel.or(text_channel);
            let (Some(guild_id), Some(channel_id)) = (guild_id, channel) else {
                error!(
                    "❌ Event \"{}\" triggered but channel or guild is undefined",
                    kind
                );
                continue;
            };

            let invocation = Invocation {
                guild_id: Some(guild_id),
                channel_id: Some(channel_id),
                author,
                author_voice: None,
                message: String::new(),
                script_name: registration.name.clone(),
                code: registration.code,
                event: Some(payload.clone()),
            };

            match self.interpreter.run(invocation).await {
                Ok(()) => ran += 1,
                Err(e) => error!("❌ Event script {} failed: {:#}", registration.name, e),
            }
            if self.debug {
                info!("Event \"{}\" triggered", kind);
            }
        }
        ran
    }
}
