//! # Bot Module
//!
//! Discord side of the bot: prefix commands from the scripts file run through the
//! script interpreter, and the node connection plus the custom event dispatcher are
//! started once the gateway is ready.
//!
//! ## Architecture
//!
//! [`ScriptBot`] implements Serenity's [`EventHandler`]. It owns nothing audio related
//! itself; playback lives in the shared [`NodeManager`], and voice connections are made
//! through songbird by [`voice::SongbirdGateway`].

use parking_lot::Mutex;
use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, error, info, warn};

pub mod voice;

use crate::{
    config::{Config, ScriptsFile},
    lavalink::NodeManager,
    script::{EventDispatcher, Interpreter, Invocation},
};

/// Splits `<prefix><command> <text>` into the command name and the remaining text.
pub fn parse_command<'a>(content: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = content.strip_prefix(prefix)?;
    let (name, text) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    (!name.is_empty()).then(|| (name, text.trim()))
}

pub struct ScriptBot {
    config: Arc<Config>,
    scripts: Arc<ScriptsFile>,
    node: Arc<NodeManager>,
    interpreter: Arc<dyn Interpreter>,
    /// Taken on the first `ready`
    dispatcher: Mutex<Option<EventDispatcher>>,
    node_started: AtomicBool,
}

impl ScriptBot {
    pub fn new(
        config: Arc<Config>,
        scripts: Arc<ScriptsFile>,
        node: Arc<NodeManager>,
        interpreter: Arc<dyn Interpreter>,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            config,
            scripts,
            node,
            interpreter,
            dispatcher: Mutex::new(Some(dispatcher)),
            node_started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventHandler for ScriptBot {
    /// Connects the node and starts event dispatch. Gateway reconnects fire `ready` again;
    /// both only happen once.
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        // Subscribed before connecting so the first nodeConnect reaches scripts
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            dispatcher.spawn();
            info!("📡 Custom event dispatcher started");
        }

        if !self.node_started.swap(true, Ordering::SeqCst) {
            info!("🎼 Connecting to Lavalink node at {}", self.node.options().address());
            self.node.connect(ready.user.id).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some((name, text)) = parse_command(&msg.content, &self.config.prefix) else {
            return;
        };
        let Some(command) = self.scripts.command(name) else {
            return;
        };

        let author_voice = msg.guild_id.and_then(|guild_id| {
            let guild = ctx.cache.guild(guild_id)?;
            guild
                .voice_states
                .get(&msg.author.id)
                .and_then(|state| state.channel_id)
        });

        debug!("⌨️ {} ran {}{}", msg.author.name, self.config.prefix, command.name);
        let invocation = Invocation {
            guild_id: msg.guild_id,
            channel_id: Some(msg.channel_id),
            author: Some(msg.author.id),
            author_voice,
            message: text.to_string(),
            script_name: command.name.clone(),
            code: command.code.clone(),
            event: None,
        };

        if let Err(e) = self.interpreter.run(invocation).await {
            error!("Error running command {}: {:?}", command.name, e);
        }
    }

    /// Drops the player when the bot is disconnected from voice from outside a script.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };

        if self.node.get_player(guild_id).is_some() {
            info!("🔌 Bot disconnected from voice in guild {}", guild_id);
            if let Err(e) = self.node.destroy_player(guild_id).await {
                warn!("⚠️ Could not destroy player in {}: {}", guild_id, e);
            }
        }
    }
}
