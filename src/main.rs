use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod bot;
mod bridge;
mod config;
mod lavalink;
mod script;
#[cfg(test)]
mod test_support;

use crate::bot::{
    voice::{DiscordOutput, SongbirdGateway},
    ScriptBot,
};
use crate::bridge::MusicBridge;
use crate::config::{Config, ScriptsFile};
use crate::lavalink::NodeManager;
use crate::script::{EventDispatcher, EventRegistry, TemplateInterpreter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lavabridge=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting lavabridge v{}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let scripts = match ScriptsFile::load(&config.scripts_path) {
        Ok(scripts) => scripts,
        Err(e) => {
            warn!("⚠️ {:#}, starting without scripts", e);
            ScriptsFile::default()
        }
    };
    let scripts = Arc::new(scripts);
    info!("📜 {} command(s) loaded", scripts.commands.len());

    // Node client, shared by every script function and the event dispatcher
    let node = Arc::new(NodeManager::new(config.node_options(), config.default_volume));

    let songbird = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));
    let bridge = Arc::new(MusicBridge::new(
        Arc::clone(&node),
        Arc::new(SongbirdGateway::new(Arc::clone(&songbird))),
    ));
    let interpreter = Arc::new(TemplateInterpreter::new(
        bridge,
        Arc::new(DiscordOutput::new(http)),
    ));

    let registry = Arc::new(EventRegistry::new());
    let loaded = registry.load(&scripts.events);
    info!("📡 {} custom event(s) loaded", loaded);
    let dispatcher = EventDispatcher::new(
        registry,
        Arc::clone(&node),
        interpreter.clone(),
        config.lavalink_debug,
    );

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let handler = ScriptBot::new(
        Arc::clone(&config),
        scripts,
        node,
        interpreter,
        dispatcher,
    );

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
