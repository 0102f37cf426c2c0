use async_trait::async_trait;
use lavalink_rs::model::player::ConnectionInfo;
use serenity::{
    http::Http,
    model::id::{ChannelId, GuildId},
};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{bridge::VoiceGateway, lavalink::NodeError, script::ScriptOutput};

/// Discord caps message content at 2000 characters.
const MAX_MESSAGE_LEN: usize = 2000;

/// Joins voice through the Discord gateway only; audio is sent by the node, so songbird
/// just relays the session and server updates the node needs.
pub struct SongbirdGateway {
    songbird: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(songbird: Arc<Songbird>) -> Self {
        Self { songbird }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        self_deaf: bool,
        self_mute: bool,
    ) -> Result<ConnectionInfo, NodeError> {
        let (info, call) = self
            .songbird
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(|e| NodeError::Voice(e.to_string()))?;

        {
            let mut call = call.lock().await;
            if let Err(e) = call.deafen(self_deaf).await {
                warn!("⚠️ Could not set self-deaf in {}: {}", guild_id, e);
            }
            if let Err(e) = call.mute(self_mute).await {
                warn!("⚠️ Could not set self-mute in {}: {}", guild_id, e);
            }
        }

        debug!("🔊 Voice session {} on {}", info.session_id, info.endpoint);
        Ok(info.into())
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), NodeError> {
        self.songbird
            .remove(guild_id)
            .await
            .map_err(|e| NodeError::Voice(e.to_string()))
    }
}

/// Sends script output as plain channel messages.
pub struct DiscordOutput {
    http: Arc<Http>,
}

impl DiscordOutput {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ScriptOutput for DiscordOutput {
    async fn send(&self, channel: ChannelId, content: String) -> anyhow::Result<()> {
        let content = truncate(&content, MAX_MESSAGE_LEN);
        channel.say(&self.http, content).await?;
        Ok(())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
