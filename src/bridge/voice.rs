use async_trait::async_trait;
use lavalink_rs::model::player::ConnectionInfo;
use serenity::model::id::{ChannelId, GuildId};
use tracing::{info, warn};

use super::MusicBridge;
use crate::{
    lavalink::{player::PlayerOptions, NodeError},
    script::{Args, BridgeError, Invocation, ScriptValue},
};

/// Discord voice gateway: joins a channel and hands back the credentials the node needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        self_deaf: bool,
        self_mute: bool,
    ) -> Result<ConnectionInfo, NodeError>;

    async fn leave(&self, guild_id: GuildId) -> Result<(), NodeError>;
}

impl MusicBridge {
    /// `$joinVoice[voiceId?;selfDeaf?;selfMute?;returnChannel?]`
    pub(super) async fn join_voice(
        &self,
        invocation: &Invocation,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let guild_id = invocation.guild_id.ok_or(BridgeError::NoGuild)?;
        let voice_channel = args
            .snowflake("voiceId")
            .map(ChannelId::from)
            .or(invocation.author_voice)
            .ok_or(BridgeError::NoVoiceChannel)?;
        let self_deaf = args.flag("selfDeaf").unwrap_or(true);
        let self_mute = args.flag("selfMute").unwrap_or(false);

        let player = self
            .node
            .create_player(PlayerOptions {
                guild_id,
                voice_channel,
                text_channel: invocation.channel_id,
                self_deaf,
                self_mute,
                volume: self.node.default_volume(),
            })
            .await;

        let joined = match self.voice.join(guild_id, voice_channel, self_deaf, self_mute).await {
            Ok(voice) => player.connect(voice).await,
            Err(e) => Err(e),
        };
        if let Err(e) = joined {
            warn!("⚠️ Could not connect player in {}: {}", guild_id, e);
            if let Err(cleanup) = self.node.destroy_player(guild_id).await {
                warn!("⚠️ Cleanup after failed join in {}: {}", guild_id, cleanup);
            }
            return Err(e.into());
        }

        info!("🔊 Joined voice channel {} in {}", voice_channel, guild_id);
        Ok(match args.flag("returnChannel") {
            Some(true) => ScriptValue::Text(voice_channel.to_string()),
            _ => ScriptValue::Null,
        })
    }

    /// `$leaveVoice[guildId?]`
    pub(super) async fn leave_voice(
        &self,
        invocation: &Invocation,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let guild_id = args
            .snowflake("guildId")
            .map(GuildId::from)
            .or(invocation.guild_id)
            .ok_or(BridgeError::NoPlayer)?;
        if self.node.get_player(guild_id).is_none() {
            return Err(BridgeError::NoPlayer);
        }

        self.node.destroy_player(guild_id).await?;
        self.voice.leave(guild_id).await?;
        info!("👋 Left voice in {}", guild_id);
        Ok(ScriptValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lavalink::client::MockNodeClient;
    use lavalink_rs::model::http::UpdatePlayer;
    use crate::script::args::{self, ArgKind, ArgSpec};
    use crate::test_support::{bridge_with, invocation, manager_with};
    use mockall::predicate::*;

    const JOIN: &[ArgSpec] = &[
        ArgSpec::optional("voiceId", ArgKind::Snowflake),
        ArgSpec::with_default("selfDeaf", ArgKind::Bool, "true"),
        ArgSpec::with_default("selfMute", ArgKind::Bool, "false"),
        ArgSpec::with_default("returnChannel", ArgKind::Bool, "false"),
    ];

    fn voice_state() -> ConnectionInfo {
        ConnectionInfo {
            token: "token".to_string(),
            endpoint: "eu.discord.media".to_string(),
            session_id: "session".to_string(),
        }
    }

    #[tokio::test]
    async fn test_join_uses_author_channel_and_connects() {
        let mut client = MockNodeClient::new();
        client
            .expect_create_player()
            .withf(|guild, voice| *guild == GuildId::new(1) && voice.session_id == "session")
            .times(1)
            .returning(|_, _| Ok(()));
        client
            .expect_update_player()
            .withf(|_, update: &UpdatePlayer| update.volume == Some(100))
            .times(1)
            .returning(|_, _| Ok(()));
        let mut voice = MockVoiceGateway::new();
        voice
            .expect_join()
            .with(eq(GuildId::new(1)), eq(ChannelId::new(30)), eq(true), eq(false))
            .times(1)
            .returning(|_, _, _, _| Ok(voice_state()));
        let node = manager_with(client);
        let bridge = bridge_with(node.clone(), voice);

        let args = args::parse(JOIN, Some(";;;true")).unwrap();
        let result = bridge.join_voice(&invocation(""), &args).await.unwrap();

        assert_eq!(result, ScriptValue::Text("30".to_string()));
        let player = node.get_player(GuildId::new(1)).unwrap();
        assert!(player.lock().await.connected);
    }

    #[tokio::test]
    async fn test_failed_join_removes_player() {
        let mut voice = MockVoiceGateway::new();
        voice
            .expect_join()
            .returning(|_, _, _, _| Err(NodeError::Voice("timed out".to_string())));
        let mut client = MockNodeClient::new();
        client.expect_delete_player().times(1).returning(|_| Ok(()));
        let node = manager_with(client);
        let bridge = bridge_with(node.clone(), voice);

        let args = args::parse(JOIN, None).unwrap();
        let error = bridge.join_voice(&invocation(""), &args).await.unwrap_err();

        assert!(matches!(error, BridgeError::Node(NodeError::Voice(_))));
        assert!(node.get_player(GuildId::new(1)).is_none());
    }

    #[tokio::test]
    async fn test_join_without_any_voice_channel() {
        let bridge = bridge_with(manager_with(MockNodeClient::new()), MockVoiceGateway::new());
        let mut outside = invocation("");
        outside.author_voice = None;

        let args = args::parse(JOIN, None).unwrap();
        let error = bridge.join_voice(&outside, &args).await.unwrap_err();
        assert!(matches!(error, BridgeError::NoVoiceChannel));
    }
}
