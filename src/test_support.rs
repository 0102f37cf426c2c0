//! Builders shared by unit tests.

use lavalink_rs::model::track::{self, TrackError, TrackInfo, TrackLoadData, TrackLoadType};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;

use crate::{
    bridge::{voice::MockVoiceGateway, MusicBridge},
    lavalink::{
        client::{ClientSlot, MockNodeClient},
        player::PlayerOptions,
        track::{Track, TrackExt},
        NodeManager, NodeOptions,
    },
    script::Invocation,
};

pub fn track_from(source: &str, id: &str, title: &str) -> Track {
    Track {
        encoded: format!("enc-{id}"),
        info: TrackInfo {
            identifier: id.to_string(),
            is_seekable: true,
            author: "Test Artist".to_string(),
            length: 180_000,
            is_stream: false,
            position: 0,
            title: title.to_string(),
            uri: Some(format!("https://example.com/{id}")),
            artwork_url: None,
            isrc: None,
            source_name: source.to_string(),
        },
        plugin_info: None,
        user_data: None,
    }
    .with_requester(Some(UserId::new(99)))
}

pub fn track(id: &str, title: &str) -> Track {
    track_from("youtube", id, title)
}

/// Player in voice channel 30 announcing to text channel 20.
pub fn player_options(guild: u64) -> PlayerOptions {
    PlayerOptions {
        guild_id: GuildId::new(guild),
        voice_channel: ChannelId::new(30),
        text_channel: Some(ChannelId::new(20)),
        self_deaf: true,
        self_mute: false,
        volume: 100,
    }
}

/// Node answer to a search query.
pub fn search_result(tracks: Vec<Track>) -> track::Track {
    track::Track {
        load_type: TrackLoadType::Search,
        data: Some(TrackLoadData::Search(tracks)),
    }
}

pub fn load_error(message: &str) -> track::Track {
    track::Track {
        load_type: TrackLoadType::Error,
        data: Some(TrackLoadData::Error(TrackError {
            message: message.to_string(),
            severity: "common".to_string(),
            cause: "test".to_string(),
        })),
    }
}

pub fn slot_with(client: MockNodeClient) -> Arc<ClientSlot> {
    let slot = ClientSlot::default();
    slot.set(Arc::new(client));
    Arc::new(slot)
}

pub fn manager_with(client: MockNodeClient) -> Arc<NodeManager> {
    let manager = Arc::new(NodeManager::new(NodeOptions::default(), 100));
    manager.attach(Arc::new(client));
    manager
}

pub fn bridge_with(node: Arc<NodeManager>, voice: MockVoiceGateway) -> MusicBridge {
    MusicBridge::new(node, Arc::new(voice))
}

/// Invocation from user 99 in guild 1, channel 20, sitting in voice channel 30.
pub fn invocation(code: &str) -> Invocation {
    Invocation {
        guild_id: Some(GuildId::new(1)),
        channel_id: Some(ChannelId::new(20)),
        author: Some(UserId::new(99)),
        author_voice: Some(ChannelId::new(30)),
        message: String::new(),
        script_name: "test".to_string(),
        code: code.to_string(),
        event: None,
    }
}
