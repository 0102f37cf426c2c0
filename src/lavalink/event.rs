use lavalink_rs::model::events::TrackEndReason;
use serde_json::json;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{fmt, str::FromStr};

use super::track::{Track, TrackExt};

/// Everything the node client reports to the rest of the bot.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    NodeConnect { identifier: String },
    NodeReconnect { identifier: String, attempt: u32 },
    NodeDisconnect { identifier: String, reason: String },
    NodeError { identifier: String, message: String },
    PlayerCreate { guild_id: GuildId },
    /// Sent after the player is gone, so it carries what event scripts need from it.
    PlayerDestroy {
        guild_id: GuildId,
        text_channel: Option<ChannelId>,
        requester: Option<UserId>,
    },
    TrackStart { guild_id: GuildId, track: Track },
    TrackEnd { guild_id: GuildId, track: Track, reason: TrackEndReason },
    TrackStuck { guild_id: GuildId, track: Track, threshold_ms: u64 },
    TrackError { guild_id: GuildId, track: Track, message: String },
    QueueEnd {
        guild_id: GuildId,
        track: Option<Track>,
        text_channel: Option<ChannelId>,
    },
    SocketClosed { guild_id: GuildId, code: u16, reason: String },
}

/// Event names as used in script registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeConnect,
    NodeReconnect,
    NodeDisconnect,
    NodeError,
    PlayerCreate,
    PlayerDestroy,
    TrackStart,
    TrackEnd,
    TrackStuck,
    TrackError,
    QueueEnd,
    SocketClosed,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::NodeConnect,
        EventKind::NodeReconnect,
        EventKind::NodeDisconnect,
        EventKind::NodeError,
        EventKind::PlayerCreate,
        EventKind::PlayerDestroy,
        EventKind::TrackStart,
        EventKind::TrackEnd,
        EventKind::TrackStuck,
        EventKind::TrackError,
        EventKind::QueueEnd,
        EventKind::SocketClosed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::NodeConnect => "nodeConnect",
            EventKind::NodeReconnect => "nodeReconnect",
            EventKind::NodeDisconnect => "nodeDisconnect",
            EventKind::NodeError => "nodeError",
            EventKind::PlayerCreate => "playerCreate",
            EventKind::PlayerDestroy => "playerDestroy",
            EventKind::TrackStart => "trackStart",
            EventKind::TrackEnd => "trackEnd",
            EventKind::TrackStuck => "trackStuck",
            EventKind::TrackError => "trackError",
            EventKind::QueueEnd => "queueEnd",
            EventKind::SocketClosed => "socketClosed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| wanted.to_string())
    }
}

impl NodeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            NodeEvent::NodeConnect { .. } => EventKind::NodeConnect,
            NodeEvent::NodeReconnect { .. } => EventKind::NodeReconnect,
            NodeEvent::NodeDisconnect { .. } => EventKind::NodeDisconnect,
            NodeEvent::NodeError { .. } => EventKind::NodeError,
            NodeEvent::PlayerCreate { .. } => EventKind::PlayerCreate,
            NodeEvent::PlayerDestroy { .. } => EventKind::PlayerDestroy,
            NodeEvent::TrackStart { .. } => EventKind::TrackStart,
            NodeEvent::TrackEnd { .. } => EventKind::TrackEnd,
            NodeEvent::TrackStuck { .. } => EventKind::TrackStuck,
            NodeEvent::TrackError { .. } => EventKind::TrackError,
            NodeEvent::QueueEnd { .. } => EventKind::QueueEnd,
            NodeEvent::SocketClosed { .. } => EventKind::SocketClosed,
        }
    }

    /// Guild of the player the event belongs to; node level events have none.
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            NodeEvent::NodeConnect { .. }
            | NodeEvent::NodeReconnect { .. }
            | NodeEvent::NodeDisconnect { .. }
            | NodeEvent::NodeError { .. } => None,
            NodeEvent::PlayerCreate { guild_id }
            | NodeEvent::PlayerDestroy { guild_id, .. }
            | NodeEvent::TrackStart { guild_id, .. }
            | NodeEvent::TrackEnd { guild_id, .. }
            | NodeEvent::TrackStuck { guild_id, .. }
            | NodeEvent::TrackError { guild_id, .. }
            | NodeEvent::QueueEnd { guild_id, .. }
            | NodeEvent::SocketClosed { guild_id, .. } => Some(*guild_id),
        }
    }

    /// Text channel known from the event itself, without looking up the player.
    pub fn text_channel(&self) -> Option<ChannelId> {
        match self {
            NodeEvent::PlayerDestroy { text_channel, .. }
            | NodeEvent::QueueEnd { text_channel, .. } => *text_channel,
            _ => None,
        }
    }

    /// User behind the event: whoever queued its track.
    pub fn requester(&self) -> Option<UserId> {
        match self {
            NodeEvent::PlayerDestroy { requester, .. } => *requester,
            NodeEvent::TrackStart { track, .. }
            | NodeEvent::TrackEnd { track, .. }
            | NodeEvent::TrackStuck { track, .. }
            | NodeEvent::TrackError { track, .. } => track.requester(),
            NodeEvent::QueueEnd { track, .. } => track.as_ref().and_then(TrackExt::requester),
            _ => None,
        }
    }

    /// Event data handed to scripts alongside the invocation.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            NodeEvent::NodeConnect { identifier } => json!({ "node": identifier }),
            NodeEvent::NodeReconnect { identifier, attempt } => {
                json!({ "node": identifier, "attempt": attempt })
            }
            NodeEvent::NodeDisconnect { identifier, reason } => {
                json!({ "node": identifier, "reason": reason })
            }
            NodeEvent::NodeError { identifier, message } => {
                json!({ "node": identifier, "message": message })
            }
            NodeEvent::PlayerCreate { guild_id } | NodeEvent::PlayerDestroy { guild_id, .. } => {
                json!({ "guildId": guild_id.to_string() })
            }
            NodeEvent::TrackStart { guild_id, track } => {
                json!({ "guildId": guild_id.to_string(), "track": track })
            }
            NodeEvent::TrackEnd { guild_id, track, reason } => {
                json!({ "guildId": guild_id.to_string(), "track": track, "reason": reason })
            }
            NodeEvent::TrackStuck { guild_id, track, threshold_ms } => json!({
                "guildId": guild_id.to_string(),
                "track": track,
                "thresholdMs": threshold_ms,
            }),
            NodeEvent::TrackError { guild_id, track, message } => json!({
                "guildId": guild_id.to_string(),
                "track": track,
                "message": message,
            }),
            NodeEvent::QueueEnd { guild_id, track, .. } => {
                json!({ "guildId": guild_id.to_string(), "track": track })
            }
            NodeEvent::SocketClosed { guild_id, code, reason } => json!({
                "guildId": guild_id.to_string(),
                "code": code,
                "reason": reason,
            }),
        }
    }
}
