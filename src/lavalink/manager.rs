use dashmap::DashMap;
use lavalink_rs::model::{
    track::{self, TrackLoadData},
    GuildId as NodeGuildId,
};
use serenity::model::id::{GuildId, UserId};
use std::{
    num::NonZeroU64,
    sync::{atomic::Ordering, Arc},
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{
    autoplay,
    client::{ClientSlot, NodeClient},
    error::NodeError,
    event::NodeEvent,
    hooks::{self, NodeMessage},
    player::{Advance, PlayerHandle, PlayerOptions},
    track::{Track, TrackExt},
    NodeOptions,
};

const EVENT_CAPACITY: usize = 256;

/// Tracks found by a search, with the playlist name when the node resolved one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub tracks: Vec<Track>,
    pub playlist: Option<String>,
}

impl SearchResult {
    fn from_load(loaded: track::Track) -> Result<Self, NodeError> {
        Ok(match loaded.data {
            Some(TrackLoadData::Track(track)) => SearchResult {
                tracks: vec![track],
                playlist: None,
            },
            Some(TrackLoadData::Playlist(data)) => SearchResult {
                tracks: data.tracks,
                playlist: Some(data.info.name),
            },
            Some(TrackLoadData::Search(tracks)) => SearchResult {
                tracks,
                playlist: None,
            },
            Some(TrackLoadData::Error(exception)) => {
                let message = if exception.message.is_empty() {
                    exception.severity
                } else {
                    exception.message
                };
                return Err(NodeError::LoadFailed(message));
            }
            None => SearchResult::default(),
        })
    }
}

/// Process-wide node client: one player per guild, the node's event stream, search.
pub struct NodeManager {
    options: NodeOptions,
    client: Arc<ClientSlot>,
    players: DashMap<GuildId, Arc<PlayerHandle>>,
    events: broadcast::Sender<NodeEvent>,
    default_volume: u16,
}

impl NodeManager {
    pub fn new(options: NodeOptions, default_volume: u16) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            options,
            client: Arc::new(ClientSlot::default()),
            players: DashMap::new(),
            events,
            default_volume,
        }
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    pub fn default_volume(&self) -> u16 {
        self.default_volume
    }

    /// Hands the node client to the manager and its players. Returns `false` when one was
    /// attached before.
    pub fn attach(&self, client: Arc<dyn NodeClient>) -> bool {
        self.client.set(client)
    }

    /// Builds the Lavalink client and starts forwarding its events. Later calls, as on a
    /// gateway resume, do nothing.
    pub async fn connect(self: &Arc<Self>, user_id: UserId) {
        if self.client.get().is_ok() {
            debug!("Node client already connected");
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = hooks::build_client(&self.options, user_id, tx).await;
        if !self.attach(Arc::new(client.clone())) {
            return;
        }

        if !client.nodes.iter().any(|n| n.is_running.load(Ordering::SeqCst)) {
            error!("❌ Node {} unreachable at {}", self.options.identifier, self.options.address());
            self.emit(NodeEvent::NodeError {
                identifier: self.options.identifier.clone(),
                message: format!("could not connect to {}", self.options.address()),
            });
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                manager.handle_message(message).await;
            }
        });
        tokio::spawn(hooks::watch(Arc::clone(self), client));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: NodeEvent) {
        // No receivers just means nobody registered scripts for events yet
        let _ = self.events.send(event);
    }

    pub fn get_player(&self, guild_id: GuildId) -> Option<Arc<PlayerHandle>> {
        self.players.get(&guild_id).map(|p| Arc::clone(p.value()))
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Creates the guild's player, destroying the previous one first.
    pub async fn create_player(&self, options: PlayerOptions) -> Arc<PlayerHandle> {
        let guild_id = options.guild_id;
        if let Err(e) = self.destroy_player(guild_id).await {
            warn!("⚠️ Could not destroy previous player in {}: {}", guild_id, e);
        }

        let player = Arc::new(PlayerHandle::new(options, Arc::clone(&self.client)));
        self.players.insert(guild_id, Arc::clone(&player));
        info!("🎛️ Player created in {}", guild_id);
        self.emit(NodeEvent::PlayerCreate { guild_id });
        player
    }

    /// Removes the guild's player locally and on the node. Returns whether one existed.
    pub async fn destroy_player(&self, guild_id: GuildId) -> Result<bool, NodeError> {
        let Some((_, player)) = self.players.remove(&guild_id) else {
            return Ok(false);
        };

        let (text_channel, requester) = {
            let mut state = player.lock().await;
            let requester = state.queue.current().and_then(TrackExt::requester);
            state.queue.clear();
            (state.text_channel, requester)
        };
        self.emit(NodeEvent::PlayerDestroy {
            guild_id,
            text_channel,
            requester,
        });
        info!("🗑️ Player destroyed in {}", guild_id);

        let client = match self.client.get() {
            Ok(client) => client,
            Err(_) => return Ok(true),
        };
        match client.delete_player(guild_id).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_session_gone() => Ok(true),
            Err(e) => Err(e),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        source: &str,
        requester: Option<UserId>,
    ) -> Result<SearchResult, NodeError> {
        let identifier = search_identifier(query, source);
        let loaded = self.client.get()?.load_tracks(identifier).await?;
        let result = SearchResult::from_load(loaded)?;

        Ok(SearchResult {
            tracks: result
                .tracks
                .into_iter()
                .map(|t| t.with_requester(requester))
                .collect(),
            ..result
        })
    }

    /// Skips the current track; when nothing follows the queue has ended.
    pub async fn skip(&self, player: &Arc<PlayerHandle>) -> Result<Option<Track>, NodeError> {
        let ended = player.lock().await.queue.current().cloned();
        let next = player.skip().await?;
        if next.is_none() {
            self.queue_end(player, ended).await;
        }
        Ok(next)
    }

    /// Emits `queueEnd` and lets autoplay continue the session.
    pub async fn queue_end(&self, player: &Arc<PlayerHandle>, ended: Option<Track>) {
        let guild_id = player.guild_id();
        let text_channel = {
            let mut state = player.lock().await;
            state.queue.finish_current();
            state.text_channel
        };
        self.emit(NodeEvent::QueueEnd {
            guild_id,
            track: ended,
            text_channel,
        });

        match autoplay::continue_playback(self, player).await {
            Ok(Some(track)) => info!("🔁 Autoplay picked {} in {}", track.info.title, guild_id),
            Ok(None) => debug!("Queue ended in {}", guild_id),
            Err(e) => warn!("⚠️ Autoplay failed in {}: {}", guild_id, e),
        }
    }

    pub(crate) async fn handle_message(&self, message: NodeMessage) {
        let (guild, player_event) = match message {
            NodeMessage::Ready { session_id, resumed } => {
                if self.options.logging {
                    info!(
                        "🟢 connect: connection to {} ({}) succeeded",
                        self.options.identifier, self.options.host
                    );
                }
                debug!("Node session {} (resumed: {})", session_id, resumed);
                self.emit(NodeEvent::NodeConnect {
                    identifier: self.options.identifier.clone(),
                });
                return;
            }
            NodeMessage::PlayerUpdate(update) => {
                if let Some(player) = to_guild(update.guild_id).and_then(|g| self.get_player(g)) {
                    player.update_state(&update.state).await;
                }
                return;
            }
            NodeMessage::TrackStart(e) => (e.guild_id, NodeMessage::TrackStart(e)),
            NodeMessage::TrackEnd(e) => (e.guild_id, NodeMessage::TrackEnd(e)),
            NodeMessage::TrackException(e) => (e.guild_id, NodeMessage::TrackException(e)),
            NodeMessage::TrackStuck(e) => (e.guild_id, NodeMessage::TrackStuck(e)),
            NodeMessage::WebSocketClosed(e) => (e.guild_id, NodeMessage::WebSocketClosed(e)),
        };

        let Some(guild_id) = to_guild(guild) else {
            warn!("⚠️ Node event with invalid guild id {}", guild.0);
            return;
        };
        let Some(player) = self.get_player(guild_id) else {
            debug!("Node event for {} without a player", guild_id);
            return;
        };
        self.handle_player_event(guild_id, player, player_event).await;
    }

    async fn handle_player_event(&self, guild_id: GuildId, player: Arc<PlayerHandle>, message: NodeMessage) {
        match message {
            NodeMessage::TrackStart(start) => {
                player.track_started().await;
                self.emit(NodeEvent::TrackStart {
                    guild_id,
                    track: start.track,
                });
            }
            NodeMessage::TrackEnd(end) => {
                self.emit(NodeEvent::TrackEnd {
                    guild_id,
                    track: end.track,
                    reason: end.reason.clone(),
                });

                match player.track_ended(&end.reason).await {
                    Ok(Advance::QueueEnd(ended)) => self.queue_end(&player, ended).await,
                    Ok(_) => {}
                    Err(e) => error!("❌ Could not start next track in {}: {}", guild_id, e),
                }
            }
            NodeMessage::TrackException(exception) => {
                let error = exception.exception;
                self.emit(NodeEvent::TrackError {
                    guild_id,
                    track: exception.track,
                    message: if error.message.is_empty() {
                        error.severity
                    } else {
                        error.message
                    },
                });
            }
            NodeMessage::TrackStuck(stuck) => {
                self.emit(NodeEvent::TrackStuck {
                    guild_id,
                    track: stuck.track,
                    threshold_ms: stuck.threshold_ms,
                });
                if let Err(e) = self.skip(&player).await {
                    error!("❌ Could not skip stuck track in {}: {}", guild_id, e);
                }
            }
            NodeMessage::WebSocketClosed(closed) => {
                player.mark_disconnected().await;
                self.emit(NodeEvent::SocketClosed {
                    guild_id,
                    code: closed.code,
                    reason: closed.reason,
                });
            }
            NodeMessage::Ready { .. } | NodeMessage::PlayerUpdate(_) => {}
        }
    }

    /// Called by the node watch when the connection goes away.
    pub(crate) async fn node_disconnected(&self, reason: String) {
        let players: Vec<_> = self.players.iter().map(|p| Arc::clone(p.value())).collect();
        for player in players {
            player.mark_disconnected().await;
        }
        self.emit(NodeEvent::NodeDisconnect {
            identifier: self.options.identifier.clone(),
            reason,
        });
    }
}

fn to_guild(id: NodeGuildId) -> Option<GuildId> {
    NonZeroU64::new(id.0).map(GuildId::from)
}

/// Maps a source name to the node's search prefix. URLs are loaded as they are and unknown
/// names are used as the prefix verbatim.
pub fn search_identifier(query: &str, source: &str) -> String {
    let query = query.trim();
    if Url::parse(query).is_ok_and(|url| matches!(url.scheme(), "http" | "https")) {
        return query.to_string();
    }

    let source = source.trim().to_lowercase();
    let prefix = match source.as_str() {
        "" | "youtube" | "yt" => "ytsearch",
        "youtubemusic" | "ytm" => "ytmsearch",
        "soundcloud" | "sc" => "scsearch",
        "deezer" | "dz" => "dzsearch",
        "spotify" | "sp" => "spsearch",
        "applemusic" | "am" => "amsearch",
        other => other,
    };
    format!("{}:{}", prefix, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lavalink::client::MockNodeClient;
    use crate::test_support::{load_error, manager_with, player_options, search_result, track};
    use lavalink_rs::model::{
        events::{self, TrackEndReason},
        player::State,
        track::{PlaylistData, PlaylistInfo, TrackLoadType},
    };
    use pretty_assertions::assert_eq;

    fn track_end(guild: u64, reason: TrackEndReason) -> NodeMessage {
        NodeMessage::TrackEnd(events::TrackEnd {
            op: "event".to_string(),
            event_type: "TrackEndEvent".to_string(),
            guild_id: NodeGuildId(guild),
            track: track("a", "A"),
            reason,
        })
    }

    #[test]
    fn test_search_identifiers() {
        assert_eq!(search_identifier("never gonna", "youtube"), "ytsearch:never gonna");
        assert_eq!(search_identifier("x", "SoundCloud"), "scsearch:x");
        assert_eq!(search_identifier("seed_tracks=a,b", "sprec"), "sprec:seed_tracks=a,b");
        assert_eq!(
            search_identifier("https://youtu.be/dQw4w9WgXcQ", "spotify"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_load_results() {
        let playlist = track::Track {
            load_type: TrackLoadType::Playlist,
            data: Some(TrackLoadData::Playlist(PlaylistData {
                info: PlaylistInfo {
                    name: "Mix".to_string(),
                    selected_track: None,
                },
                tracks: vec![track("a", "A")],
                plugin_info: None,
            })),
        };
        let result = SearchResult::from_load(playlist).unwrap();
        assert_eq!(result.playlist.as_deref(), Some("Mix"));
        assert_eq!(result.tracks.len(), 1);

        let empty = track::Track {
            load_type: TrackLoadType::Empty,
            data: None,
        };
        assert_eq!(SearchResult::from_load(empty).unwrap(), SearchResult::default());
    }

    #[tokio::test]
    async fn test_create_player_replaces_existing() {
        let mut client = MockNodeClient::new();
        client
            .expect_delete_player()
            .with(mockall::predicate::eq(GuildId::new(1)))
            .times(1)
            .returning(|_| Ok(()));
        let manager = manager_with(client);
        let mut events = manager.subscribe();

        let first = manager.create_player(player_options(1)).await;
        let second = manager.create_player(player_options(1)).await;

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(manager.player_count(), 1);
        assert_eq!(events.recv().await.unwrap(), NodeEvent::PlayerCreate { guild_id: GuildId::new(1) });
        assert!(matches!(events.recv().await.unwrap(), NodeEvent::PlayerDestroy { .. }));
        assert_eq!(events.recv().await.unwrap(), NodeEvent::PlayerCreate { guild_id: GuildId::new(1) });
    }

    #[tokio::test]
    async fn test_destroy_carries_channel_and_requester() {
        let mut client = MockNodeClient::new();
        client.expect_update_player().returning(|_, _| Ok(()));
        client
            .expect_delete_player()
            .returning(|_| Err(NodeError::Lavalink(lavalink_rs::error::LavalinkError::NoSessionPresent)));
        let manager = manager_with(client);
        let player = manager.create_player(player_options(4)).await;
        player.enqueue(vec![track("a", "A")]).await.unwrap();
        let mut events = manager.subscribe();

        assert!(manager.destroy_player(GuildId::new(4)).await.unwrap());

        assert_eq!(
            events.recv().await.unwrap(),
            NodeEvent::PlayerDestroy {
                guild_id: GuildId::new(4),
                text_channel: Some(serenity::model::id::ChannelId::new(20)),
                requester: Some(UserId::new(99)),
            }
        );
        assert!(manager.get_player(GuildId::new(4)).is_none());
        assert!(!manager.destroy_player(GuildId::new(4)).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_attaches_requester_and_maps_errors() {
        let mut client = MockNodeClient::new();
        client
            .expect_load_tracks()
            .withf(|id| id == "ytsearch:hello")
            .returning(|_| Ok(search_result(vec![track("a", "A"), track("b", "B")])));
        client
            .expect_load_tracks()
            .withf(|id| id == "ytsearch:broken")
            .returning(|_| Ok(load_error("blocked")));
        let manager = manager_with(client);

        let result = manager.search("hello", "youtube", Some(UserId::new(9))).await.unwrap();
        assert_eq!(result.tracks.len(), 2);
        assert!(result.tracks.iter().all(|t| t.requester() == Some(UserId::new(9))));

        let error = manager.search("broken", "youtube", None).await.unwrap_err();
        assert!(matches!(error, NodeError::LoadFailed(m) if m == "blocked"));
    }

    #[tokio::test]
    async fn test_search_without_a_client_fails() {
        let manager = Arc::new(NodeManager::new(NodeOptions::default(), 100));

        let error = manager.search("hello", "youtube", None).await.unwrap_err();
        assert!(matches!(error, NodeError::NotConnected));
    }

    #[tokio::test]
    async fn test_messages_update_players_and_announce_ready() {
        let manager = manager_with(MockNodeClient::new());
        let player = manager.create_player(player_options(5)).await;
        let mut events = manager.subscribe();

        manager
            .handle_message(NodeMessage::Ready {
                session_id: "abc".to_string(),
                resumed: false,
            })
            .await;
        manager
            .handle_message(NodeMessage::PlayerUpdate(events::PlayerUpdate {
                op: "playerUpdate".to_string(),
                guild_id: NodeGuildId(5),
                state: State { time: 0, position: 1200, connected: true, ping: Some(42) },
            }))
            .await;

        assert_eq!(
            events.recv().await.unwrap(),
            NodeEvent::NodeConnect { identifier: "Main Node".to_string() }
        );
        let state = player.lock().await;
        assert_eq!(state.position, 1200);
        assert_eq!(state.voice_ping, Some(42));
    }

    #[tokio::test]
    async fn test_finished_track_with_empty_queue_emits_queue_end() {
        let mut client = MockNodeClient::new();
        client.expect_update_player().returning(|_, _| Ok(()));
        let manager = manager_with(client);
        let player = manager.create_player(player_options(3)).await;
        player.enqueue(vec![track("a", "A")]).await.unwrap();
        let mut events = manager.subscribe();

        manager.handle_message(track_end(3, TrackEndReason::Finished)).await;

        assert!(matches!(events.recv().await.unwrap(), NodeEvent::TrackEnd { .. }));
        match events.recv().await.unwrap() {
            NodeEvent::QueueEnd { guild_id, track, text_channel } => {
                assert_eq!(guild_id, GuildId::new(3));
                assert_eq!(track.map(|t| t.info.title), Some("A".to_string()));
                assert_eq!(text_channel, Some(serenity::model::id::ChannelId::new(20)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(player.lock().await.queue.previous().map(|t| t.info.identifier.clone()), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_events_for_unknown_guilds_are_dropped() {
        let manager = manager_with(MockNodeClient::new());
        let mut events = manager.subscribe();

        manager.handle_message(track_end(0, TrackEndReason::Finished)).await;
        manager.handle_message(track_end(8, TrackEndReason::Finished)).await;

        assert!(events.try_recv().is_err());
    }
}
