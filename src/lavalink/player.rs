use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{fmt, sync::Arc, time::Duration};
use tokio::{
    sync::{Mutex, MutexGuard},
    time::Instant,
};
use tracing::{debug, info};

use lavalink_rs::model::{
    events::TrackEndReason,
    http::{UpdatePlayer, UpdatePlayerTrack},
    player::{ConnectionInfo, Filters, State},
};

use super::{
    client::ClientSlot,
    error::NodeError,
    queue::{LoopMode, TrackQueue},
    track::Track,
};

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    pub guild_id: GuildId,
    pub voice_channel: ChannelId,
    pub text_channel: Option<ChannelId>,
    pub self_deaf: bool,
    pub self_mute: bool,
    pub volume: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlayerStatus::Connecting => "connecting",
            PlayerStatus::Connected => "connected",
            PlayerStatus::Disconnected => "disconnected",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoplayState {
    pub enabled: bool,
    pub requester: Option<UserId>,
    pub previous: Option<Track>,
}

/// Session values set by script functions and read back by others.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    pub volume: Option<u16>,
    pub autoplay: AutoplayState,
    /// Queue order captured before the last shuffle.
    pub shuffle: Option<Vec<Track>>,
}

#[derive(Debug)]
pub struct PlayerState {
    pub voice_channel: ChannelId,
    pub text_channel: Option<ChannelId>,
    pub self_deaf: bool,
    pub self_mute: bool,
    pub queue: TrackQueue,
    pub volume: u16,
    pub paused: bool,
    pub playing: bool,
    pub position: u64,
    pub connected: bool,
    /// Voice gateway ping as reported by the node, `None` while unknown.
    pub voice_ping: Option<i64>,
    pub filters: Filters,
    pub loop_mode: LoopMode,
    pub attributes: Attributes,
    pub status: PlayerStatus,
    pub created_at: DateTime<Utc>,
}

impl PlayerState {
    fn new(options: &PlayerOptions) -> Self {
        Self {
            voice_channel: options.voice_channel,
            text_channel: options.text_channel,
            self_deaf: options.self_deaf,
            self_mute: options.self_mute,
            queue: TrackQueue::default(),
            volume: options.volume,
            paused: false,
            playing: false,
            position: 0,
            connected: false,
            voice_ping: None,
            filters: Filters::default(),
            loop_mode: LoopMode::None,
            attributes: Attributes::default(),
            status: PlayerStatus::Connecting,
            created_at: Utc::now(),
        }
    }

    /// Volume scripts see: the session attribute when set, else the node volume.
    pub fn effective_volume(&self) -> u16 {
        self.attributes.volume.unwrap_or(self.volume)
    }

    pub fn is_idle(&self) -> bool {
        !self.playing && self.queue.current().is_none()
    }
}

/// What happened to the queue after a track ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Next(Track),
    QueueEnd(Option<Track>),
    Ignored,
}

/// One guild's playback session on the node.
pub struct PlayerHandle {
    guild_id: GuildId,
    client: Arc<ClientSlot>,
    state: Mutex<PlayerState>,
    node_ping: parking_lot::Mutex<Option<Duration>>,
}

impl PlayerHandle {
    pub fn new(options: PlayerOptions, client: Arc<ClientSlot>) -> Self {
        Self {
            guild_id: options.guild_id,
            client,
            state: Mutex::new(PlayerState::new(&options)),
            node_ping: parking_lot::Mutex::new(None),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub async fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().await
    }

    /// Round-trip time of the last player update sent to the node.
    pub fn node_ping(&self) -> Option<Duration> {
        *self.node_ping.lock()
    }

    async fn patch(&self, update: UpdatePlayer) -> Result<(), NodeError> {
        let started = Instant::now();
        self.client.get()?.update_player(self.guild_id, update).await?;
        *self.node_ping.lock() = Some(started.elapsed());
        Ok(())
    }

    async fn play_current(&self, state: &mut PlayerState) -> Result<Option<Track>, NodeError> {
        let Some(track) = state.queue.current().cloned() else {
            return Ok(None);
        };

        self.patch(UpdatePlayer {
            track: Some(UpdatePlayerTrack {
                encoded: Some(track.encoded.clone()),
                user_data: track.user_data.clone(),
                ..Default::default()
            }),
            position: Some(0),
            paused: Some(false),
            volume: Some(state.volume),
            ..Default::default()
        })
        .await?;

        state.playing = true;
        state.paused = false;
        state.position = 0;
        info!("🎵 Playing {} in {}", track.info.title, self.guild_id);
        Ok(Some(track))
    }

    async fn stop_track(&self, state: &mut PlayerState) -> Result<(), NodeError> {
        self.client.get()?.stop_track(self.guild_id).await?;

        state.playing = false;
        state.paused = false;
        state.position = 0;
        Ok(())
    }

    /// Hands the voice credentials to the node and applies the initial volume.
    pub async fn connect(&self, voice: ConnectionInfo) -> Result<(), NodeError> {
        let mut state = self.state.lock().await;
        state.status = PlayerStatus::Connecting;

        let result = match self.client.get() {
            Ok(client) => match client.create_player(self.guild_id, voice).await {
                Ok(()) => {
                    self.patch(UpdatePlayer {
                        volume: Some(state.volume),
                        ..Default::default()
                    })
                    .await
                }
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        state.status = if result.is_ok() {
            PlayerStatus::Connected
        } else {
            PlayerStatus::Disconnected
        };
        state.connected = result.is_ok();
        result
    }

    /// Queues tracks and starts playback when the player was idle. Returns the track that
    /// started, if any.
    pub async fn enqueue(&self, tracks: Vec<Track>) -> Result<Option<Track>, NodeError> {
        let mut state = self.state.lock().await;

        if !state.playing && state.paused {
            self.stop_track(&mut state).await?;
            state.queue.finish_current();
        }

        let idle = state.is_idle();
        let added = state.queue.add_many(tracks);
        debug!("➕ {} track(s) queued in {}", added, self.guild_id);

        if idle && added > 0 {
            state.queue.advance(LoopMode::None);
            return self.play_current(&mut state).await;
        }
        Ok(None)
    }

    /// Plays the next queued track. A track loop does not hold a manual skip; a queue loop
    /// still re-queues the skipped track. With nothing left the current track is stopped.
    pub async fn skip(&self) -> Result<Option<Track>, NodeError> {
        let mut state = self.state.lock().await;
        let mode = match state.loop_mode {
            LoopMode::Track => LoopMode::None,
            other => other,
        };

        if state.queue.advance(mode).is_some() {
            return self.play_current(&mut state).await;
        }

        self.stop_track(&mut state).await?;
        Ok(None)
    }

    /// Applies a node `TrackEndEvent` to the queue. Only natural ends advance it; stops
    /// and replacements are driven from our side.
    pub async fn track_ended(&self, reason: &TrackEndReason) -> Result<Advance, NodeError> {
        let mut state = self.state.lock().await;
        if !bool::from(reason.clone()) {
            return Ok(Advance::Ignored);
        }

        let ended = state.queue.current().cloned();
        let loop_mode = state.loop_mode;
        if state.queue.advance(loop_mode).is_some() {
            return Ok(match self.play_current(&mut state).await? {
                Some(track) => Advance::Next(track),
                None => Advance::Ignored,
            });
        }

        state.playing = false;
        state.position = 0;
        Ok(Advance::QueueEnd(ended))
    }

    pub async fn track_started(&self) {
        let mut state = self.state.lock().await;
        state.playing = true;
    }

    /// Clears the queue and stops playback; the session stays.
    pub async fn stop(&self) -> Result<(), NodeError> {
        let mut state = self.state.lock().await;
        state.queue.clear();
        state.queue.finish_current();
        self.stop_track(&mut state).await
    }

    pub async fn set_paused(&self, paused: bool) -> Result<(), NodeError> {
        let mut state = self.state.lock().await;
        self.patch(UpdatePlayer {
            paused: Some(paused),
            ..Default::default()
        })
        .await?;

        state.paused = paused;
        state.playing = !paused && state.queue.current().is_some();
        Ok(())
    }

    /// Seeks within the current track. Returns `false` without contacting the node when
    /// nothing seekable is playing or `position` is past its end.
    pub async fn seek(&self, position: u64) -> Result<bool, NodeError> {
        let mut state = self.state.lock().await;
        let seekable = state
            .queue
            .current()
            .is_some_and(|t| t.info.is_seekable && position <= t.info.length);
        if !seekable {
            return Ok(false);
        }

        self.patch(UpdatePlayer {
            position: Some(position),
            ..Default::default()
        })
        .await?;
        state.position = position;
        Ok(true)
    }

    pub async fn set_volume(&self, volume: u16) -> Result<(), NodeError> {
        let mut state = self.state.lock().await;
        self.patch(UpdatePlayer {
            volume: Some(volume),
            ..Default::default()
        })
        .await?;

        state.volume = volume;
        state.attributes.volume = Some(volume);
        debug!("🔊 Volume {} in {}", volume, self.guild_id);
        Ok(())
    }

    pub async fn set_filters(&self, filters: Filters) -> Result<(), NodeError> {
        let mut state = self.state.lock().await;
        self.patch(UpdatePlayer {
            filters: Some(filters.clone()),
            ..Default::default()
        })
        .await?;

        state.filters = filters;
        Ok(())
    }

    /// Applies a node `playerUpdate`.
    pub async fn update_state(&self, update: &State) {
        let mut state = self.state.lock().await;
        state.position = update.position;
        state.connected = update.connected;
        state.voice_ping = update.ping.map(i64::from);
        if !update.connected && state.status == PlayerStatus::Connected {
            state.status = PlayerStatus::Disconnected;
        }
    }

    pub async fn mark_disconnected(&self) {
        let mut state = self.state.lock().await;
        state.connected = false;
        state.playing = false;
        state.status = PlayerStatus::Disconnected;
    }
}

impl fmt::Debug for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerHandle")
            .field("guild_id", &self.guild_id)
            .finish_non_exhaustive()
    }
}
