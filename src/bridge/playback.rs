use serde_json::json;
use std::sync::Arc;

use super::MusicBridge;
use crate::{
    lavalink::{
        player::AutoplayState,
        queue::LoopMode,
        PlayerHandle,
    },
    script::{Args, BridgeError, Invocation, ScriptValue},
};

const MAX_VOLUME: i64 = 1000;

fn volume_arg(raw: i64) -> Result<u16, BridgeError> {
    u16::try_from(raw)
        .ok()
        .filter(|v| i64::from(*v) <= MAX_VOLUME)
        .ok_or_else(|| BridgeError::invalid("volume", raw.to_string(), "a number between 0 and 1000"))
}

impl MusicBridge {
    /// `$playTrack[query;source?]`
    pub(super) async fn play_track(
        &self,
        player: &Arc<PlayerHandle>,
        invocation: &Invocation,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let query = args.require_text("query")?;
        let source = args.text("source").unwrap_or("youtube");

        let result = self.node.search(query, source, invocation.author).await?;
        let tracks = match result.playlist {
            Some(_) => result.tracks,
            None => result.tracks.into_iter().take(1).collect(),
        };
        if tracks.is_empty() {
            return Err(BridgeError::NoTracks);
        }

        player.enqueue(tracks).await?;
        Ok(ScriptValue::Null)
    }

    /// `$autoPlay[enable?;returnState?]`, toggles when `enable` is absent. The source of
    /// recommendations follows the previous track.
    pub(super) async fn auto_play(
        &self,
        player: &Arc<PlayerHandle>,
        invocation: &Invocation,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let mut state = player.lock().await;
        let enabled = args
            .flag("enable")
            .unwrap_or(!state.attributes.autoplay.enabled);

        state.attributes.autoplay = AutoplayState {
            enabled,
            requester: invocation.author,
            previous: state.queue.current().cloned(),
        };

        Ok(match args.flag("returnState") {
            Some(true) => ScriptValue::Bool(enabled),
            _ => ScriptValue::Null,
        })
    }

    /// `$seek[ms]`; null when the current track cannot seek that far.
    pub(super) async fn seek(&self, player: &Arc<PlayerHandle>, args: &Args) -> Result<ScriptValue, BridgeError> {
        let raw = args.require_integer("ms")?;
        let position = u64::try_from(raw)
            .map_err(|_| BridgeError::invalid("ms", raw.to_string(), "a position in milliseconds"))?;

        Ok(match player.seek(position).await? {
            true => ScriptValue::Integer(raw),
            false => ScriptValue::Null,
        })
    }

    /// `$skipTrack`: title of the track now playing, null when the queue ran out.
    pub(super) async fn skip_track(&self, player: &Arc<PlayerHandle>) -> Result<ScriptValue, BridgeError> {
        let next = self.node.skip(player).await?;
        Ok(next.map(|track| track.info.title).into())
    }

    /// `$skipTo[position;returnTrack?]`
    pub(super) async fn skip_to(&self, player: &Arc<PlayerHandle>, args: &Args) -> Result<ScriptValue, BridgeError> {
        let raw = args.require_integer("position")?;
        let position = usize::try_from(raw)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| BridgeError::invalid("position", raw.to_string(), "a queue position from 1"))?;

        {
            let mut state = player.lock().await;
            if position > state.queue.len() {
                return Ok(ScriptValue::Null);
            }
            state.queue.remove_before(position);
        }

        let next = self.node.skip(player).await?;
        Ok(match args.flag("returnTrack") {
            Some(true) => next.map(|track| track.info.title).into(),
            _ => ScriptValue::Null,
        })
    }

    /// `$stop`: clears the queue and stops, the player stays connected.
    pub(super) async fn stop(&self, player: &Arc<PlayerHandle>) -> Result<ScriptValue, BridgeError> {
        player.stop().await?;
        Ok(ScriptValue::Null)
    }

    /// `$pause[returnState?]` and `$resumeTrack[returnState?]`
    pub(super) async fn set_paused(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
        paused: bool,
    ) -> Result<ScriptValue, BridgeError> {
        player.set_paused(paused).await?;
        Ok(match args.flag("returnState") {
            Some(true) => ScriptValue::Bool(player.lock().await.paused),
            _ => ScriptValue::Null,
        })
    }

    /// `$setVolume[volume;returnVolume?]`
    pub(super) async fn set_volume(&self, player: &Arc<PlayerHandle>, args: &Args) -> Result<ScriptValue, BridgeError> {
        let volume = volume_arg(args.require_integer("volume")?)?;
        player.set_volume(volume).await?;

        Ok(match args.flag("returnVolume") {
            Some(true) => ScriptValue::Integer(i64::from(volume)),
            _ => ScriptValue::Null,
        })
    }

    /// `$volume[volume?]`: reads the session volume, or sets it like `$setVolume[volume;true]`.
    pub(super) async fn volume(&self, player: &Arc<PlayerHandle>, args: &Args) -> Result<ScriptValue, BridgeError> {
        let Some(raw) = args.integer("volume") else {
            let state = player.lock().await;
            return Ok(ScriptValue::Integer(i64::from(state.effective_volume())));
        };

        let volume = volume_arg(raw)?;
        player.set_volume(volume).await?;
        Ok(ScriptValue::Integer(i64::from(volume)))
    }

    /// `$loopMode[mode?]`
    pub(super) async fn loop_mode(&self, player: &Arc<PlayerHandle>, args: &Args) -> Result<ScriptValue, BridgeError> {
        let mut state = player.lock().await;
        if let Some(raw) = args.text("mode") {
            state.loop_mode = raw
                .parse::<LoopMode>()
                .map_err(|value| BridgeError::invalid("mode", value, "none, track or queue"))?;
        }
        Ok(ScriptValue::Text(state.loop_mode.to_string()))
    }

    /// `$loop[type?]`: toggles a track or queue loop, `none` clears it.
    pub(super) async fn toggle_loop(&self, player: &Arc<PlayerHandle>, args: &Args) -> Result<ScriptValue, BridgeError> {
        let wanted = args
            .text("type")
            .unwrap_or("track")
            .parse::<LoopMode>()
            .map_err(|value| BridgeError::invalid("type", value, "none, track or queue"))?;

        let mut state = player.lock().await;
        state.loop_mode = if wanted == state.loop_mode {
            LoopMode::None
        } else {
            wanted
        };
        Ok(ScriptValue::Text(state.loop_mode.to_string()))
    }

    /// `$loopStatus`
    pub(super) async fn loop_status(&self, player: &Arc<PlayerHandle>) -> Result<ScriptValue, BridgeError> {
        Ok(ScriptValue::Text(player.lock().await.loop_mode.to_string()))
    }

    /// `$playerStatus`: connection state with playback flags, as JSON.
    pub(super) async fn player_status(&self, player: &Arc<PlayerHandle>) -> Result<ScriptValue, BridgeError> {
        let state = player.lock().await;
        Ok(ScriptValue::Json(json!({
            "state": state.status.to_string(),
            "playing": state.playing,
            "paused": state.paused,
            "position": state.position,
            "volume": state.effective_volume(),
            "createdAt": state.created_at.to_rfc3339(),
        })))
    }
}
