use std::sync::Arc;

use super::MusicBridge;
use crate::{
    lavalink::PlayerHandle,
    script::{Args, BridgeError, Invocation, ScriptValue},
};

impl MusicBridge {
    /// `$searchTrack[query;index?;format?;source?]`
    ///
    /// `index` is a 0-based hit or `all` for every title; `format` returns the raw track JSON.
    /// Works without a player.
    pub(super) async fn search_track(
        &self,
        invocation: &Invocation,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let query = args.require_text("query")?;
        let index = args.text("index").unwrap_or("0");
        let source = args.text("source").unwrap_or("youtube");
        let format = args.flag("format").unwrap_or(false);

        let result = self.node.search(query, source, invocation.author).await?;
        if result.tracks.is_empty() {
            return Err(BridgeError::NoTracks);
        }

        if index.eq_ignore_ascii_case("all") {
            return Ok(if format {
                ScriptValue::Text(serde_json::to_string_pretty(&result.tracks).unwrap_or_default())
            } else {
                ScriptValue::List(result.tracks.iter().map(|t| t.info.title.clone()).collect())
            });
        }

        let position: usize = index
            .parse()
            .map_err(|_| BridgeError::invalid("index", index, "a result number from 0 or `all`"))?;
        let Some(track) = result.tracks.get(position) else {
            return Ok(ScriptValue::Null);
        };

        Ok(if format {
            ScriptValue::Text(serde_json::to_string_pretty(track).unwrap_or_default())
        } else {
            ScriptValue::Text(track.info.title.clone())
        })
    }

    /// `$eventData[key?]`: payload of the node event that started the script. `key` is a
    /// dotted path such as `track.info.title`; text comes back unquoted, anything else as
    /// JSON. Null outside event scripts or for unknown keys.
    pub(super) fn event_data(&self, invocation: &Invocation, args: &Args) -> Result<ScriptValue, BridgeError> {
        let Some(payload) = invocation.event.as_ref() else {
            return Ok(ScriptValue::Null);
        };
        let value = match args.text("key") {
            Some(key) => {
                let pointer = format!("/{}", key.trim().replace('.', "/"));
                payload.pointer(&pointer)
            }
            None => Some(payload),
        };

        Ok(match value {
            None | Some(serde_json::Value::Null) => ScriptValue::Null,
            Some(serde_json::Value::String(text)) => ScriptValue::Text(text.clone()),
            Some(other) => ScriptValue::Json(other.clone()),
        })
    }

    /// `$voicePing`: Discord voice gateway ping as last reported by the node.
    pub(super) async fn voice_ping(&self, player: &Arc<PlayerHandle>) -> Result<ScriptValue, BridgeError> {
        Ok(player.lock().await.voice_ping.into())
    }

    /// `$lavalinkPing`: round trip of the last player update, in milliseconds.
    pub(super) async fn lavalink_ping(&self, player: &Arc<PlayerHandle>) -> Result<ScriptValue, BridgeError> {
        Ok(player
            .node_ping()
            .map(|rtt| i64::try_from(rtt.as_millis()).unwrap_or(i64::MAX))
            .into())
    }
}
