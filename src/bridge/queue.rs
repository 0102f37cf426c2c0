use std::{sync::Arc, time::Duration};

use super::MusicBridge;
use crate::{
    lavalink::{PlayerHandle, Track, TrackExt},
    script::{Args, BridgeError, ScriptValue},
};

pub(super) fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn track_duration(track: &Track) -> String {
    if track.info.is_stream {
        "LIVE".to_string()
    } else {
        format_duration(track.duration())
    }
}

fn requester(track: &Track) -> String {
    track.requester().map(|id| id.to_string()).unwrap_or_default()
}

/// One `$trackInfo` property of a track.
fn track_property(track: &Track, property: &str) -> Result<ScriptValue, BridgeError> {
    let info = &track.info;
    Ok(match property.to_lowercase().as_str() {
        "title" => info.title.clone().into(),
        "author" => info.author.clone().into(),
        "uri" | "url" => info.uri.clone().into(),
        "identifier" => info.identifier.clone().into(),
        "length" => ScriptValue::Integer(i64::try_from(info.length).unwrap_or(i64::MAX)),
        "duration" => track_duration(track).into(),
        "isstream" => info.is_stream.into(),
        "isseekable" => info.is_seekable.into(),
        "sourcename" => info.source_name.clone().into(),
        "artworkurl" | "thumbnail" => info.artwork_url.clone().into(),
        "isrc" => info.isrc.clone().into(),
        "requester" => track.requester().map(|id| id.to_string()).into(),
        "encoded" => track.encoded.clone().into(),
        "json" => serde_json::to_value(track).unwrap_or_default().into(),
        _ => {
            return Err(BridgeError::invalid(
                "property",
                property,
                "title, author, uri, identifier, length, duration, isStream, isSeekable, \
                 sourceName, artworkUrl, isrc, requester, encoded or json",
            ))
        }
    })
}

fn titles<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> Vec<String> {
    tracks.into_iter().map(|t| t.info.title.clone()).collect()
}

impl MusicBridge {
    /// `$trackInfo[property?;position?]`
    pub(super) async fn track_info(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let property = args.text("property").unwrap_or("title");
        let position = args.integer("position").unwrap_or(1);

        let state = player.lock().await;
        let track = usize::try_from(position)
            .ok()
            .and_then(|p| state.queue.track_at(p));

        match track {
            Some(track) => track_property(track, property),
            None => Ok(ScriptValue::Null),
        }
    }

    /// `$clearQueue`: drops upcoming tracks, the current one keeps playing.
    pub(super) async fn clear_queue(&self, player: &Arc<PlayerHandle>) -> Result<ScriptValue, BridgeError> {
        player.lock().await.queue.clear();
        Ok(ScriptValue::Null)
    }

    /// `$shuffleQueue[returnQueue?;returnOldQueue?]`
    pub(super) async fn shuffle_queue(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let mut state = player.lock().await;
        let old = state.queue.snapshot();

        // Repeated shuffles keep the order from before the first one
        if state.attributes.shuffle.is_none() {
            state.attributes.shuffle = Some(old.clone());
        }
        state.queue.shuffle();

        Ok(if args.flag("returnQueue") == Some(true) {
            ScriptValue::List(titles(state.queue.tracks()))
        } else if args.flag("returnOldQueue") == Some(true) {
            ScriptValue::List(titles(&old))
        } else {
            ScriptValue::Null
        })
    }

    /// `$unShuffleQueue[returnQueue?]`: null when the queue was never shuffled.
    pub(super) async fn unshuffle_queue(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let mut state = player.lock().await;
        let Some(order) = state.attributes.shuffle.take() else {
            return Ok(ScriptValue::Null);
        };
        state.queue.restore_order(&order);

        Ok(match args.flag("returnQueue") {
            Some(true) => ScriptValue::List(titles(state.queue.tracks())),
            _ => ScriptValue::Null,
        })
    }

    /// `$queue[page?;limit?;format?]`
    ///
    /// `format` placeholders: `{position}`, `{title}`, `{author}`, `{uri}`, `{duration}`,
    /// `{requester}`, `{identifier}`.
    pub(super) async fn queue_page(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let page = args.integer("page").unwrap_or(1);
        let limit = args.integer("limit").unwrap_or(10);
        let format = args.text("format").unwrap_or("{position}. {title}");

        let page = usize::try_from(page)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| BridgeError::invalid("page", page.to_string(), "a page number from 1"))?;
        let limit = usize::try_from(limit)
            .ok()
            .filter(|l| *l >= 1)
            .ok_or_else(|| BridgeError::invalid("limit", limit.to_string(), "a positive number"))?;

        let state = player.lock().await;
        let lines: Vec<String> = state
            .queue
            .page(page, limit)
            .into_iter()
            .map(|(position, track)| {
                format
                    .replace("{position}", &position.to_string())
                    .replace("{title}", &track.info.title)
                    .replace("{author}", &track.info.author)
                    .replace("{uri}", track.info.uri.as_deref().unwrap_or_default())
                    .replace("{duration}", &track_duration(track))
                    .replace("{requester}", &requester(track))
                    .replace("{identifier}", &track.info.identifier)
            })
            .collect();

        Ok(if lines.is_empty() {
            ScriptValue::Null
        } else {
            ScriptValue::Text(lines.join("\n"))
        })
    }

    /// `$removeTrack[position]`: title of the removed track, null when out of range.
    pub(super) async fn remove_track(
        &self,
        player: &Arc<PlayerHandle>,
        args: &Args,
    ) -> Result<ScriptValue, BridgeError> {
        let raw = args.require_integer("position")?;
        let Ok(position) = usize::try_from(raw) else {
            return Ok(ScriptValue::Null);
        };

        let removed = player.lock().await.queue.remove(position);
        Ok(removed.map(|track| track.info.title).into())
    }

    /// `$queueLength`
    pub(super) async fn queue_length(&self, player: &Arc<PlayerHandle>) -> Result<ScriptValue, BridgeError> {
        let len = player.lock().await.queue.len();
        Ok(ScriptValue::Integer(i64::try_from(len).unwrap_or(i64::MAX)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::voice::MockVoiceGateway;
    use crate::lavalink::{client::MockNodeClient, queue::LoopMode};
    use crate::script::{interpreter::MockScriptOutput, TemplateInterpreter};
    use crate::test_support::{bridge_with, invocation, manager_with, player_options, track};
    use pretty_assertions::assert_eq;

    async fn run(bridge: Arc<MusicBridge>, code: &str) -> String {
        TemplateInterpreter::new(bridge, Arc::new(MockScriptOutput::new()))
            .evaluate(&invocation(code))
            .await
            .unwrap()
    }

    /// Bridge with a player that finished `prev`, is playing `now` and has `count` tracks queued.
    async fn bridge_with_queue(count: usize) -> (Arc<MusicBridge>, Arc<PlayerHandle>) {
        let node = manager_with(MockNodeClient::new());
        let player = node.create_player(player_options(1)).await;
        {
            let mut state = player.lock().await;
            state.queue.add(track("prev", "Previous"));
            state.queue.add(track("now", "Now"));
            state.queue.advance(LoopMode::None);
            state.queue.advance(LoopMode::None);
            state.queue.add_many((1..=count).map(|i| track(&format!("q{i}"), &format!("Song {i}"))));
        }
        (Arc::new(bridge_with(node, MockVoiceGateway::new())), player)
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(3 * 60 + 5)), "3:05");
        assert_eq!(format_duration(Duration::from_secs(3600 + 61)), "1:01:01");
    }

    #[tokio::test]
    async fn test_track_info_positions() {
        let (bridge, _player) = bridge_with_queue(2).await;

        assert_eq!(run(bridge.clone(), "$trackInfo[title;0]").await, "Previous");
        assert_eq!(run(bridge.clone(), "$trackInfo").await, "Now");
        assert_eq!(run(bridge.clone(), "$trackInfo[title;2]").await, "Song 1");
        assert_eq!(run(bridge.clone(), "$trackInfo[title;3]").await, "Song 2");
        assert_eq!(run(bridge.clone(), "[$trackInfo[title;4]]").await, "[]");
        assert_eq!(run(bridge.clone(), "[$trackInfo[title;-1]]").await, "[]");
        assert_eq!(run(bridge.clone(), "$trackInfo[duration]").await, "3:00");
        assert_eq!(run(bridge, "$trackInfo[requester]").await, "99");
    }

    #[tokio::test]
    async fn test_track_info_rejects_unknown_property() {
        let (bridge, _player) = bridge_with_queue(0).await;
        let error = TemplateInterpreter::new(bridge, Arc::new(MockScriptOutput::new()))
            .evaluate(&invocation("$trackInfo[colour]"))
            .await
            .unwrap_err();
        assert!(error.to_string().starts_with("❌ `$trackInfo`: invalid property `colour`"));
    }

    #[tokio::test]
    async fn test_shuffle_keeps_tracks_and_unshuffle_restores_order() {
        let (bridge, player) = bridge_with_queue(8).await;
        let before: Vec<String> = titles(player.lock().await.queue.tracks());

        assert_eq!(run(bridge.clone(), "$shuffleQueue").await, "");
        let mut shuffled = titles(player.lock().await.queue.tracks());
        shuffled.sort();
        let mut expected = before.clone();
        expected.sort();
        assert_eq!(shuffled, expected);

        assert_eq!(run(bridge.clone(), "$shuffleQueue[;true]").await.split(", ").count(), 8);
        assert_eq!(run(bridge.clone(), "$unShuffleQueue[true]").await, before.join(", "));
        assert!(player.lock().await.attributes.shuffle.is_none());
        assert_eq!(run(bridge, "$unShuffleQueue[true]").await, "");
    }

    #[tokio::test]
    async fn test_queue_page_formatting() {
        let (bridge, _player) = bridge_with_queue(3).await;

        assert_eq!(run(bridge.clone(), "$queue").await, "1. Song 1\n2. Song 2\n3. Song 3");
        assert_eq!(
            run(bridge.clone(), "$queue[2;2;{position}) {title} [{duration}]]").await,
            "3) Song 3 [3:00]"
        );
        assert_eq!(run(bridge, "$queue[5]").await, "");
    }

    #[tokio::test]
    async fn test_remove_and_length() {
        let (bridge, player) = bridge_with_queue(3).await;

        assert_eq!(run(bridge.clone(), "$removeTrack[2]").await, "Song 2");
        assert_eq!(run(bridge.clone(), "[$removeTrack[9]]").await, "[]");
        assert_eq!(run(bridge.clone(), "$queueLength").await, "2");
        assert_eq!(run(bridge.clone(), "$clearQueue$queueLength").await, "0");
        assert_eq!(player.lock().await.queue.current().map(|t| t.info.title.clone()), Some("Now".to_string()));
    }
}
