//! Continues a finished queue with a recommendation based on the last played track.

use std::sync::Arc;
use tracing::debug;

use super::{error::NodeError, manager::NodeManager, player::PlayerHandle, track::Track};

const SPOTIFY_SEEDS: usize = 5;

/// Search query and source for tracks related to `previous`, or `None` when its source
/// has no recommendation endpoint.
pub fn recommendation_query(previous: &Track, history: &[Track]) -> Option<(String, &'static str)> {
    match previous.info.source_name.as_str() {
        "youtube" | "youtubemusic" => {
            let id = &previous.info.identifier;
            Some((
                format!("https://www.youtube.com/watch?v={id}&list=RD{id}"),
                "youtube",
            ))
        }
        "spotify" => {
            let seeds: Vec<&str> = history
                .iter()
                .rev()
                .filter(|t| t.info.source_name == "spotify")
                .take(SPOTIFY_SEEDS)
                .filter_map(spotify_id)
                .collect();
            (seeds.len() >= 2).then(|| (format!("seed_tracks={}", seeds.join(",")), "sprec"))
        }
        _ => None,
    }
}

fn spotify_id(track: &Track) -> Option<&str> {
    if !track.info.identifier.is_empty() {
        return Some(track.info.identifier.as_str());
    }
    track
        .info
        .uri
        .as_deref()
        .and_then(|uri| uri.rsplit('/').find(|part| !part.is_empty()))
}

/// Queues one recommended track when autoplay is enabled for the player, starting playback
/// if the player is idle. Returns the queued track.
pub async fn continue_playback(
    manager: &NodeManager,
    player: &Arc<PlayerHandle>,
) -> Result<Option<Track>, NodeError> {
    let (previous, history, requester) = {
        let state = player.lock().await;
        let autoplay = &state.attributes.autoplay;
        if !autoplay.enabled {
            return Ok(None);
        }
        let previous = state.queue.previous().cloned().or_else(|| autoplay.previous.clone());
        (previous, state.queue.history().to_vec(), autoplay.requester)
    };

    let Some(previous) = previous else {
        return Ok(None);
    };
    let Some((query, source)) = recommendation_query(&previous, &history) else {
        debug!("No autoplay source for {}", previous.info.source_name);
        return Ok(None);
    };

    let result = manager.search(&query, source, requester).await?;
    // The node ranks recommendations, so the best one is the first that is not a repeat
    let Some(next) = result
        .tracks
        .into_iter()
        .find(|t| t.info.identifier != previous.info.identifier)
    else {
        return Ok(None);
    };

    player.lock().await.attributes.autoplay.previous = Some(next.clone());
    player.enqueue(vec![next.clone()]).await?;
    Ok(Some(next))
}
