//! Tracks are the node's own `TrackData`; the Discord user that queued one travels in
//! its `userData`, so the node echoes it back in every track event.

use lavalink_rs::model::track::TrackData;
use serde_json::{Map, Value};
use serenity::model::id::UserId;
use std::{num::NonZeroU64, time::Duration};

pub type Track = TrackData;

const REQUESTER_KEY: &str = "requester";

pub trait TrackExt {
    /// Discord user that queued the track.
    fn requester(&self) -> Option<UserId>;

    fn with_requester(self, requester: Option<UserId>) -> Self;

    fn duration(&self) -> Duration;

    /// Same underlying audio, regardless of who queued it.
    fn same_audio(&self, other: &Track) -> bool;
}

impl TrackExt for Track {
    fn requester(&self) -> Option<UserId> {
        self.user_data
            .as_ref()?
            .get(REQUESTER_KEY)?
            .as_str()?
            .parse::<NonZeroU64>()
            .ok()
            .map(UserId::from)
    }

    fn with_requester(mut self, requester: Option<UserId>) -> Self {
        let mut data = match self.user_data.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        match requester {
            Some(id) => {
                data.insert(REQUESTER_KEY.to_string(), Value::String(id.to_string()));
            }
            None => {
                data.remove(REQUESTER_KEY);
            }
        }
        self.user_data = (!data.is_empty()).then_some(Value::Object(data));
        self
    }

    fn duration(&self) -> Duration {
        Duration::from_millis(self.info.length)
    }

    fn same_audio(&self, other: &Track) -> bool {
        self.encoded == other.encoded
    }
}
