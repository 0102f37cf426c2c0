use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt, str::FromStr};
use tracing::debug;

use super::track::{Track, TrackExt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    None,
    Track,
    Queue,
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(LoopMode::None),
            "track" | "song" => Ok(LoopMode::Track),
            "queue" => Ok(LoopMode::Queue),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopMode::None => "none",
            LoopMode::Track => "track",
            LoopMode::Queue => "queue",
        })
    }
}

/// Current track, play history and upcoming tracks of one player.
#[derive(Debug, Clone)]
pub struct TrackQueue {
    current: Option<Track>,
    previous: Vec<Track>,
    tracks: VecDeque<Track>,
    max_previous: usize,
}

impl Default for TrackQueue {
    fn default() -> Self {
        Self::new(50)
    }
}

impl TrackQueue {
    pub fn new(max_previous: usize) -> Self {
        Self {
            current: None,
            previous: Vec::new(),
            tracks: VecDeque::new(),
            max_previous,
        }
    }

    pub fn add(&mut self, track: Track) {
        debug!("➕ Queued: {}", track.info.title);
        self.tracks.push_back(track);
    }

    pub fn add_many(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.tracks.len();
        self.tracks.extend(tracks);
        self.tracks.len() - before
    }

    /// Moves to the next track honoring the loop mode and returns the new current track.
    pub fn advance(&mut self, loop_mode: LoopMode) -> Option<&Track> {
        if let Some(current) = self.current.take() {
            if loop_mode == LoopMode::Track {
                self.current = Some(current);
                return self.current.as_ref();
            }

            if loop_mode == LoopMode::Queue {
                self.tracks.push_back(current.clone());
            }
            self.push_previous(current);
        }

        self.current = self.tracks.pop_front();
        self.current.as_ref()
    }

    /// Drops the current track into history without starting another one.
    pub fn finish_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.push_previous(current);
        }
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Most recently finished track.
    pub fn previous(&self) -> Option<&Track> {
        self.previous.last()
    }

    /// Play history, oldest first.
    pub fn history(&self) -> &[Track] {
        &self.previous
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// `0` is the previous track, `1` the current one, `n > 1` the `(n - 1)`-th upcoming track.
    pub fn track_at(&self, position: usize) -> Option<&Track> {
        match position {
            0 => self.previous(),
            1 => self.current(),
            n => self.tracks.get(n - 2),
        }
    }

    /// Removes the upcoming track at a 1-based position.
    pub fn remove(&mut self, position: usize) -> Option<Track> {
        let removed = position.checked_sub(1).and_then(|index| self.tracks.remove(index));
        if removed.is_some() {
            debug!("❌ Removed queue position {}", position);
        }
        removed
    }

    /// Drops every upcoming track before the 1-based `position`, returning how many were dropped.
    pub fn remove_before(&mut self, position: usize) -> usize {
        let count = position.saturating_sub(1).min(self.tracks.len());
        self.tracks.drain(..count);
        count
    }

    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.iter().cloned().collect()
    }

    pub fn shuffle(&mut self) {
        let mut items: Vec<_> = self.tracks.drain(..).collect();
        let mut rng = rand::thread_rng();
        items.shuffle(&mut rng);
        self.tracks.extend(items);
        debug!("🔀 Queue shuffled");
    }

    /// Reorders upcoming tracks to follow `order`. Tracks absent from `order` keep their
    /// relative order and go last; entries of `order` no longer queued are ignored.
    pub fn restore_order(&mut self, order: &[Track]) {
        let mut remaining: Vec<Option<Track>> = self.tracks.drain(..).map(Some).collect();
        let mut restored = VecDeque::with_capacity(remaining.len());

        for wanted in order {
            let found = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|t| t.same_audio(wanted)));
            if let Some(slot) = found {
                if let Some(track) = slot.take() {
                    restored.push_back(track);
                }
            }
        }

        restored.extend(remaining.into_iter().flatten());
        self.tracks = restored;
    }

    /// One page of upcoming tracks, with 1-based queue positions. Pages past the end
    /// are empty.
    pub fn page(&self, page: usize, per_page: usize) -> Vec<(usize, &Track)> {
        let per_page = per_page.max(1);
        let Some(start) = page.max(1).checked_sub(1).and_then(|p| p.checked_mul(per_page)) else {
            return Vec::new();
        };

        self.tracks
            .iter()
            .enumerate()
            .skip(start)
            .take(per_page)
            .map(|(index, track)| (index + 1, track))
            .collect()
    }

    fn push_previous(&mut self, track: Track) {
        self.previous.push(track);
        if self.previous.len() > self.max_previous {
            self.previous.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::track;
    use pretty_assertions::assert_eq;

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.tracks().map(|t| t.info.title.clone()).collect()
    }

    fn filled(count: usize) -> TrackQueue {
        let mut queue = TrackQueue::default();
        queue.add_many((0..count).map(|i| track(&format!("id{i}"), &format!("song {i}"))));
        queue
    }

    #[test]
    fn test_advance_without_loop() {
        let mut queue = filled(2);

        assert_eq!(queue.advance(LoopMode::None).map(|t| t.info.title.as_str()), Some("song 0"));
        assert_eq!(queue.advance(LoopMode::None).map(|t| t.info.title.as_str()), Some("song 1"));
        assert_eq!(queue.previous().map(|t| t.info.title.as_str()), Some("song 0"));
        assert!(queue.advance(LoopMode::None).is_none());
        assert_eq!(queue.history().len(), 2);
    }

    #[test]
    fn test_advance_with_loops() {
        let mut queue = filled(2);
        queue.advance(LoopMode::None);

        assert_eq!(queue.advance(LoopMode::Track).map(|t| t.info.title.as_str()), Some("song 0"));

        queue.advance(LoopMode::Queue);
        assert_eq!(queue.current().map(|t| t.info.title.as_str()), Some("song 1"));
        assert_eq!(titles(&queue), vec!["song 0"]);
    }

    #[test]
    fn test_track_at_positions() {
        let mut queue = filled(4);
        queue.advance(LoopMode::None);
        queue.advance(LoopMode::None);

        assert_eq!(queue.track_at(0).map(|t| t.info.title.as_str()), Some("song 0"));
        assert_eq!(queue.track_at(1).map(|t| t.info.title.as_str()), Some("song 1"));
        assert_eq!(queue.track_at(2).map(|t| t.info.title.as_str()), Some("song 2"));
        assert_eq!(queue.track_at(3).map(|t| t.info.title.as_str()), Some("song 3"));
        assert!(queue.track_at(4).is_none());
        assert!(queue.track_at(400).is_none());
    }

    #[test]
    fn test_shuffle_keeps_tracks_and_restore_recovers_order() {
        let mut queue = filled(12);
        let before = titles(&queue);
        let snapshot = queue.snapshot();

        queue.shuffle();
        let mut shuffled = titles(&queue);
        shuffled.sort();
        let mut sorted_before = before.clone();
        sorted_before.sort();
        assert_eq!(shuffled, sorted_before);

        queue.restore_order(&snapshot);
        assert_eq!(titles(&queue), before);
    }

    #[test]
    fn test_restore_order_with_duplicates_and_new_tracks() {
        let mut queue = TrackQueue::default();
        queue.add(track("a", "A"));
        queue.add(track("b", "B"));
        queue.add(track("a", "A"));
        let snapshot = queue.snapshot();

        queue.shuffle();
        queue.add(track("c", "C"));
        queue.restore_order(&snapshot);

        assert_eq!(titles(&queue), vec!["A", "B", "A", "C"]);
    }

    #[test]
    fn test_remove_and_remove_before() {
        let mut queue = filled(5);

        assert_eq!(queue.remove(2).map(|t| t.info.title), Some("song 1".to_string()));
        assert!(queue.remove(0).is_none());
        assert!(queue.remove(10).is_none());

        assert_eq!(queue.remove_before(3), 2);
        assert_eq!(titles(&queue), vec!["song 3", "song 4"]);
    }

    #[test]
    fn test_pages() {
        let queue = filled(25);
        let page = queue.page(3, 10);

        assert_eq!(page.len(), 5);
        assert_eq!(page[0].0, 21);
        assert_eq!(queue.page(0, 10)[0].0, 1);
        assert!(queue.page(9, 10).is_empty());
    }

    #[test]
    fn test_huge_page_numbers_are_empty() {
        let queue = filled(3);

        assert!(queue.page(usize::MAX, 10).is_empty());
        assert!(queue.page(i64::MAX as usize, 10).is_empty());
        assert!(queue.page(2, usize::MAX).is_empty());
    }

    #[test]
    fn test_loop_mode_parsing() {
        assert_eq!("Queue".parse::<LoopMode>(), Ok(LoopMode::Queue));
        assert_eq!("off".parse::<LoopMode>(), Ok(LoopMode::None));
        assert!("forever".parse::<LoopMode>().is_err());
    }
}
