//! Sliding-window media playlist.
//!
//! A live HLS playlist holds the newest N segments; older entries fall off
//! the front and the media sequence number advances so players keep their
//! place. Encoding is pure with respect to playlist state.

use std::collections::VecDeque;
use std::fmt::Write;

#[derive(Debug, Clone)]
struct Entry {
    uri: String,
    duration: f64,
}

/// Fixed-window live media playlist.
#[derive(Debug)]
pub struct SlidingPlaylist {
    window: usize,
    /// First media sequence number currently in the window.
    sequence: u64,
    entries: VecDeque<Entry>,
}

impl SlidingPlaylist {
    /// `window` is the number of visible entries; `capacity` only sizes the
    /// backing ring.
    pub fn new(window: usize, capacity: usize) -> Self {
        Self {
            window: window.max(1),
            sequence: 0,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a segment and evict the oldest entry beyond the window.
    pub fn slide(&mut self, uri: String, duration: f64) {
        self.entries.push_back(Entry { uri, duration });
        while self.entries.len() > self.window {
            self.entries.pop_front();
            self.sequence += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Media sequence number of the first entry.
    pub fn media_sequence(&self) -> u64 {
        self.sequence
    }

    /// URIs currently visible, oldest first.
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.uri.as_str())
    }

    /// Render the playlist as M3U8 text.
    pub fn encode(&self) -> String {
        let target_duration = self
            .entries
            .iter()
            .map(|e| e.duration.ceil() as u64)
            .max()
            .unwrap_or(0);

        let mut out = String::with_capacity(128 + self.entries.len() * 64);
        out.push_str("#EXTM3U\n");
        out.push_str("#EXT-X-VERSION:3\n");
        let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:{}", self.sequence);
        let _ = writeln!(out, "#EXT-X-TARGETDURATION:{target_duration}");
        for entry in &self.entries {
            let _ = writeln!(out, "#EXTINF:{:.3},", entry.duration);
            out.push_str(&entry.uri);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_slides_and_sequence_advances() {
        let mut playlist = SlidingPlaylist::new(5, 10);
        for i in 0..8 {
            playlist.slide(format!("/fp/{i}/live.ts"), 1.0);
        }

        assert_eq!(playlist.len(), 5);
        assert_eq!(playlist.media_sequence(), 3);
        let uris: Vec<&str> = playlist.uris().collect();
        assert_eq!(uris[0], "/fp/3/live.ts");
        assert_eq!(uris[4], "/fp/7/live.ts");
    }

    #[test]
    fn test_encode_shape() {
        let mut playlist = SlidingPlaylist::new(5, 10);
        playlist.slide("/fp/0/live.ts".to_string(), 1.0);
        playlist.slide("/fp/1/live.ts".to_string(), 1.0);

        let text = playlist.encode();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXT-X-VERSION:3");
        assert_eq!(lines[2], "#EXT-X-MEDIA-SEQUENCE:0");
        assert_eq!(lines[3], "#EXT-X-TARGETDURATION:1");
        assert_eq!(lines[4], "#EXTINF:1.000,");
        assert_eq!(lines[5], "/fp/0/live.ts");
        assert_eq!(lines[7], "/fp/1/live.ts");
    }

    #[test]
    fn test_encode_is_pure() {
        let mut playlist = SlidingPlaylist::new(5, 10);
        playlist.slide("/fp/0/live.ts".to_string(), 1.0);
        assert_eq!(playlist.encode(), playlist.encode());
    }

    #[test]
    fn test_empty_playlist_still_encodes() {
        let playlist = SlidingPlaylist::new(5, 10);
        let text = playlist.encode();
        assert!(text.starts_with("#EXTM3U"));
        assert!(text.contains("#EXT-X-TARGETDURATION:0"));
        assert!(!text.contains("#EXTINF"));
    }

    #[test]
    fn test_fractional_duration_rounds_up() {
        let mut playlist = SlidingPlaylist::new(5, 10);
        playlist.slide("/fp/0/live.ts".to_string(), 1.5);
        assert!(playlist.encode().contains("#EXT-X-TARGETDURATION:2"));
    }
}
