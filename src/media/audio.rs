//! Audio player state machine. The host element reports load, time and end
//! events; the player decides what plays next.

use serde::Serialize;

use super::playlist::{Playlist, Track};

pub const DEFAULT_VOLUME: f64 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioPlayer {
    tracks: Vec<Track>,
    current: usize,
    playing: bool,
    current_time: f64,
    duration: f64,
    volume: f64,
    muted: bool,
}

impl AudioPlayer {
    pub fn new(playlist: Playlist) -> Self {
        Self {
            tracks: playlist.tracks,
            current: 0,
            playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
            muted: false,
        }
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Loads track `index` and starts playing it. Out-of-range indices are
    /// ignored.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        self.load(index);
        self.playing = true;
        true
    }

    pub fn toggle_play(&mut self) {
        if self.tracks.is_empty() {
            return;
        }
        self.playing = !self.playing;
    }

    /// Metadata of the current track arrived.
    pub fn loaded(&mut self, duration: f64) {
        self.duration = if duration.is_finite() && duration > 0.0 {
            duration
        } else {
            0.0
        };
    }

    pub fn tick(&mut self, time: f64) {
        if !time.is_finite() {
            return;
        }
        self.current_time = self.clamp_time(time);
    }

    /// The current track finished: advance, or stop and rewind after the
    /// last one.
    pub fn ended(&mut self) {
        if self.current + 1 < self.tracks.len() {
            self.load(self.current + 1);
            self.playing = true;
        } else {
            self.current = 0;
            self.current_time = 0.0;
            self.playing = false;
        }
    }

    pub fn next(&mut self) {
        if self.tracks.is_empty() {
            return;
        }
        self.load((self.current + 1) % self.tracks.len());
    }

    pub fn previous(&mut self) {
        if self.tracks.is_empty() {
            return;
        }
        let index = if self.current == 0 {
            self.tracks.len() - 1
        } else {
            self.current - 1
        };
        self.load(index);
    }

    /// Seeks to the position clicked on a progress bar `width` pixels wide.
    pub fn seek_fraction(&mut self, offset: f64, width: f64) {
        if width.is_nan() || width <= 0.0 || self.duration <= 0.0 || !offset.is_finite() {
            return;
        }
        let fraction = (offset / width).clamp(0.0, 1.0);
        self.current_time = fraction * self.duration;
    }

    pub fn set_volume(&mut self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.muted = self.volume == 0.0;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    fn load(&mut self, index: usize) {
        self.current = index;
        self.current_time = 0.0;
        self.duration = 0.0;
    }

    fn clamp_time(&self, time: f64) -> f64 {
        if self.duration > 0.0 {
            time.clamp(0.0, self.duration)
        } else {
            time.max(0.0)
        }
    }
}

/// Formats seconds as `m:ss`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
