use crate::circular_queue::CircularQueue;

use nalgebra as na;
use serde_derive::Serialize;
use std::collections::HashMap;
use tracing::debug;

pub const HISTORY_CAPACITY: usize = 100;

// px of horizontal movement ignored when deciding direction
const DIRECTION_DEAD_ZONE: f32 = 5.0;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Unknown,
}

/// Motion record of one identity. Positions and timestamps live in one
/// queue so both sequences always have the same length.
#[derive(Debug, Clone)]
pub struct Track {
    pub track_id: i32,
    history: CircularQueue<(f64, na::Point2<f32>)>,
    pub direction: Direction,
    pub direction_changes: u32,
    pub hits_count: u32,
    pub last_update_sec: f64,
}

impl Track {
    pub fn new(track_id: i32, ts_sec: f64, pos: na::Point2<f32>) -> Self {
        let mut history = CircularQueue::with_capacity(HISTORY_CAPACITY);
        history.push((ts_sec, pos));

        Self {
            track_id,
            history,
            direction: Direction::Unknown,
            direction_changes: 0,
            hits_count: 1,
            last_update_sec: ts_sec,
        }
    }

    pub fn update(&mut self, ts_sec: f64, pos: na::Point2<f32>) {
        let prev_x = self.position().x;

        self.history.push((ts_sec, pos));
        self.hits_count = self.hits_count.saturating_add(1);
        self.last_update_sec = ts_sec;

        let direction = if pos.x > prev_x + DIRECTION_DEAD_ZONE {
            Direction::Right
        } else if pos.x < prev_x - DIRECTION_DEAD_ZONE {
            Direction::Left
        } else {
            self.direction
        };

        if self.direction != Direction::Unknown && direction != self.direction {
            self.direction_changes += 1;
        }

        self.direction = direction;
    }

    /// True until the identity has been seen a second time.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.hits_count == 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Latest position.
    #[inline]
    pub fn position(&self) -> na::Point2<f32> {
        self.history
            .last()
            .map(|(_, p)| *p)
            .unwrap_or_else(na::Point2::origin)
    }

    /// Time covered by the retained history.
    pub fn duration(&self) -> f64 {
        match (self.history.first(), self.history.last()) {
            (Some((first, _)), Some((last, _))) => last - first,
            _ => 0.0,
        }
    }

    #[inline]
    pub fn positions(&self) -> impl Iterator<Item = &na::Point2<f32>> {
        self.history.iter().map(|(_, p)| p)
    }

    #[inline]
    pub fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().map(|(ts, _)| *ts)
    }

    #[inline]
    pub fn recent_positions(&self, n: usize) -> impl Iterator<Item = &na::Point2<f32>> {
        self.history.recent(n).map(|(_, p)| p)
    }

    pub fn reset_direction_changes(&mut self) {
        self.direction_changes = 0;
    }
}

#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: HashMap<i32, Track>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the track on first sighting, otherwise appends to its history.
    pub fn update(&mut self, track_id: i32, pos: na::Point2<f32>, ts_sec: f64) -> &Track {
        let track = self
            .tracks
            .entry(track_id)
            .and_modify(|t| t.update(ts_sec, pos))
            .or_insert_with(|| {
                debug!(track_id, x = pos.x, y = pos.y, "new track");
                Track::new(track_id, ts_sec, pos)
            });

        track
    }

    #[inline]
    pub fn get(&self, track_id: i32) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    #[inline]
    pub fn get_mut(&mut self, track_id: i32) -> Option<&mut Track> {
        self.tracks.get_mut(&track_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Drops tracks that have not been updated for more than `max_idle_sec`
    /// and returns their ids.
    pub fn evict_stale(&mut self, now_sec: f64, max_idle_sec: f64) -> Vec<i32> {
        let mut evicted = Vec::new();

        self.tracks.retain(|id, t| {
            let keep = now_sec - t.last_update_sec <= max_idle_sec;
            if !keep {
                evicted.push(*id);
            }
            keep
        });

        for id in &evicted {
            debug!(track_id = id, "evicted stale track");
        }

        evicted
    }
}
