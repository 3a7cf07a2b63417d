use std::collections::HashMap;

/// Multiplier applied to every known score once per processed frame.
pub const DECAY_FACTOR: f32 = 0.99;

/// Decaying per-identity suspicion. Scores have no ceiling; they only shrink
/// through decay.
#[derive(Debug, Default, Clone)]
pub struct SuspicionScorer {
    scores: HashMap<i32, f32>,
}

impl SuspicionScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) an identity at 0.0.
    pub fn insert(&mut self, track_id: i32) {
        self.scores.insert(track_id, 0.0);
    }

    /// Returns the score after the increment.
    pub fn increment(&mut self, track_id: i32, amount: f32) -> f32 {
        let score = self.scores.entry(track_id).or_insert(0.0);
        *score += amount;
        *score
    }

    /// Decays every known identity, including ones not seen this frame.
    pub fn decay_all(&mut self, factor: f32) {
        for score in self.scores.values_mut() {
            *score *= factor;
        }
    }

    #[inline]
    pub fn get(&self, track_id: i32) -> f32 {
        self.scores.get(&track_id).copied().unwrap_or(0.0)
    }

    pub fn remove(&mut self, track_id: i32) -> Option<f32> {
        self.scores.remove(&track_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Highest `n` scores, descending; ties broken by id.
    pub fn top(&self, n: usize) -> Vec<(i32, f32)> {
        let mut all: Vec<(i32, f32)> = self.scores.iter().map(|(id, s)| (*id, *s)).collect();
        all.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        all.truncate(n);
        all
    }
}
