//! Adaptive search control for the player.
//!
//! Two small pieces of feedback steer the per-frame search:
//! [`AdaptiveDepths`] widens or deepens the rollouts from a rolling window
//! of recent future quality, and [`MotifStats`] decides which motifs are
//! worth trying from per-motif utility averages.

use playfun_support::ArcFour;
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Capacity of the rolling future-score window.
pub const HISTORY_SIZE: usize = 50;

/// Motifs with fewer than this many total trials are all explored.
const WARMUP_USES: usize = 100;

/// Rollout depth tables driven by a rolling window of future scores.
///
/// Low recent quality switches to wide shallow search, high quality to deep
/// narrow search. Adaptation waits until the window is half full.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveDepths {
    window: VecDeque<f64>,
    /// Motifs to play per avoid-rollout.
    pub avoid: [usize; 2],
    /// Motifs to play per seek-rollout.
    pub seek: [usize; 3],
}

impl Default for AdaptiveDepths {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveDepths {
    pub fn new() -> Self {
        Self {
            window: VecDeque::new(),
            avoid: [20, 75],
            seek: [30, 30, 50],
        }
    }

    /// Pushes a future score into the window, evicting the oldest past
    /// [`HISTORY_SIZE`].
    pub fn record(&mut self, score: f64) {
        self.window.push_back(score);
        while self.window.len() > HISTORY_SIZE {
            self.window.pop_front();
        }
    }

    pub fn average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Re-selects the depth tables from the window average. No-op until the
    /// window is at least half full.
    pub fn adapt(&mut self) {
        if self.window.len() < HISTORY_SIZE / 2 {
            return;
        }
        let avg = self.average();
        if avg < 0.3 {
            // Futures are bad: shorten the rollouts, search wider.
            self.avoid = [10, 30];
            self.seek = [15, 15, 25];
        } else if avg > 0.7 {
            // Futures are good: lengthen the rollouts, search deeper.
            self.avoid = [40, 150];
            self.seek = [50, 50, 100];
        } else {
            self.avoid = [20, 75];
            self.seek = [30, 30, 50];
        }
    }
}

/// Per-motif utility tracking and the selection rule built on it.
///
/// Each motif's utility is an exponential moving average (alpha 0.05) of the
/// total scores it earned. Selection tries everything while data is thin,
/// then the best-scoring half plus a ~25% sample of the rest.
pub struct MotifStats {
    scores: Vec<f64>,
    uses: usize,
}

impl MotifStats {
    pub fn new(motif_count: usize) -> Self {
        Self {
            scores: vec![0.0; motif_count],
            uses: 0,
        }
    }

    /// Folds a trial's total score into the motif's moving average.
    pub fn update(&mut self, motif_index: usize, total: f64) {
        self.scores[motif_index] = self.scores[motif_index] * 0.95 + total * 0.05;
        self.uses += 1;
    }

    pub fn uses(&self) -> usize {
        self.uses
    }

    pub fn score(&self, motif_index: usize) -> f64 {
        self.scores[motif_index]
    }

    /// Picks the motif indices to try this frame, shuffled so trial order
    /// carries no bias.
    pub fn select(&self, rc: &mut ArcFour) -> Vec<usize> {
        let n = self.scores.len();
        let mut indices: Vec<usize> = (0..n).collect();

        if self.uses < WARMUP_USES {
            rc.shuffle(&mut indices);
            return indices;
        }

        indices.sort_by(|&a, &b| {
            self.scores[b]
                .partial_cmp(&self.scores[a])
                .unwrap_or(Ordering::Equal)
        });

        let best_half = n / 2;
        let mut selected: Vec<usize> = indices[..best_half].to_vec();
        for &index in &indices[best_half..] {
            // ~25% of the long tail keeps getting a chance.
            if rc.byte() < 64 {
                selected.push(index);
            }
        }
        if selected.is_empty() {
            // Tiny libraries can sample everything out; always try something.
            selected.push(indices[0]);
        }
        rc.shuffle(&mut selected);
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn depths_switch_high_after_25_good_scores() {
        let mut depths = AdaptiveDepths::new();
        for _ in 0..24 {
            depths.record(1.0);
            depths.adapt();
            // Window below half capacity: still the defaults.
            assert_eq!(depths.avoid, [20, 75]);
            assert_eq!(depths.seek, [30, 30, 50]);
        }
        depths.record(1.0);
        depths.adapt();
        assert_eq!(depths.avoid, [40, 150]);
        assert_eq!(depths.seek, [50, 50, 100]);
    }

    #[test]
    fn depths_switch_low_after_25_bad_scores() {
        let mut depths = AdaptiveDepths::new();
        for _ in 0..25 {
            depths.record(0.0);
            depths.adapt();
        }
        assert_eq!(depths.avoid, [10, 30]);
        assert_eq!(depths.seek, [15, 15, 25]);
    }

    #[test]
    fn band_edges_are_the_middle_table() {
        for edge in [0.3, 0.5, 0.7] {
            let mut depths = AdaptiveDepths::new();
            for _ in 0..25 {
                depths.record(edge);
            }
            depths.adapt();
            assert_eq!(depths.avoid, [20, 75], "avg {edge}");
            assert_eq!(depths.seek, [30, 30, 50], "avg {edge}");
        }
    }

    #[test]
    fn the_window_forgets_old_scores() {
        let mut depths = AdaptiveDepths::new();
        for _ in 0..HISTORY_SIZE {
            depths.record(0.0);
        }
        // Fill the whole window with good scores; the bad history is gone.
        for _ in 0..HISTORY_SIZE {
            depths.record(1.0);
        }
        depths.adapt();
        assert_eq!(depths.avoid, [40, 150]);
        assert!((depths.average() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn utility_is_an_exponential_moving_average() {
        let mut stats = MotifStats::new(2);
        stats.update(0, 1.0);
        assert!((stats.score(0) - 0.05).abs() < 1e-12);
        stats.update(0, 1.0);
        assert!((stats.score(0) - (0.05 * 0.95 + 0.05)).abs() < 1e-12);
        assert_eq!(stats.score(1), 0.0);
        assert_eq!(stats.uses(), 2);
    }

    #[test]
    fn warmup_selection_tries_every_motif() {
        let stats = MotifStats::new(20);
        let mut rc = ArcFour::new("select");
        let selected = stats.select(&mut rc);
        assert_eq!(selected.len(), 20);
        let unique: BTreeSet<usize> = selected.into_iter().collect();
        assert_eq!(unique.len(), 20);
    }

    #[test]
    fn trained_selection_keeps_the_best_half() {
        let mut stats = MotifStats::new(20);
        // Push every motif past the warmup, giving low indices high utility.
        for _ in 0..10 {
            for index in 0..20 {
                stats.update(index, (20 - index) as f64);
            }
        }
        assert!(stats.uses() >= 100);

        let mut rc = ArcFour::new("select");
        let selected = stats.select(&mut rc);
        let unique: BTreeSet<usize> = selected.iter().copied().collect();
        assert_eq!(unique.len(), selected.len());
        assert!(selected.len() >= 10 && selected.len() <= 20);
        // The best-scoring half is always included.
        for index in 0..10 {
            assert!(unique.contains(&index), "missing best-half motif {index}");
        }
    }

    #[test]
    fn selection_never_returns_empty() {
        let mut stats = MotifStats::new(1);
        for _ in 0..200 {
            stats.update(0, 0.5);
        }
        let mut rc = ArcFour::new("tiny");
        for _ in 0..50 {
            assert_eq!(stats.select(&mut rc), vec![0]);
        }
    }

    #[test]
    fn selection_is_deterministic_for_a_fixed_stream() {
        let mut stats = MotifStats::new(12);
        for index in 0..12 {
            for _ in 0..10 {
                stats.update(index, index as f64);
            }
        }
        let mut rc1 = ArcFour::new("fixed");
        let mut rc2 = ArcFour::new("fixed");
        assert_eq!(stats.select(&mut rc1), stats.select(&mut rc2));
    }
}
