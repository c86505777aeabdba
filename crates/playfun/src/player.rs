//! The greedy per-frame player.
//!
//! Each committed frame the player tries a selection of motifs from the
//! current state, scores every trial as `immediate + future`, and commits
//! the winner's inputs to the movie. The future term combines a pessimistic
//! probe ([`PlayFun::avoid_bad_futures`], the minimum score seen anywhere
//! along two rollouts) with an optimistic one
//! ([`PlayFun::seek_good_futures`], the best end state of three rollouts).
//! Rollout depths and the motif selection adapt to recent quality.
//!
//! There is no backtracking: a committed frame is permanent.

use crate::PlayfunError;
use crate::control::{AdaptiveDepths, MotifStats};
use playfun_emu::Emulator;
use playfun_objectives::{Motifs, WeightedObjectives};
use playfun_support::{ArcFour, fm2};
use tracing::info;

/// Checksum header carried into every movie this tool writes.
const ROM_CHECKSUM: &str = "base64:Ww5XFVjIx5aTe5avRpVhxg==";

/// Movie and SVG artifacts are persisted every this many committed frames.
const PERSIST_INTERVAL: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoringMode {
    #[default]
    Binary,
    Magnitude,
}

pub struct PlayFunConfig {
    /// Game base name; `<game>.objectives` and `<game>.motifs` must exist
    /// and artifacts are written as `<game>-playfun-*`.
    pub game: String,
    /// Seed movie whose idle prefix is replayed before the search starts.
    pub movie_file: String,
    pub scoring: ScoringMode,
}

struct Candidate {
    motif_index: usize,
    total: f64,
    immediate: f64,
    future: f64,
}

pub struct PlayFun {
    emu: Emulator,
    game: String,
    scoring: ScoringMode,
    objectives: WeightedObjectives,
    motifs: Motifs,
    motif_inputs: Vec<Vec<u8>>,
    /// Inputs committed so far, including the replayed movie prefix.
    movie: Vec<u8>,
    /// RAM snapshot per committed frame, for the SVG plot.
    memories: Vec<Vec<u8>>,
    rc: ArcFour,
    depths: AdaptiveDepths,
    stats: MotifStats,
}

impl PlayFun {
    /// Loads the objective and motif files, sizes the cache and replays the
    /// seed movie up to and including its first nonzero input.
    pub fn new(mut emu: Emulator, config: PlayFunConfig) -> Result<Self, PlayfunError> {
        let objectives =
            WeightedObjectives::load_from_file(format!("{}.objectives", config.game))?;
        info!(count = objectives.len(), "loaded objective functions");

        let motifs = Motifs::load_from_file(format!("{}.motifs", config.game))?;
        if motifs.is_empty() {
            return Err(PlayfunError::EmptyMotifs);
        }
        let motif_inputs = motifs.all_motifs();

        emu.reset_cache(100_000, 10_000);

        let solution = fm2::read_inputs(&config.movie_file)?;
        let mut movie = Vec::new();
        for &input in &solution {
            emu.step(input);
            movie.push(input);
            if input != 0 {
                break;
            }
        }
        info!(
            frames = movie.len(),
            "replayed movie prefix through first keypress"
        );

        let stats = MotifStats::new(motif_inputs.len());
        Ok(Self {
            emu,
            game: config.game,
            scoring: config.scoring,
            objectives,
            motifs,
            motif_inputs,
            movie,
            memories: Vec::new(),
            rc: ArcFour::new("playfun"),
            depths: AdaptiveDepths::new(),
            stats,
        })
    }

    fn score_change(&self, before: &[u8], after: &[u8]) -> f64 {
        match self.scoring {
            ScoringMode::Binary => self.objectives.evaluate(before, after),
            ScoringMode::Magnitude => self.objectives.evaluate_magnitude(before, after),
        }
    }

    /// Pessimistic future probe: two weight-sampled rollouts from the
    /// current state, scoring against `base_memory` after every single step
    /// and keeping the worst value seen. Leaves the emulator wherever the
    /// last rollout ended.
    fn avoid_bad_futures(&mut self, base_memory: &[u8]) -> f64 {
        let base_state = self.emu.save_uncompressed();
        let mut total = 1.0;
        let mut first = true;
        for rollout in 0..self.depths.avoid.len() {
            if rollout > 0 {
                self.emu.load_uncompressed(&base_state);
            }
            for _ in 0..self.depths.avoid[rollout] {
                let motif = self.motifs.random_weighted_motif().to_vec();
                for &input in &motif {
                    self.emu.caching_step(input);
                    let score = self.score_change(base_memory, self.emu.ram());
                    total = if first { score } else { total.min(score) };
                    first = false;
                }
            }
        }
        total
    }

    /// Optimistic future probe: three weight-sampled rollouts played
    /// end-to-end, scored only at their final state; returns the best.
    fn seek_good_futures(&mut self, base_memory: &[u8]) -> f64 {
        let base_state = self.emu.save_uncompressed();
        let mut total = 1.0;
        for rollout in 0..self.depths.seek.len() {
            if rollout > 0 {
                self.emu.load_uncompressed(&base_state);
            }
            for _ in 0..self.depths.seek[rollout] {
                let motif = self.motifs.random_weighted_motif().to_vec();
                for &input in &motif {
                    self.emu.caching_step(input);
                }
            }
            let score = self.score_change(base_memory, self.emu.ram());
            total = if rollout == 0 { score } else { total.max(score) };
        }
        total
    }

    /// Runs the greedy loop until `frames` best-motif choices have been
    /// committed, then writes the final movie.
    pub fn play(&mut self, frames: usize) -> Result<(), PlayfunError> {
        for framenum in 0..frames {
            let current_state = self.emu.save_uncompressed();
            let current_memory = self.emu.memory();
            self.memories.push(current_memory.clone());

            let to_try = self.stats.select(&mut self.rc);

            let mut best: Option<Candidate> = None;
            for (trial, &motif_index) in to_try.iter().enumerate() {
                if trial != 0 {
                    self.emu.load_uncompressed(&current_state);
                }
                let motif = self.motif_inputs[motif_index].clone();
                for &input in &motif {
                    self.emu.caching_step(input);
                }

                let new_memory = self.emu.memory();
                let new_state = self.emu.save_uncompressed();

                let immediate = self.score_change(&current_memory, &new_memory);
                let mut future = self.avoid_bad_futures(&new_memory);
                self.emu.load_uncompressed(&new_state);
                future += self.seek_good_futures(&new_memory);

                let total = immediate + future;
                self.stats.update(motif_index, total);

                if best.as_ref().is_none_or(|b| total > b.total) {
                    best = Some(Candidate {
                        motif_index,
                        total,
                        immediate,
                        future,
                    });
                }
            }
            let best = best.expect("motif selection is never empty");

            info!(
                "{:8} best score {:.2} ({:.2} + {:.2} future) [tried {}/{}]",
                self.movie.len(),
                best.total,
                best.immediate,
                best.future,
                to_try.len(),
                self.motif_inputs.len()
            );

            self.depths.record(best.future);
            self.depths.adapt();
            if framenum % 100 == 0 {
                info!(
                    "adaptive: avg_future={:.2}, avoid={:?}, seek={:?}",
                    self.depths.average(),
                    self.depths.avoid,
                    self.depths.seek
                );
            }

            // Commit the winner.
            self.emu.load_uncompressed(&current_state);
            let motif = self.motif_inputs[best.motif_index].clone();
            for &input in &motif {
                self.emu.caching_step(input);
                self.movie.push(input);
            }

            if framenum % PERSIST_INTERVAL == 0 {
                self.write_progress()?;
            }
        }

        fm2::write_inputs(
            format!("{}-playfun-motif-final.fm2", self.game),
            &format!("{}.nes", self.game),
            ROM_CHECKSUM,
            &self.movie,
        )?;
        Ok(())
    }

    fn write_progress(&mut self) -> Result<(), PlayfunError> {
        fm2::write_inputs(
            format!("{}-playfun-motif-progress.fm2", self.game),
            &format!("{}.nes", self.game),
            ROM_CHECKSUM,
            &self.movie,
        )?;
        self.objectives
            .save_svg(&self.memories, format!("{}-playfun.svg", self.game))?;
        self.emu.log_cache_stats();
        Ok(())
    }
}
