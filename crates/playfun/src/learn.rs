//! Offline mining: derive objective and motif files from an example movie.
//!
//! Replays the movie through the emulator recording a RAM snapshot per
//! frame, mines maximal orderings (including decreasing variants) from the
//! trajectory, weights each by the fraction of distinct consecutive pairs it
//! strictly increases, and extracts the movie's input chunks as weighted
//! motifs. The outputs are what the player later loads.

use crate::PlayfunError;
use playfun_emu::Emulator;
use playfun_objectives::{Motifs, ObjectiveMiner, WeightedObjectives, weighted};
use playfun_support::fm2;
use tracing::info;

pub struct LearnConfig {
    /// Game base name; outputs land at `<game>.objectives` and `<game>.motifs`.
    pub game: String,
    /// Example movie to learn from.
    pub movie_file: String,
    /// Yield budget for the miner; negative means unlimited.
    pub objective_budget: i64,
    /// Candidate-shuffle seed; 0 enumerates in index order.
    pub seed: u64,
}

/// Runs the whole pipeline against a freshly initialized emulator.
pub fn learn(emu: &mut Emulator, config: &LearnConfig) -> Result<(), PlayfunError> {
    let inputs = fm2::read_inputs(&config.movie_file)?;
    info!(frames = inputs.len(), movie = %config.movie_file, "replaying example movie");

    let mut memories = Vec::with_capacity(inputs.len() + 1);
    memories.push(emu.memory());
    for &input in &inputs {
        emu.step(input);
        memories.push(emu.memory());
    }

    let miner = ObjectiveMiner::new(memories.clone());
    let mut pairs = Vec::new();
    miner.enumerate_full_all_with_decreasing(
        |ordering| {
            let weight = weighted::weight_by_pair_fraction(ordering, &memories);
            if weight > 0.0 {
                pairs.push((ordering.to_vec(), weight));
            }
        },
        config.objective_budget,
        config.seed,
    );
    let objectives = WeightedObjectives::from_pairs(pairs);
    info!(count = objectives.len(), "mined objectives");
    objectives.save_to_file(format!("{}.objectives", config.game))?;

    let motifs = Motifs::from_inputs(&inputs);
    info!(count = motifs.len(), "extracted motifs");
    motifs.save_to_file(format!("{}.motifs", config.game))?;
    Ok(())
}
