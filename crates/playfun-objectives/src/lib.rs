//! Objectives mined from RAM trajectories, and the pieces that consume them.
//!
//! An *objective* (or ordering) is a sequence of RAM byte indices, each with
//! a direction, under which every consecutive snapshot pair of a recorded
//! trajectory compares lexicographically non-decreasing. [`miner`] enumerates
//! the maximal ones, [`weighted`] scores RAM transitions against a weighted
//! set of them, and [`motifs`] holds the short input sequences the player
//! samples when it speculates.

pub mod error;
pub mod miner;
pub mod motifs;
pub mod weighted;

pub use error::ObjectiveError;
pub use miner::{ObjectiveMiner, OrderingEntry};
pub use motifs::Motifs;
pub use weighted::WeightedObjectives;
