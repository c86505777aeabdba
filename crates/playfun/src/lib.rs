//! Automated player for deterministic retro console games.
//!
//! [`learn`] mines objective functions and motifs from a recorded example
//! movie; [`player`] greedily plays the game against them, estimating
//! futures with bounded rollouts through the emulator's speculative cache.

pub mod control;
pub mod error;
pub mod learn;
pub mod player;

pub use error::PlayfunError;
pub use player::{PlayFun, PlayFunConfig, ScoringMode};
