//! Motif library: short input sequences sampled as a unit.

use crate::error::ObjectiveError;
use playfun_support::ArcFour;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Inputs are chopped into chunks of this many frames when motifs are
/// extracted from an example movie.
pub const MOTIF_LEN: usize = 10;

struct Motif {
    weight: f64,
    inputs: Vec<u8>,
}

/// A weighted set of motifs with its own deterministic sampling stream.
pub struct Motifs {
    motifs: Vec<Motif>,
    total_weight: f64,
    rc: ArcFour,
}

impl Motifs {
    fn build(motifs: Vec<Motif>) -> Self {
        let total_weight = motifs.iter().map(|m| m.weight).sum();
        Self {
            motifs,
            total_weight,
            rc: ArcFour::new("motifs"),
        }
    }

    /// Extracts motifs from an example movie: every complete [`MOTIF_LEN`]
    /// chunk becomes a motif weighted by how often it occurs.
    pub fn from_inputs(movie: &[u8]) -> Self {
        let mut motifs: Vec<Motif> = Vec::new();
        let chunks = movie.chunks_exact(MOTIF_LEN);
        let mut total_chunks = 0usize;
        for chunk in chunks {
            total_chunks += 1;
            match motifs.iter_mut().find(|m| m.inputs == chunk) {
                Some(motif) => motif.weight += 1.0,
                None => motifs.push(Motif {
                    weight: 1.0,
                    inputs: chunk.to_vec(),
                }),
            }
        }
        if total_chunks > 0 {
            for motif in &mut motifs {
                motif.weight /= total_chunks as f64;
            }
        }
        Self::build(motifs)
    }

    /// Reads one motif per line: weight, then the input bytes.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ObjectiveError> {
        let path = path.as_ref();
        let parse_err = |line: usize, message: String| ObjectiveError::Parse {
            path: path.display().to_string(),
            line,
            message,
        };

        let file = File::open(path)?;
        let mut motifs = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            let weight: f64 = tokens
                .next()
                .expect("non-empty line has a token")
                .parse()
                .map_err(|e| parse_err(lineno + 1, format!("bad weight: {e}")))?;
            let inputs: Vec<u8> = tokens
                .map(|tok| {
                    tok.parse::<u8>()
                        .map_err(|e| parse_err(lineno + 1, format!("bad input {tok:?}: {e}")))
                })
                .collect::<Result<_, _>>()?;
            if inputs.is_empty() {
                return Err(parse_err(lineno + 1, "motif has no inputs".into()));
            }
            motifs.push(Motif { weight, inputs });
        }
        let motifs = Self::build(motifs);
        info!(count = motifs.len(), path = %path.display(), "loaded motifs");
        Ok(motifs)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ObjectiveError> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        for motif in &self.motifs {
            write!(w, "{}", motif.weight)?;
            for &input in &motif.inputs {
                write!(w, " {input}")?;
            }
            writeln!(w)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.motifs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motifs.is_empty()
    }

    /// Copies of every motif's input sequence, in stored order.
    pub fn all_motifs(&self) -> Vec<Vec<u8>> {
        self.motifs.iter().map(|m| m.inputs.clone()).collect()
    }

    /// Roulette-samples a motif by weight from the library's own
    /// deterministic stream.
    pub fn random_weighted_motif(&mut self) -> &[u8] {
        assert!(!self.motifs.is_empty(), "motif library is empty");
        let mut remaining = self.rc.next_double() * self.total_weight;
        for motif in &self.motifs {
            if remaining < motif.weight {
                return &motif.inputs;
            }
            remaining -= motif.weight;
        }
        // Rounding can walk past the end; the last motif absorbs it.
        &self.motifs.last().expect("non-empty").inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn extraction_counts_repeated_chunks() {
        let mut movie = Vec::new();
        movie.extend_from_slice(&[1u8; MOTIF_LEN]);
        movie.extend_from_slice(&[2u8; MOTIF_LEN]);
        movie.extend_from_slice(&[1u8; MOTIF_LEN]);
        movie.extend_from_slice(&[0u8; 3]); // incomplete tail is dropped

        let motifs = Motifs::from_inputs(&movie);
        assert_eq!(motifs.len(), 2);
        let all = motifs.all_motifs();
        assert_eq!(all[0], vec![1u8; MOTIF_LEN]);
        assert_eq!(all[1], vec![2u8; MOTIF_LEN]);
        // Weights are occurrence fractions summing to 1.
        assert!((motifs.total_weight - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sampling_is_deterministic_for_a_fresh_library() {
        let movie: Vec<u8> = (0..100u8).collect();
        let mut a = Motifs::from_inputs(&movie);
        let mut b = Motifs::from_inputs(&movie);
        for _ in 0..50 {
            assert_eq!(a.random_weighted_motif(), b.random_weighted_motif());
        }
    }

    #[test]
    fn sampling_respects_weights() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skew.motifs");
        std::fs::write(&path, "99.0 1 1 1\n1.0 2 2 2\n").unwrap();
        let mut motifs = Motifs::load_from_file(&path).unwrap();

        let mut heavy = 0usize;
        for _ in 0..1000 {
            if motifs.random_weighted_motif() == [1, 1, 1] {
                heavy += 1;
            }
        }
        assert!(heavy > 900, "heavy motif drawn {heavy}/1000 times");
    }

    #[test]
    fn file_round_trip_preserves_the_library() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.motifs");
        let movie: Vec<u8> = [[0x80u8; MOTIF_LEN], [0x81; MOTIF_LEN]].concat();
        let motifs = Motifs::from_inputs(&movie);
        motifs.save_to_file(&path).unwrap();

        let loaded = Motifs::load_from_file(&path).unwrap();
        assert_eq!(loaded.len(), motifs.len());
        assert_eq!(loaded.all_motifs(), motifs.all_motifs());
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.motifs");
        std::fs::write(&path, "1.0 300\n").unwrap();
        assert!(Motifs::load_from_file(&path).is_err());
        std::fs::write(&path, "1.0\n").unwrap();
        assert!(Motifs::load_from_file(&path).is_err());
    }
}
