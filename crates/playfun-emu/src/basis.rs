//! Basis snapshot oracle.
//!
//! The basis is the reference state every compressed snapshot is differenced
//! against, so it has to be byte-identical across runs. It is derived from a
//! designated frame of a known input script and cached on disk; a failure to
//! persist it aborts rather than letting later runs recompute a different
//! anchor.

use crate::Emulator;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use tracing::{error, info};

fn fatal(context: &str, err: impl Display) -> ! {
    error!("{context}: {err}");
    std::process::abort();
}

/// Returns the basis stored at `path`, computing and persisting it first if
/// the file does not exist.
///
/// Computing steps the emulator through `min(frame, script.len())` inputs of
/// `script`, captures the uncompressed state, then restores the state the
/// emulator held on entry.
pub fn load_or_compute_basis(
    emu: &mut Emulator,
    script: &[u8],
    frame: usize,
    path: impl AsRef<Path>,
) -> Vec<u8> {
    let path = path.as_ref();
    if path.exists() {
        info!(basis = %path.display(), "loading basis file");
        match fs::read(path) {
            Ok(basis) => return basis,
            Err(e) => fatal("failed to read basis file", e),
        }
    }

    info!(basis = %path.display(), frame, "computing basis file");
    let saved = emu.save();
    for &input in script.iter().take(frame) {
        emu.step(input);
    }
    let basis = emu.save_uncompressed();
    if let Err(e) = fs::write(path, &basis) {
        fatal("failed to write basis file", e);
    }
    emu.load(&saved);
    basis
}
