//! Default core discovery.

use std::env;
use std::path::PathBuf;
use tracing::debug;

/// Probed in order when neither `--core` nor `LIBRETRO_CORE` names a core.
const WELL_KNOWN_CORE_PATHS: &[&str] = &[
    "/tmp/fceumm_libretro.so",
    "/usr/lib/libretro/fceumm_libretro.so",
    "/usr/local/lib/libretro/fceumm_libretro.so",
    "~/.config/retroarch/cores/fceumm_libretro.so",
    "./fceumm_libretro.so",
];

/// Resolves the core to load: the `LIBRETRO_CORE` environment variable if
/// set, otherwise the first well-known location that exists (`~` expanded
/// from `HOME`).
pub fn default_core_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("LIBRETRO_CORE") {
        return Some(PathBuf::from(path));
    }

    for candidate in WELL_KNOWN_CORE_PATHS {
        let path = match candidate.strip_prefix('~') {
            Some(rest) => match env::var("HOME") {
                Ok(home) => PathBuf::from(format!("{home}{rest}")),
                Err(_) => continue,
            },
            None => PathBuf::from(candidate),
        };
        if path.is_file() {
            debug!(core = %path.display(), "found default core");
            return Some(path);
        }
    }
    None
}
