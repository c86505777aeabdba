//! Emulator facade for the playfun tools.
//!
//! Wraps a [`LibretroHost`] with the pieces the search engine needs:
//! compressed snapshots (optionally differenced against a basis), an
//! in-memory `(input, state) -> state` cache for cheap speculative
//! exploration, and the basis oracle that pins the differencing reference.
//!
//! The underlying plugin is a process-wide resource, so only one [`Emulator`]
//! may exist at a time; dropping it releases the slot for re-initialization.

pub mod basis;
mod cache;
mod codec;
mod error;
mod locate;
mod video;

pub use cache::{CacheStats, StateCache};
pub use codec::{compress_state, decompress_state};
pub use error::EmuError;
pub use locate::default_core_path;
pub use video::IMAGE_DIM;

use libretro_host::{CoreInfo, LibretroHost};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

static PLUGIN_IN_USE: AtomicBool = AtomicBool::new(false);

/// The ground-truth emulator: a loaded core plus the speculative state cache.
///
/// Every call is synchronous and single-threaded. The emulator is a pure
/// function of its serialized state and the input byte, which is what makes
/// both the cache and the compressed-snapshot round trip sound.
pub struct Emulator {
    host: LibretroHost,
    cache: StateCache,
}

impl Emulator {
    /// Loads the core and the ROM. Fails without touching the running
    /// emulator if one is already initialized in this process.
    pub fn new(core_path: impl AsRef<Path>, rom_path: impl AsRef<Path>) -> Result<Self, EmuError> {
        if PLUGIN_IN_USE.swap(true, Ordering::SeqCst) {
            return Err(EmuError::AlreadyInitialized);
        }
        match Self::init(core_path.as_ref(), rom_path.as_ref()) {
            Ok(emu) => Ok(emu),
            Err(e) => {
                PLUGIN_IN_USE.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn init(core_path: &Path, rom_path: &Path) -> Result<Self, EmuError> {
        let mut host = LibretroHost::load(core_path)?;
        host.load_rom(rom_path)?;
        Ok(Self {
            host,
            cache: StateCache::new(),
        })
    }

    pub fn core_info(&self) -> &CoreInfo {
        self.host.core_info()
    }

    /// Emulates one frame: `input` on port 0, nothing on port 1.
    pub fn step(&mut self, input: u8) {
        self.host.set_input(0, input);
        self.host.set_input(1, 0);
        self.host.run();
    }

    /// Same as [`step`](Self::step); the name marks call sites that go on to
    /// read the captured frame via [`image`](Self::image) or
    /// [`sound`](Self::sound).
    pub fn step_full(&mut self, input: u8) {
        self.step(input);
    }

    /// Soft reset.
    pub fn reset(&mut self) {
        self.host.reset();
    }

    /// Zero-copy view of system RAM. Length is fixed for the session.
    pub fn ram(&self) -> &[u8] {
        self.host.ram()
    }

    /// Copying RAM getter for callers that keep snapshots around.
    pub fn memory(&self) -> Vec<u8> {
        self.ram().to_vec()
    }

    /// CityHash64 of the current RAM contents.
    pub fn ram_checksum(&self) -> u64 {
        cityhasher::hash(self.ram())
    }

    pub fn state_size(&self) -> usize {
        self.host.state_size()
    }

    /// Serializes the full opaque emulator state. Returns an empty buffer if
    /// the core refuses, which it reports in the log.
    pub fn save_uncompressed(&mut self) -> Vec<u8> {
        let mut out = vec![0u8; self.host.state_size()];
        if !self.host.save_state(&mut out) {
            warn!("core failed to serialize state");
            out.clear();
        }
        out
    }

    /// Restores a state from [`save_uncompressed`](Self::save_uncompressed).
    pub fn load_uncompressed(&mut self, state: &[u8]) -> bool {
        if state.is_empty() {
            return false;
        }
        self.host.load_state(state)
    }

    /// Compressed save with no basis differencing.
    pub fn save(&mut self) -> Vec<u8> {
        self.save_ex(&[])
    }

    /// Compressed save differenced against `basis` (empty = none).
    pub fn save_ex(&mut self, basis: &[u8]) -> Vec<u8> {
        compress_state(&self.save_uncompressed(), basis)
    }

    /// Loads a compressed save with no basis differencing.
    pub fn load(&mut self, data: &[u8]) -> bool {
        self.load_ex(data, &[])
    }

    /// Loads a compressed save produced with the same `basis`.
    pub fn load_ex(&mut self, data: &[u8], basis: &[u8]) -> bool {
        let raw = decompress_state(data, basis);
        self.load_uncompressed(&raw)
    }

    /// Latest captured video frame as a 256x256 RGBA8 buffer, top-left
    /// aligned, black wherever the core's frame does not reach.
    pub fn image(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self.host.frame() {
            Some(frame) => video::frame_to_rgba(frame, &mut out),
            None => out.resize(IMAGE_DIM * IMAGE_DIM * 4, 0),
        }
        out
    }

    /// Audio from the last [`step_full`](Self::step_full), downmixed to mono
    /// as `(L + R) / 2`.
    pub fn sound(&self) -> Vec<i16> {
        video::mix_mono(self.host.audio())
    }

    /// Clears the speculative cache and installs a new eviction policy.
    pub fn reset_cache(&mut self, limit: u64, slop: u64) {
        self.cache.reset(limit, slop);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn log_cache_stats(&self) {
        self.cache.log_stats();
    }

    /// Steps through the cache: a hit restores the remembered post-state, a
    /// miss emulates the frame and remembers the result. Either way the
    /// emulator ends up in the state `step(input)` would have produced.
    pub fn caching_step(&mut self, input: u8) {
        let pre = self.save_uncompressed();
        let Self { host, cache } = self;
        if let Some(post) = cache.get_known(input, &pre) {
            host.load_state(post);
        } else {
            host.set_input(0, input);
            host.set_input(1, 0);
            host.run();
            let mut post = vec![0u8; host.state_size()];
            if !host.save_state(&mut post) {
                warn!("core failed to serialize state; step not cached");
                return;
            }
            cache.remember(input, pre, post);
        }
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        PLUGIN_IN_USE.store(false, Ordering::SeqCst);
    }
}
