//! Frontend-side libretro host.
//!
//! Loads a libretro core (a shared library) at runtime, resolves the
//! well-known `retro_*` entry points by name, and drives the core one frame
//! per [`LibretroHost::run`] call. Video frames and audio samples produced
//! during a `run` are captured into host-owned buffers; input is fed to the
//! core through a per-port joypad bitmask.
//!
//! The core calls back into the host through C function pointers that carry
//! no context argument. Those trampolines locate the host through a
//! thread-local pointer installed around every host-to-plugin call, so a
//! core must only invoke its callbacks from the thread that drives it
//! (cores that spawn their own threads are unsupported).

mod error;
mod host;
mod input;

pub mod raw;

pub use error::HostError;
pub use host::{AvInfo, CapturedFrame, CoreInfo, LibretroHost, PixelFormat};
pub use input::Joypad;
