use libretro_host::HostError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmuError {
    #[error("an emulator is already initialized in this process")]
    AlreadyInitialized,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("no libretro core found; pass --core or set LIBRETRO_CORE")]
    NoDefaultCore,
}
