use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("failed to load core: {0}")]
    CoreLoad(String),

    #[error("core reports API version {found}, host supports {expected}")]
    ApiVersion { expected: u32, found: u32 },

    #[error("no core is loaded")]
    CoreNotLoaded,

    #[error("failed to load ROM: {0}")]
    RomLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
