use playfun_emu::EmuError;
use playfun_objectives::ObjectiveError;
use playfun_support::error::SupportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayfunError {
    #[error(transparent)]
    Emu(#[from] EmuError),

    #[error(transparent)]
    Objectives(#[from] ObjectiveError),

    #[error(transparent)]
    Support(#[from] SupportError),

    #[error("motif library is empty")]
    EmptyMotifs,
}
