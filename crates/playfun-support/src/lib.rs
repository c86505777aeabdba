pub mod arcfour;
pub mod error;
pub mod fm2;

pub use arcfour::ArcFour;
pub use error::SupportError as Error;
