use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid movie data: {0}")]
    InvalidMovie(String),
}
