use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error in {path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
}
