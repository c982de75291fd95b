use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessorError>;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("encoding not supported: {0}")]
    EncodingError(&'static str),

    #[error("invalid job: {0}")]
    InvalidJob(String),

    #[error("{0}")]
    Other(String),
}
