use thiserror::Error;

#[derive(Error, Debug)]
pub enum MiddlewareError {
    #[error("duplicate middleware type: {0}")]
    DuplicateName(String),

    #[error("unknown middleware type: {0}")]
    UnknownType(String),

    #[error("invalid arguments for {0}: {1}")]
    InvalidArgs(String, String),
}
