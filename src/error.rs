use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the crate.
///
/// All argument validation happens at the API boundary, before any state
/// mutation. Failures from lower layers (filesystem, serialization,
/// chart rendering) surface unchanged through the wrapped variants.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad argument shape, type or range.
    #[error("validation error: {0}")]
    Validation(String),

    /// Operation invoked in the wrong lifecycle state.
    #[error("state error: {0}")]
    State(String),

    /// Missing input file or directory.
    #[error("resource error: {0}")]
    Resource(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] postcard::Error),

    #[error("chart error: {0}")]
    Chart(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        Error::State(message.into())
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Error::Resource(message.into())
    }
}
