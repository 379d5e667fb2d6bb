use thiserror::Error;

/// General decoding errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The bitstream violates the ProRes frame layout.
    #[error("Invalid input data: {0}")]
    InvalidData(String),
    /// The bitstream is well-formed but uses a feature this decoder
    /// does not support.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// A specialised `Result` type for decoding operations.
pub type Result<T> = ::std::result::Result<T, Error>;
