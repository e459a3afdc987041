use std::io;

use thiserror::Error;

/// Errors surfaced by branch operations and the text factory.
#[derive(Error, Debug)]
pub enum BranchError {
    /// The operation needs an open branch.
    #[error("cannot branch a closed branch")]
    Closed,
    /// The underlying source failed. The error is the source's own, unchanged.
    #[error(transparent)]
    Source(#[from] io::Error),
    /// The factory was asked to decode a charset it has no decoder for.
    #[error("unsupported charset {0:?}")]
    UnsupportedCharset(String),
}

impl From<BranchError> for io::Error {
    fn from(err: BranchError) -> Self {
        match err {
            BranchError::Source(err) => err,
            BranchError::Closed => io::Error::other(err),
            BranchError::UnsupportedCharset(_) => io::Error::new(io::ErrorKind::Unsupported, err),
        }
    }
}

/// Shorthand for results carrying a [`BranchError`].
pub type Result<T> = core::result::Result<T, BranchError>;
