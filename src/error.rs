//! Status taxonomy shared by the store, mapper and facade.
//!
//! `Ok(_)` plays the role of `OK`. The remaining outcomes are the variants of
//! [`Error`], grouped by [`Code`]: `Invalid` and `Storage` are both reported as
//! the generic `Error` class.

use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    NotFound,
    NotImplemented,
    Error,
}

#[derive(Debug, Error)]
pub enum Error {
    /// A requested key, id, session or normalized entry does not exist.
    #[error("NotFound - {0}")]
    NotFound(String),

    /// The option combination is not supported by this backend.
    #[error("NotImplemented - {0}")]
    NotImplemented(String),

    /// Invalid precondition or argument.
    #[error("Error - {0}")]
    Invalid(String),

    #[error("Error - {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Error::NotImplemented(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Error::Invalid(message.into())
    }

    pub fn code(&self) -> Code {
        match self {
            Error::NotFound(_) => Code::NotFound,
            Error::NotImplemented(_) => Code::NotImplemented,
            Error::Invalid(_) | Error::Storage(_) => Code::Error,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Code::NotFound
    }

    pub fn is_not_implemented(&self) -> bool {
        self.code() == Code::NotImplemented
    }

    pub fn is_error(&self) -> bool {
        self.code() == Code::Error
    }

    /// The human-readable message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Error::NotFound(m) | Error::NotImplemented(m) | Error::Invalid(m) => m.clone(),
            Error::Storage(e) => e.to_string(),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::Invalid("store lock poisoned".to_string())
    }
}
