use thiserror::Error;

/// Store-layer error type.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Store error wrapper.
    #[error("store error: {0}")]
    Store(#[source] StoreError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// A grant referenced a role that does not exist.
    #[error("unknown role {0}")]
    UnknownRole(String),
    /// Access denied and no principal is present; the caller should log in.
    #[error("authentication required")]
    Unauthenticated,
    /// Access denied for an identified principal.
    #[error("permission denied")]
    Forbidden,
}

impl Error {
    /// Returns true for the two denial kinds produced by the decision engine.
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Forbidden)
    }
}

impl From<StoreError> for Error {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}
