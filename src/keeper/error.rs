use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by [`SingletonKeeper`](crate::keeper::SingletonKeeper) reads.
///
/// The variants are cheap to clone so that every caller waiting on the same
/// resolution attempt receives the same failure.
#[derive(Debug, Clone, Error)]
pub enum KeeperError {
    /// The resolve operation failed. The wrapped error is the one the
    /// resolver returned, untouched.
    #[error("resolve failed: {0:#}")]
    Resolve(Arc<anyhow::Error>),
    /// Renewal was requested on a keeper that has neither a resolver nor any
    /// value to fall back to.
    #[error("keeper has no resolver and no cached value")]
    Empty,
}

impl KeeperError {
    pub(crate) fn resolve(err: anyhow::Error) -> Self {
        KeeperError::Resolve(Arc::new(err))
    }

    /// The resolver's own error, if this is a resolution failure.
    pub fn resolve_error(&self) -> Option<&anyhow::Error> {
        match self {
            KeeperError::Resolve(err) => Some(err.as_ref()),
            KeeperError::Empty => None,
        }
    }
}

pub type KeeperResult<T> = Result<T, KeeperError>;
