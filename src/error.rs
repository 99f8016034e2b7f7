//! Errors reported by the cache layer.
use crate::field::FieldId;
use std::error::Error;
use std::fmt;

#[derive(Debug)]
#[non_exhaustive]
pub enum CacheError {
    /// The key is already present in the cache. Entries are never silently overwritten.
    DuplicateKey,
    /// An argument was rejected, e.g. boundary conditions for a rank 0 form or a malformed
    /// parameter map.
    InvalidArgument(String),
    /// The form has a rank other than 0, 1 or 2.
    UnsupportedRank(usize),
    /// Attempted to change the state of a field which carries no values.
    ImmutableField(FieldId),
    /// The backend failed to assemble a form or to build a linear solver.
    Backend(eyre::Report),
}

impl CacheError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateKey => write!(f, "Duplicate key"),
            Self::InvalidArgument(message) => write!(f, "Invalid argument: {}", message),
            Self::UnsupportedRank(rank) => write!(f, "Unexpected form rank {}", rank),
            Self::ImmutableField(id) => write!(f, "Cannot change the state of placeholder field {}", id),
            Self::Backend(err) => {
                write!(f, "Backend error: ")?;
                err.fmt(f)
            }
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend(err) => {
                let err: &(dyn Error + 'static) = err.as_ref();
                Some(err)
            }
            _ => None,
        }
    }
}

impl From<eyre::Report> for CacheError {
    fn from(err: eyre::Report) -> Self {
        Self::Backend(err)
    }
}
