//! Error types for conduit operations.

use std::io;

/// Result type alias for conduit operations.
pub type Result<T> = std::result::Result<T, ConduitError>;

/// Conduit operation error.
///
/// `Disposed` takes precedence: once a conduit has been disposed every
/// operation reports it, even when the call would also be malformed or
/// unsupported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConduitError {
    /// Malformed call input (zero-capacity read, inverted thresholds).
    #[error("conduit: invalid argument: {0}")]
    InvalidArgument(String),

    /// The conduit has been disposed.
    #[error("conduit: disposed")]
    Disposed,

    /// Random-access capability the conduit does not implement.
    #[error("conduit: {0} is not supported")]
    Unsupported(&'static str),

    /// A suspended operation was aborted by its cancellation token.
    #[error("conduit: operation cancelled")]
    Cancelled,

    /// Write attempted after the writer declared completion.
    #[error("conduit: writing is complete")]
    WritingComplete,
}

impl ConduitError {
    /// Returns true if this error reports disposal.
    pub fn is_disposed(&self) -> bool {
        matches!(self, ConduitError::Disposed)
    }

    /// Returns true if this error reports cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConduitError::Cancelled)
    }
}

impl From<ConduitError> for io::Error {
    fn from(err: ConduitError) -> Self {
        let kind = match err {
            ConduitError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            ConduitError::Disposed => io::ErrorKind::NotConnected,
            ConduitError::Unsupported(_) => io::ErrorKind::Unsupported,
            ConduitError::Cancelled => io::ErrorKind::Interrupted,
            ConduitError::WritingComplete => io::ErrorKind::BrokenPipe,
        };
        io::Error::new(kind, err)
    }
}
