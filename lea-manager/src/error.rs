//! Error taxonomy and per-event status codes

/// Result type for manager operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy of the manager surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Generic failure: a bus call errored or a registration was invalid.
    #[error("operation failed")]
    Fail,

    /// Malformed caller input, e.g. a volume request on a profile without
    /// volume support.
    #[error("invalid arguments")]
    InvalidArgs,

    /// An equivalent operation is already in flight.
    #[error("operation pending")]
    Pending,

    /// The operation conflicts with current state, e.g. advertising is
    /// already active.
    #[error("busy")]
    Busy,

    /// Reserved for future use.
    #[error("timed out")]
    Timeout,

    /// The manager is not initialized.
    #[error("not ready")]
    NotReady,
}

/// Status delivered alongside every dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Success,
    Error(Error),
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        Status::Error(err)
    }
}

impl<T> From<Result<T>> for Status {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(err) => Status::Error(err),
        }
    }
}
