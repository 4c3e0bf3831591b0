use std::sync::PoisonError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes shared by every generation strategy.
///
/// Emission never panics: strategies either spin transparently (sequence
/// exhaustion), surface one of these errors, or emit the documented sentinel.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The wall clock reported a tick earlier than the last issued one.
    #[error("clock moved backwards; refusing to generate id")]
    ClockRegressed,

    /// Every node slot in the coordinator keyspace is already leased.
    #[error("all {0} coordinator node slots are claimed")]
    NodeIdExhausted(u64),

    /// The external counter, lease or sequence authority could not be reached.
    #[error("coordinator unavailable: {0}")]
    CoordinatorUnavailable(String),

    /// The coordinator answered, but not in the shape the protocol requires.
    #[error("malformed coordinator response: {0}")]
    MalformedResponse(String),

    /// The strategy only yields textual identifiers.
    #[error("strategy does not produce packed integer ids")]
    NotNumeric,

    /// A generator lock was poisoned by a panicking holder.
    #[error("generator lock poisoned")]
    LockPoisoned,

    /// The generator is tearing down and no longer hands out identifiers.
    #[error("generator is shutting down")]
    ShuttingDown,
}

impl Error {
    /// Wraps an arbitrary transport or store failure as coordinator loss.
    pub fn coordinator(err: impl std::fmt::Display) -> Self {
        Error::CoordinatorUnavailable(err.to_string())
    }
}

// Collapse all poisoned lock errors into `LockPoisoned`.
impl<G> From<PoisonError<G>> for Error {
    fn from(_: PoisonError<G>) -> Self {
        Error::LockPoisoned
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::CoordinatorUnavailable(err.to_string())
    }
}

impl From<mysql::Error> for Error {
    fn from(err: mysql::Error) -> Self {
        Error::CoordinatorUnavailable(err.to_string())
    }
}
