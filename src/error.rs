//! Error kinds the queue core distinguishes internally.
//!
//! [`QueueError`] is the single rich error type used across `manager`,
//! `store`, `pool`, and `processor`. Each variant carries the context an
//! operator needs to act on it, and [`QueueError::kind`] exposes a
//! stable [`ErrorKind`] the processor's classification logic (pause vs.
//! fail vs. retry) switches on.

use std::fmt;

/// Stable classification of a [`QueueError`], independent of its
/// human-readable message.
///
/// The processor's error-classification policy (failure semantics table)
/// switches on this rather than matching the full error, so that adding
/// context to a variant never changes dispatch behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    StoreUnavailable,
    NotClaimable,
    Contended,
    ParseError,
    BudgetExceeded,
    GeneratorError,
    ArtifactWriteError,
    DeadlineExceeded,
    IndexMissing,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StoreUnavailable => "store_unavailable",
            Self::NotClaimable => "not_claimable",
            Self::Contended => "contended",
            Self::ParseError => "parse_error",
            Self::BudgetExceeded => "budget_exceeded",
            Self::GeneratorError => "generator_error",
            Self::ArtifactWriteError => "artifact_write_error",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::IndexMissing => "index_missing",
        };
        f.write_str(s)
    }
}

/// Error produced by any queue-core operation.
#[derive(Debug)]
pub enum QueueError {
    /// The store could not be reached at all (read, poll, or mid-transaction).
    StoreUnavailable { message: String },
    /// `ClaimTask` refused because the task failed the claimable invariant.
    NotClaimable { task_id: String, status: String },
    /// A competing claim (or any other CAS write) lost a version race.
    Contended { task_id: String },
    /// A task document could not be deserialized.
    ParseError { task_id: String, message: String },
    /// The injected budget gate reported the caller's budget is exhausted.
    BudgetExceeded {
        user_id: String,
        limit_reached: String,
    },
    /// A generator callback failed, or was not configured.
    GeneratorError { task_id: String, message: String },
    /// An artifact-writer callback failed.
    ArtifactWriteError { task_id: String, message: String },
    /// The per-task deadline elapsed before the generator call returned.
    DeadlineExceeded { task_id: String },
    /// The store lacks the composite index required for a scan.
    IndexMissing { index: String },
    /// A requested task does not exist.
    NotFound { task_id: String },
    /// The task document's state did not permit the requested transition.
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },
}

impl QueueError {
    /// Stable error classification for processor-level dispatch.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::NotClaimable { .. } => ErrorKind::NotClaimable,
            Self::Contended { .. } => ErrorKind::Contended,
            Self::ParseError { .. } => ErrorKind::ParseError,
            Self::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            Self::GeneratorError { .. } => ErrorKind::GeneratorError,
            Self::ArtifactWriteError { .. } => ErrorKind::ArtifactWriteError,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::IndexMissing { .. } => ErrorKind::IndexMissing,
            // Not part of the public §7 error-kind taxonomy but classified
            // for completeness: a missing or un-transitionable task is
            // treated like contention by the poller (try the next candidate).
            Self::NotFound { .. } => ErrorKind::Contended,
            Self::InvalidTransition { .. } => ErrorKind::NotClaimable,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::NotClaimable { task_id, .. }
            | Self::Contended { task_id }
            | Self::ParseError { task_id, .. }
            | Self::GeneratorError { task_id, .. }
            | Self::ArtifactWriteError { task_id, .. }
            | Self::DeadlineExceeded { task_id }
            | Self::NotFound { task_id }
            | Self::InvalidTransition { task_id, .. } => Some(task_id),
            Self::StoreUnavailable { .. }
            | Self::BudgetExceeded { .. }
            | Self::IndexMissing { .. } => None,
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreUnavailable { message } => {
                write!(f, "store unavailable: {message}")
            }
            Self::NotClaimable { task_id, status } => {
                write!(f, "task {task_id} is not claimable (status={status})")
            }
            Self::Contended { task_id } => {
                write!(f, "task {task_id} lost a concurrent write race")
            }
            Self::ParseError { task_id, message } => {
                write!(f, "task {task_id} could not be parsed: {message}")
            }
            Self::BudgetExceeded {
                user_id,
                limit_reached,
            } => {
                write!(
                    f,
                    "user {user_id} exceeded their {limit_reached} generation budget"
                )
            }
            Self::GeneratorError { task_id, message } => {
                write!(f, "task {task_id} generator error: {message}")
            }
            Self::ArtifactWriteError { task_id, message } => {
                write!(f, "task {task_id} artifact write failed: {message}")
            }
            Self::DeadlineExceeded { task_id } => {
                write!(f, "task {task_id} exceeded its per-task deadline")
            }
            Self::IndexMissing { index } => {
                write!(f, "store is missing the required composite index: {index}")
            }
            Self::NotFound { task_id } => {
                write!(f, "task {task_id} not found")
            }
            Self::InvalidTransition { task_id, from, to } => {
                write!(f, "task {task_id} cannot transition from {from} to {to}")
            }
        }
    }
}

impl std::error::Error for QueueError {}

pub type Result<T> = std::result::Result<T, QueueError>;
