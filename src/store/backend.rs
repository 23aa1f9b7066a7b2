//! Dumb key-value storage traits. No domain logic lives here: state
//! machine validation, priority/age ordering, and owner scoping all live
//! in [`crate::manager`]. Backends only know how to store and
//! version-guard opaque byte blobs.

use async_trait::async_trait;
use std::fmt;

/// A stored record plus the version it was read at, for optimistic
/// concurrency control.
#[derive(Debug, Clone)]
pub struct VersionedRecord {
    pub data: Vec<u8>,
    pub version: u64,
}

#[derive(Debug)]
pub enum StoreError {
    NotFound {
        key: String,
    },
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },
    /// The backend could not be reached.
    Unavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    /// The backend does not support the composite index a scan needs.
    IndexMissing {
        index: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { key } => write!(f, "key not found: {key}"),
            Self::VersionConflict {
                key,
                expected,
                actual,
            } => write!(
                f,
                "version conflict for {key}: expected {expected}, actual {actual}"
            ),
            Self::Unavailable { message, .. } => write!(f, "store unavailable: {message}"),
            Self::IndexMissing { index } => write!(f, "missing composite index: {index}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unavailable { source, .. } => {
                source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// Dumb KV backend for the task collection (`generation_queue`, §6.1).
///
/// `scan_all` is intentionally the only read-many primitive: it hands
/// back every stored record so the domain layer in [`crate::manager`]
/// can apply status/priority/age filtering and the bounded-window
/// claimable scan. A production backend (Firestore, Postgres, ...) would
/// instead push that filtering into its own composite-indexed query and
/// implement this trait with a narrower, paginated `scan_all`; the
/// in-memory backend included here takes the simplest correct path.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn get(&self, id: &str) -> Result<VersionedRecord, StoreError>;
    /// Inserts a brand-new record at version 1. Fails if `id` exists.
    async fn insert(&self, id: &str, data: &[u8]) -> Result<u64, StoreError>;
    async fn put_if_version(
        &self,
        id: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StoreError>;
    async fn scan_all(&self) -> Result<Vec<(String, VersionedRecord)>, StoreError>;
}

/// Dumb KV backend for the sibling `courses` collection (§6.1).
#[async_trait]
pub trait CourseBackend: Send + Sync {
    async fn get(&self, course_id: &str) -> Result<VersionedRecord, StoreError>;
    async fn put_if_version(
        &self,
        course_id: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StoreError>;
    /// Seeds a course document (test/fixture helper; the queue core
    /// never creates courses itself, only reads and field-path-updates
    /// them).
    async fn put(&self, course_id: &str, data: &[u8]) -> Result<u64, StoreError>;
}
