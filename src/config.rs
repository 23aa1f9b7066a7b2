//! Plain configuration types with `Default` + `with_*` builders,
//! mirroring the teacher's `StoreConfig`/`TaskSecurityConfig`. These are
//! types only: nothing here reads environment variables or files — that
//! loading is the caller's job (spec §1, ambient stack).

use std::time::Duration;

/// Default per-task generation deadline, used by [`crate::processor::Processor`]
/// unless overridden via `Processor::with_task_timeout`.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Default claim lease, used by [`crate::manager::TaskManager`] unless
/// overridden via `TaskManager::with_lease_duration`.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(180);

/// Worker pool polling configuration.
///
/// # Lease discipline
///
/// The spec requires `recovery_interval < lease_duration < task_timeout`
/// so that (a) a live worker can extend a lease before it expires, (b) a
/// stuck task is noticed by recovery before its own deadline, and (c) a
/// clean completion cannot be raced by recovery. Only `recovery_interval`
/// lives here: the lease and the per-task deadline are properties of the
/// `TaskManager` and `Processor` the pool drives (`TaskManager::with_lease_duration`,
/// `Processor::with_task_timeout`), not of the pool itself, since a
/// `WorkerPool` is handed already-constructed `Arc<TaskManager>`/`Arc<Processor>`
/// rather than building them. An operator retuning the lease or the
/// deadline must set them on those components directly, and keep the
/// ordering above across whichever values are in play; it is documented
/// here, not validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub recovery_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            poll_interval: Duration::from_secs(5),
            recovery_interval: Duration::from_secs(90),
        }
    }
}

impl PoolConfig {
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn with_poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    pub fn with_recovery_interval(mut self, d: Duration) -> Self {
        self.recovery_interval = d;
        self
    }
}

/// Cascade and progressive-generation policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeConfig {
    /// Number of lessons to enqueue `BlockSkeleton` tasks for when an
    /// outline completes. Spec default: 2.
    pub progressive_lesson_buffer: usize,
    /// Number of upcoming blocks `QueuePregeneration` enqueues
    /// `BlockContent` tasks for. The spec leaves this value to the
    /// implementer; 3 gives a small lookahead buffer similar in spirit
    /// to `progressive_lesson_buffer`.
    pub pre_generation_depth: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            progressive_lesson_buffer: 2,
            pre_generation_depth: 3,
        }
    }
}

impl CascadeConfig {
    pub fn with_progressive_lesson_buffer(mut self, n: usize) -> Self {
        self.progressive_lesson_buffer = n;
        self
    }

    pub fn with_pre_generation_depth(mut self, n: usize) -> Self {
        self.pre_generation_depth = n;
        self
    }
}

/// Bounds on the manager's polling/listing scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Size of the bounded candidate window `GetNextTask` scans before
    /// giving up (spec §4.2: "may scan a small bounded window, e.g. top
    /// 10 candidates").
    pub claim_window: usize,
    /// Cap on tasks considered per recovery sweep (spec §4.5: 100).
    pub recovery_scan_limit: usize,
    /// Cap on `GetTasksByUser`/`GetTasksByCourse` results (spec §4.2: 50).
    pub listing_limit: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            claim_window: 10,
            recovery_scan_limit: 100,
            listing_limit: 50,
        }
    }
}
