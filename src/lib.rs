//! Distributed, persistent, priority-ordered generation task queue for a
//! staged LLM content pipeline (course outlines, lesson skeletons, block
//! content).
//!
//! # Overview
//!
//! Work items (`GenerationTask`) live in a shared store behind the
//! [`store::QueueBackend`] trait and are scheduled by a bounded
//! priority/age scan rather than a strict global order. Workers claim a
//! task with an optimistic-concurrency (CAS) write that also attaches a
//! time-bounded [`types::claim::Claim`]; a periodic sweep
//! ([`recovery::RecoverySweeper`]) reclaims tasks whose claim expired
//! without completion. Generation itself is never built into this crate:
//! it is injected per-deployment through [`types::generator::Generator`],
//! a struct of optional async callbacks.
//!
//! # Module organization
//!
//! - [`error`] - the crate-wide [`error::QueueError`] type and its stable [`error::ErrorKind`] classification
//! - [`types`] - wire and domain types: task, status, priority, claim, course, generator
//! - [`store`] - the [`store::QueueBackend`]/[`store::CourseBackend`] traits and an in-memory reference backend
//! - [`config`] - plain configuration structs for the pool, cascade policy, and scan bounds
//! - [`instance`] - per-process instance identifier used in claims
//! - [`manager`] - [`manager::TaskManager`], the domain layer: create/claim/complete/fail/pause/list/recover
//! - [`cascade`] - progressive and pre-generation enqueue policy built on top of the manager
//! - [`processor`] - the per-task pipeline: budget gate, produce, persist, cascade, complete
//! - [`pool`] - the worker pool: fixed-concurrency polling workers plus a recovery sweeper, with idempotent start/stop
//! - [`recovery`] - the periodic stale-claim sweep the pool runs alongside its workers

pub mod cascade;
pub mod config;
pub mod error;
pub mod instance;
pub mod manager;
pub mod pool;
pub mod processor;
pub mod recovery;
pub mod store;
pub mod types;

pub use cascade::Cascade;
pub use config::{CascadeConfig, PoolConfig, ScanConfig};
pub use error::{ErrorKind, QueueError, Result};
pub use manager::TaskManager;
pub use pool::WorkerPool;
pub use processor::Processor;
pub use recovery::RecoverySweeper;
pub use store::{CourseBackend, InMemoryStore, QueueBackend, StoreError, VersionedRecord};
pub use types::{
    Block, BlockStatus, Claim, Course, GenerationTask, Generator, Lesson, LessonPosition,
    NewTask, Outline, Priority, Section, TaskKind, TaskStatus,
};
