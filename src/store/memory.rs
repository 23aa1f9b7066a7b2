//! In-memory backend for both the task and course collections, using
//! `DashMap` for concurrent, shard-level-locked key-value storage.
//!
//! Mirrors the teacher's `InMemoryBackend`: a dumb store holding
//! `(Vec<u8>, u64)` tuples where the `u64` is a monotonic version
//! counter starting at 1. No domain logic lives here.

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::{CourseBackend, QueueBackend, StoreError, VersionedRecord};

/// Thread-safe in-memory store for both collections the core consumes
/// (`generation_queue` and `courses`). A single struct is used because
/// the two collections are always opened together in practice and
/// nothing about the KV layer differs between them; a production
/// deployment would more likely have two independently-scaled stores,
/// each still implementing one trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tasks: DashMap<String, (Vec<u8>, u64)>,
    courses: DashMap<String, (Vec<u8>, u64)>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

#[async_trait]
impl QueueBackend for InMemoryStore {
    async fn get(&self, id: &str) -> Result<VersionedRecord, StoreError> {
        let entry = self.tasks.get(id).ok_or_else(|| StoreError::NotFound {
            key: id.to_string(),
        })?;
        let (data, version) = entry.value();
        Ok(VersionedRecord {
            data: data.clone(),
            version: *version,
        })
    }

    async fn insert(&self, id: &str, data: &[u8]) -> Result<u64, StoreError> {
        if self.tasks.contains_key(id) {
            return Err(StoreError::VersionConflict {
                key: id.to_string(),
                expected: 0,
                actual: self.tasks.get(id).map(|e| e.value().1).unwrap_or(0),
            });
        }
        self.tasks.insert(id.to_string(), (data.to_vec(), 1));
        Ok(1)
    }

    async fn put_if_version(
        &self,
        id: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut entry = self.tasks.get_mut(id).ok_or_else(|| StoreError::NotFound {
            key: id.to_string(),
        })?;
        let current_version = entry.value().1;
        if current_version != expected_version {
            return Err(StoreError::VersionConflict {
                key: id.to_string(),
                expected: expected_version,
                actual: current_version,
            });
        }
        let new_version = current_version + 1;
        *entry.value_mut() = (data.to_vec(), new_version);
        Ok(new_version)
    }

    async fn scan_all(&self) -> Result<Vec<(String, VersionedRecord)>, StoreError> {
        Ok(self
            .tasks
            .iter()
            .map(|entry| {
                let (data, version) = entry.value();
                (
                    entry.key().clone(),
                    VersionedRecord {
                        data: data.clone(),
                        version: *version,
                    },
                )
            })
            .collect())
    }
}

#[async_trait]
impl CourseBackend for InMemoryStore {
    async fn get(&self, course_id: &str) -> Result<VersionedRecord, StoreError> {
        let entry = self
            .courses
            .get(course_id)
            .ok_or_else(|| StoreError::NotFound {
                key: course_id.to_string(),
            })?;
        let (data, version) = entry.value();
        Ok(VersionedRecord {
            data: data.clone(),
            version: *version,
        })
    }

    async fn put_if_version(
        &self,
        course_id: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut entry = self
            .courses
            .get_mut(course_id)
            .ok_or_else(|| StoreError::NotFound {
                key: course_id.to_string(),
            })?;
        let current_version = entry.value().1;
        if current_version != expected_version {
            return Err(StoreError::VersionConflict {
                key: course_id.to_string(),
                expected: expected_version,
                actual: current_version,
            });
        }
        let new_version = current_version + 1;
        *entry.value_mut() = (data.to_vec(), new_version);
        Ok(new_version)
    }

    async fn put(&self, course_id: &str, data: &[u8]) -> Result<u64, StoreError> {
        let new_version = self
            .courses
            .get(course_id)
            .map_or(1, |entry| entry.value().1 + 1);
        self.courses
            .insert(course_id.to_string(), (data.to_vec(), new_version));
        Ok(new_version)
    }
}
