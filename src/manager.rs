//! The task manager: create / claim / complete / fail / pause operations
//! expressed as single-document (CAS) transactions against a
//! [`QueueBackend`], plus the sibling `CourseStore` read/outline-write
//! capability (§6.1) and the read-only user/course listings.
//!
//! This is the generalization of the teacher's `GenericTaskStore<B>`:
//! the same "dumb backend + domain logic on top" split, the same
//! CAS-via-`put_if_version` transition pattern, but scheduling by
//! priority/age across the whole collection instead of per-owner
//! get/list.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;

use crate::config::ScanConfig;
use crate::error::QueueError;
use crate::store::{CourseBackend, QueueBackend, StoreError};
use crate::types::{
    claim::Claim,
    course::{BlockStatus, Course, Outline},
    priority::Priority,
    status::TaskStatus,
    task::{GenerationTask, NewTask, TaskKind},
};

fn map_store_error(task_id: &str, err: StoreError) -> QueueError {
    match err {
        StoreError::NotFound { .. } => QueueError::NotFound {
            task_id: task_id.to_string(),
        },
        StoreError::VersionConflict { .. } => QueueError::Contended {
            task_id: task_id.to_string(),
        },
        StoreError::Unavailable { message, .. } => QueueError::StoreUnavailable { message },
        StoreError::IndexMissing { index } => QueueError::IndexMissing { index },
    }
}

fn serialize(task: &GenerationTask) -> Result<Vec<u8>, QueueError> {
    serde_json::to_vec(task).map_err(|e| QueueError::ParseError {
        task_id: task.id.clone(),
        message: e.to_string(),
    })
}

fn deserialize(id: &str, data: &[u8]) -> Result<GenerationTask, QueueError> {
    serde_json::from_slice(data).map_err(|e| QueueError::ParseError {
        task_id: id.to_string(),
        message: e.to_string(),
    })
}

/// Persists tasks and effects atomic lifecycle transitions.
pub struct TaskManager {
    backend: Arc<dyn QueueBackend>,
    courses: Arc<dyn CourseBackend>,
    scan: ScanConfig,
    lease_duration: ChronoDuration,
    instance_id: String,
}

impl TaskManager {
    pub fn new(backend: Arc<dyn QueueBackend>, courses: Arc<dyn CourseBackend>) -> Self {
        Self {
            backend,
            courses,
            scan: ScanConfig::default(),
            lease_duration: ChronoDuration::from_std(crate::config::DEFAULT_LEASE_DURATION)
                .expect("default lease duration fits in a chrono::Duration"),
            instance_id: crate::instance::instance_id(),
        }
    }

    pub fn with_scan_config(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_lease_duration(mut self, d: std::time::Duration) -> Self {
        self.lease_duration = ChronoDuration::from_std(d).unwrap_or(self.lease_duration);
        self
    }

    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = id.into();
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &Arc<dyn QueueBackend> {
        &self.backend
    }

    async fn insert_new(&self, new: NewTask) -> Result<GenerationTask, QueueError> {
        let now = Utc::now();
        let task = GenerationTask::from_new(new, now);
        task.validate_fields()
            .map_err(|message| QueueError::ParseError {
                task_id: task.id.clone(),
                message,
            })?;
        let data = serialize(&task)?;
        self.backend
            .insert(&task.id, &data)
            .await
            .map_err(|e| map_store_error(&task.id, e))?;
        tracing::info!(
            task_id = %task.id,
            task_type = %task.kind,
            course_id = %task.course_id,
            user_id = %task.user_id,
            priority = %task.priority,
            "queue_tasks_enqueued"
        );
        Ok(task)
    }

    pub async fn create_outline_task(
        &self,
        course_id: impl Into<String>,
        user_id: impl Into<String>,
        tier: impl Into<String>,
    ) -> Result<GenerationTask, QueueError> {
        self.insert_new(NewTask {
            kind: TaskKind::Outline,
            priority: Priority::Medium,
            course_id: course_id.into(),
            section_id: None,
            lesson_id: None,
            block_id: None,
            user_id: user_id.into(),
            user_tier: tier.into(),
        })
        .await
    }

    pub async fn create_block_skeleton_task(
        &self,
        course_id: impl Into<String>,
        section_id: impl Into<String>,
        lesson_id: impl Into<String>,
        user_id: impl Into<String>,
        tier: impl Into<String>,
    ) -> Result<GenerationTask, QueueError> {
        self.insert_new(NewTask {
            kind: TaskKind::BlockSkeleton,
            priority: Priority::High,
            course_id: course_id.into(),
            section_id: Some(section_id.into()),
            lesson_id: Some(lesson_id.into()),
            block_id: None,
            user_id: user_id.into(),
            user_tier: tier.into(),
        })
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_block_content_task(
        &self,
        course_id: impl Into<String>,
        section_id: impl Into<String>,
        lesson_id: impl Into<String>,
        block_id: impl Into<String>,
        user_id: impl Into<String>,
        tier: impl Into<String>,
        priority: Priority,
    ) -> Result<GenerationTask, QueueError> {
        self.insert_new(NewTask {
            kind: TaskKind::BlockContent,
            priority,
            course_id: course_id.into(),
            section_id: Some(section_id.into()),
            lesson_id: Some(lesson_id.into()),
            block_id: Some(block_id.into()),
            user_id: user_id.into(),
            user_tier: tier.into(),
        })
        .await
    }

    /// Attempts to claim a single already-fetched candidate via CAS.
    /// Returns `Ok(None)` on version conflict (contention the caller
    /// should treat as "try the next candidate"), `Err` on any other
    /// store failure.
    async fn try_claim(
        &self,
        id: &str,
        mut task: GenerationTask,
        version: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<GenerationTask>, QueueError> {
        let next_version = version + 1;
        task.status = TaskStatus::Generating;
        task.claim = Some(Claim::new(&self.instance_id, now, self.lease_duration, next_version));
        task.updated_at = now;
        let data = serialize(&task)?;
        match self.backend.put_if_version(id, &data, version).await {
            Ok(_) => {
                tracing::info!(
                    task_id = %task.id,
                    task_type = %task.kind,
                    instance_id = %self.instance_id,
                    "queue_tasks_claimed"
                );
                Ok(Some(task))
            }
            Err(StoreError::VersionConflict { .. }) => Ok(None),
            Err(e) => Err(map_store_error(id, e)),
        }
    }

    /// Explicit claim of a known task id (as opposed to `get_next_task`'s
    /// scan-and-try). Refuses with `NotClaimable` if the task fails
    /// invariant 2; reports a racing claimer as `Contended`.
    pub async fn claim_task(&self, task_id: &str) -> Result<GenerationTask, QueueError> {
        let record = self
            .backend
            .get(task_id)
            .await
            .map_err(|e| map_store_error(task_id, e))?;
        let task = deserialize(task_id, &record.data)?;
        let now = Utc::now();
        if !task.is_claimable(now) {
            return Err(QueueError::NotClaimable {
                task_id: task_id.to_string(),
                status: task.status.to_string(),
            });
        }
        match self.try_claim(task_id, task, record.version, now).await? {
            Some(claimed) => Ok(claimed),
            None => Err(QueueError::Contended {
                task_id: task_id.to_string(),
            }),
        }
    }

    /// Polling read: across all `{Pending, Queued}` tasks, returns the
    /// task with minimum priority value, ties broken by oldest
    /// `createdAt`, scanning at most `scan.claim_window` candidates and
    /// claiming the first one not lost to contention.
    pub async fn get_next_task(&self) -> Result<Option<GenerationTask>, QueueError> {
        let all = self
            .backend
            .scan_all()
            .await
            .map_err(|e| map_store_error("*", e))?;
        let mut candidates: Vec<(String, GenerationTask, u64)> = Vec::new();
        for (id, record) in all {
            match deserialize(&id, &record.data) {
                Ok(task) if task.status.is_claimable_by_status() => {
                    candidates.push((id, task, record.version))
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(task_id = %id, error = %e, "skipping unparseable task document");
                    continue;
                }
            }
        }
        candidates.sort_by(|a, b| {
            a.1.priority
                .cmp(&b.1.priority)
                .then(a.1.created_at.cmp(&b.1.created_at))
        });
        let now = Utc::now();
        for (id, task, version) in candidates.into_iter().take(self.scan.claim_window) {
            if let Some(claimed) = self.try_claim(&id, task, version, now).await? {
                return Ok(Some(claimed));
            }
            // contended: try the next candidate
        }
        Ok(None)
    }

    async fn transition(
        &self,
        task_id: &str,
        apply: impl FnOnce(&mut GenerationTask, DateTime<Utc>),
        target_is_ready_noop: bool,
    ) -> Result<GenerationTask, QueueError> {
        let record = self
            .backend
            .get(task_id)
            .await
            .map_err(|e| map_store_error(task_id, e))?;
        let mut task = deserialize(task_id, &record.data)?;
        if target_is_ready_noop && task.status == TaskStatus::Ready {
            // Double-Complete is a no-op: the final status is still Ready.
            return Ok(task);
        }
        let now = Utc::now();
        apply(&mut task, now);
        let data = serialize(&task)?;
        self.backend
            .put_if_version(task_id, &data, record.version)
            .await
            .map_err(|e| map_store_error(task_id, e))?;
        Ok(task)
    }

    pub async fn complete_task(&self, task_id: &str) -> Result<GenerationTask, QueueError> {
        let task = self
            .transition(
                task_id,
                |task, now| {
                    task.status = TaskStatus::Ready;
                    task.completed_at = Some(now);
                    task.claim = None;
                    task.updated_at = now;
                },
                true,
            )
            .await?;
        tracing::info!(task_id = %task.id, task_type = %task.kind, "queue_tasks_completed");
        Ok(task)
    }

    pub async fn fail_task(
        &self,
        task_id: &str,
        message: impl Into<String>,
    ) -> Result<GenerationTask, QueueError> {
        let message = message.into();
        let task = self
            .transition(
                task_id,
                |task, now| {
                    task.status = TaskStatus::Error;
                    task.error = Some(message.clone());
                    task.claim = None;
                    task.updated_at = now;
                },
                false,
            )
            .await?;
        tracing::warn!(task_id = %task.id, task_type = %task.kind, error = %task.error.clone().unwrap_or_default(), "queue_tasks_failed");
        Ok(task)
    }

    pub async fn pause_task_for_token_limit(
        &self,
        task_id: &str,
    ) -> Result<GenerationTask, QueueError> {
        let task = self
            .transition(
                task_id,
                |task, now| {
                    task.status = TaskStatus::TokenLimit;
                    task.claim = None;
                    task.updated_at = now;
                },
                false,
            )
            .await?;
        tracing::info!(task_id = %task.id, task_type = %task.kind, "queue_tasks_token_limit");
        Ok(task)
    }

    /// Returns the task document unmodified (read-only convenience used
    /// by callers and tests; not itself part of the spec's operation
    /// list but needed to observe the result of the operations above).
    pub async fn get_task(&self, task_id: &str) -> Result<GenerationTask, QueueError> {
        let record = self
            .backend
            .get(task_id)
            .await
            .map_err(|e| map_store_error(task_id, e))?;
        deserialize(task_id, &record.data)
    }

    /// Periodic sweep: any `Generating` task whose claim is absent or
    /// expired is atomically returned to `Queued`.
    pub async fn recover_stale_tasks(&self) -> Result<usize, QueueError> {
        let all = self.backend.scan_all().await.map_err(|e| map_store_error("*", e))?;
        let now = Utc::now();
        let mut recovered = 0usize;
        let mut considered = 0usize;
        for (id, record) in all {
            if considered >= self.scan.recovery_scan_limit {
                break;
            }
            let task = match deserialize(&id, &record.data) {
                Ok(t) if t.status == TaskStatus::Generating => t,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(task_id = %id, error = %e, "skipping unparseable task during recovery");
                    continue;
                }
            };
            considered += 1;
            let stale = task.claim.as_ref().is_none_or(|c| c.is_expired(now));
            if !stale {
                continue;
            }
            let mut updated = task;
            updated.status = TaskStatus::Queued;
            updated.claim = None;
            updated.updated_at = now;
            let data = match serialize(&updated) {
                Ok(d) => d,
                Err(_) => continue,
            };
            match self.backend.put_if_version(&id, &data, record.version).await {
                Ok(_) => {
                    recovered += 1;
                    tracing::info!(task_id = %id, "queue_tasks_recovered");
                }
                Err(StoreError::VersionConflict { .. }) => {
                    // Another sweeper or a late completion raced us; skip.
                }
                Err(e) => {
                    tracing::warn!(task_id = %id, error = %map_store_error(&id, e), "recovery update failed");
                }
            }
        }
        Ok(recovered)
    }

    async fn list_by(
        &self,
        matches: impl Fn(&GenerationTask) -> bool,
    ) -> Result<Vec<GenerationTask>, QueueError> {
        let all = self.backend.scan_all().await.map_err(|e| map_store_error("*", e))?;
        let mut tasks: Vec<GenerationTask> = all
            .into_iter()
            .filter_map(|(id, record)| deserialize(&id, &record.data).ok())
            .filter(matches)
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(self.scan.listing_limit);
        Ok(tasks)
    }

    pub async fn get_tasks_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<GenerationTask>, QueueError> {
        self.list_by(|t| t.user_id == user_id).await
    }

    pub async fn get_tasks_by_course(
        &self,
        course_id: &str,
    ) -> Result<Vec<GenerationTask>, QueueError> {
        self.list_by(|t| t.course_id == course_id).await
    }

    /// Admin operation (Open Question decision, see DESIGN.md): lifts
    /// every `TokenLimit` task for `user_id` back to `Queued`. The core
    /// never calls this itself.
    pub async fn resume_token_limited_tasks(&self, user_id: &str) -> Result<usize, QueueError> {
        let all = self.backend.scan_all().await.map_err(|e| map_store_error("*", e))?;
        let now = Utc::now();
        let mut resumed = 0usize;
        for (id, record) in all {
            let task = match deserialize(&id, &record.data) {
                Ok(t) if t.status == TaskStatus::TokenLimit && t.user_id == user_id => t,
                _ => continue,
            };
            let mut updated = task;
            updated.status = TaskStatus::Queued;
            updated.updated_at = now;
            let data = match serialize(&updated) {
                Ok(d) => d,
                Err(_) => continue,
            };
            if self
                .backend
                .put_if_version(&id, &data, record.version)
                .await
                .is_ok()
            {
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    // --- Course collection (sibling store, §6.1) ---

    pub async fn get_course(&self, course_id: &str) -> Result<Course, QueueError> {
        let record = self
            .courses
            .get(course_id)
            .await
            .map_err(|e| map_store_error(course_id, e))?;
        serde_json::from_slice(&record.data).map_err(|e| QueueError::ParseError {
            task_id: course_id.to_string(),
            message: e.to_string(),
        })
    }

    /// Attaches a generated outline to the course document: sets
    /// `outline`, `outlineStatus=Ready`, and `totalLessons`.
    pub async fn set_course_outline(
        &self,
        course_id: &str,
        outline: Outline,
    ) -> Result<Course, QueueError> {
        let record = self
            .courses
            .get(course_id)
            .await
            .map_err(|e| map_store_error(course_id, e))?;
        let mut course: Course = serde_json::from_slice(&record.data).map_err(|e| {
            QueueError::ParseError {
                task_id: course_id.to_string(),
                message: e.to_string(),
            }
        })?;
        course.total_lessons = crate::types::course::count_lessons(Some(&outline));
        course.outline = Some(outline);
        course.outline_status = Some(BlockStatus::Ready);
        let data = serde_json::to_vec(&course).map_err(|e| QueueError::ParseError {
            task_id: course_id.to_string(),
            message: e.to_string(),
        })?;
        self.courses
            .put_if_version(course_id, &data, record.version)
            .await
            .map_err(|e| map_store_error(course_id, e))?;
        Ok(course)
    }

    /// Field-path update of a single lesson's `blocksStatus`, used by the
    /// cascade (§4.6) to mark a lesson as queued/ready without touching
    /// the rest of the outline. No-op (but not an error) if the
    /// section/lesson can't be found, matching the spec's framing of the
    /// course document as owned by the artifact store rather than the
    /// queue core.
    pub async fn set_lesson_blocks_status(
        &self,
        course_id: &str,
        section_id: &str,
        lesson_id: &str,
        status: BlockStatus,
    ) -> Result<(), QueueError> {
        let record = self
            .courses
            .get(course_id)
            .await
            .map_err(|e| map_store_error(course_id, e))?;
        let mut course: Course = serde_json::from_slice(&record.data).map_err(|e| {
            QueueError::ParseError {
                task_id: course_id.to_string(),
                message: e.to_string(),
            }
        })?;
        let Some(outline) = course.outline.as_mut() else {
            return Ok(());
        };
        let Some(section) = outline.sections.iter_mut().find(|s| s.id == section_id) else {
            return Ok(());
        };
        let Some(lesson) = section.lessons.iter_mut().find(|l| l.id == lesson_id) else {
            return Ok(());
        };
        lesson.blocks_status = Some(status);
        let data = serde_json::to_vec(&course).map_err(|e| QueueError::ParseError {
            task_id: course_id.to_string(),
            message: e.to_string(),
        })?;
        self.courses
            .put_if_version(course_id, &data, record.version)
            .await
            .map_err(|e| map_store_error(course_id, e))?;
        Ok(())
    }
}
