//! [`GenerationTask`] — one document per unit of work, and [`TaskKind`],
//! its dispatch key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::claim::Claim;
use super::priority::Priority;
use super::status::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    Outline,
    BlockSkeleton,
    BlockContent,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Outline => "Outline",
            Self::BlockSkeleton => "BlockSkeleton",
            Self::BlockContent => "BlockContent",
        };
        f.write_str(s)
    }
}

/// Central task document. Field-level validity (invariant 5) is checked
/// by [`GenerationTask::validate_fields`], not enforced by the type
/// system: the wire shape is a flat optional-field record like the
/// teacher's `Task`/`TaskRecord`, since per-kind required fields are a
/// cross-field invariant rather than something an enum-of-structs would
/// make meaningfully cheaper to check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTask {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub priority: Priority,
    pub course_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
    pub user_id: String,
    pub user_tier: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<Claim>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fields needed to create a new task, before the manager assigns id,
/// timestamps, and initial status.
pub struct NewTask {
    pub kind: TaskKind,
    pub priority: Priority,
    pub course_id: String,
    pub section_id: Option<String>,
    pub lesson_id: Option<String>,
    pub block_id: Option<String>,
    pub user_id: String,
    pub user_tier: String,
}

impl GenerationTask {
    pub fn from_new(new: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            priority: new.priority,
            course_id: new.course_id,
            section_id: new.section_id,
            lesson_id: new.lesson_id,
            block_id: new.block_id,
            user_id: new.user_id,
            user_tier: new.user_tier,
            status: TaskStatus::Pending,
            claim: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
        }
    }

    /// Invariant 5: required identifying fields per task kind.
    pub fn validate_fields(&self) -> Result<(), String> {
        let non_empty = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.is_empty());
        match self.kind {
            TaskKind::Outline => Ok(()),
            TaskKind::BlockSkeleton => {
                if non_empty(&self.section_id) && non_empty(&self.lesson_id) {
                    Ok(())
                } else {
                    Err("BlockSkeleton requires sectionId and lessonId".to_string())
                }
            }
            TaskKind::BlockContent => {
                if non_empty(&self.section_id)
                    && non_empty(&self.lesson_id)
                    && non_empty(&self.block_id)
                {
                    Ok(())
                } else {
                    Err("BlockContent requires sectionId, lessonId and blockId".to_string())
                }
            }
        }
    }

    /// Invariant 1: `status = Generating ⇔ claim ≠ absent`.
    pub fn claim_status_consistent(&self) -> bool {
        (self.status == TaskStatus::Generating) == self.claim.is_some()
    }

    /// Invariant 2.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        if self.status.is_claimable_by_status() {
            return true;
        }
        self.status == TaskStatus::Generating
            && self.claim.as_ref().is_some_and(|c| c.is_expired(now))
    }
}
