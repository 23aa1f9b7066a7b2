//! Progressive generation policy (§4.6): what gets enqueued next after an
//! outline or a lesson completes, so the whole course is never generated
//! eagerly in one burst.
//!
//! No direct teacher analogue exists for this policy; it is built on top
//! of [`crate::manager::TaskManager`] and [`crate::types::course`] using
//! the same CAS-transaction style the rest of the queue uses.

use crate::config::CascadeConfig;
use crate::error::QueueError;
use crate::manager::TaskManager;
use crate::types::course::{BlockStatus, LessonPosition};
use crate::types::priority::Priority;

/// Cascade and progressive-generation operations, parameterized over a
/// [`TaskManager`] and a [`CascadeConfig`].
pub struct Cascade<'a> {
    manager: &'a TaskManager,
    config: CascadeConfig,
}

impl<'a> Cascade<'a> {
    pub fn new(manager: &'a TaskManager, config: CascadeConfig) -> Self {
        Self { manager, config }
    }

    /// Called once a course's outline finishes generating. Enqueues
    /// `BlockSkeleton` tasks for only the first
    /// `progressive_lesson_buffer` lessons (in outline order), not the
    /// whole course — the rest are queued lesson-by-lesson as the
    /// learner advances, via [`Self::queue_next_lesson`].
    pub async fn on_outline_complete(
        &self,
        course_id: &str,
        user_id: &str,
        tier: &str,
    ) -> Result<usize, QueueError> {
        let course = self.manager.get_course(course_id).await?;
        let Some(outline) = course.outline.as_ref() else {
            return Ok(0);
        };
        let targets: Vec<(String, String)> = outline
            .iter_lessons()
            .take(self.config.progressive_lesson_buffer)
            .map(|(_, section, lesson)| (section.id.clone(), lesson.id.clone()))
            .collect();
        let mut queued = 0usize;
        for (section_id, lesson_id) in targets {
            self.manager
                .create_block_skeleton_task(course_id, &section_id, &lesson_id, user_id, tier)
                .await?;
            self.manager
                .set_lesson_blocks_status(course_id, &section_id, &lesson_id, BlockStatus::Queued)
                .await?;
            queued += 1;
        }
        tracing::info!(
            course_id,
            queued,
            "cascade_outline_complete_skeletons_queued"
        );
        Ok(queued)
    }

    /// Called when a learner advances past `from` within a course's
    /// outline. Enqueues a `BlockSkeleton` task for the next lesson in
    /// outline order, if one exists and its `blocksStatus` is absent or
    /// `Pending`. Idempotent: repeating the same call once the lesson has
    /// been marked `Queued` enqueues nothing further.
    pub async fn queue_next_lesson(
        &self,
        course_id: &str,
        from: LessonPosition,
        user_id: &str,
        tier: &str,
    ) -> Result<bool, QueueError> {
        let course = self.manager.get_course(course_id).await?;
        let Some(outline) = course.outline.as_ref() else {
            return Ok(false);
        };
        let Some(next) = outline.next_position(from) else {
            return Ok(false);
        };
        let Some(section) = outline.section_at(next) else {
            return Ok(false);
        };
        let Some(lesson) = outline.lesson_at(next) else {
            return Ok(false);
        };
        // Idempotence (§4.6/§8): a lesson already queued/generating/ready
        // is left alone — only a lesson with no blocksStatus yet, or one
        // still Pending, gets a fresh skeleton task.
        if matches!(lesson.blocks_status, Some(status) if status != BlockStatus::Pending) {
            return Ok(false);
        }
        let section_id = section.id.clone();
        let lesson_id = lesson.id.clone();
        self.manager
            .create_block_skeleton_task(course_id, &section_id, &lesson_id, user_id, tier)
            .await?;
        self.manager
            .set_lesson_blocks_status(course_id, &section_id, &lesson_id, BlockStatus::Queued)
            .await?;
        tracing::info!(course_id, lesson_id = %lesson_id, "cascade_next_lesson_queued");
        Ok(true)
    }

    /// Look-ahead enqueue: once a lesson's block skeletons are ready,
    /// queues `BlockContent` tasks for up to `pre_generation_depth`
    /// blocks in that lesson so content generation runs ahead of the
    /// learner reaching each block.
    pub async fn queue_pregeneration(
        &self,
        course_id: &str,
        section_id: &str,
        lesson_id: &str,
        user_id: &str,
        tier: &str,
    ) -> Result<usize, QueueError> {
        let course = self.manager.get_course(course_id).await?;
        let Some(outline) = course.outline.as_ref() else {
            return Ok(0);
        };
        let Some(section) = outline.sections.iter().find(|s| s.id == section_id) else {
            return Ok(0);
        };
        let Some(lesson) = section.lessons.iter().find(|l| l.id == lesson_id) else {
            return Ok(0);
        };
        let mut queued = 0usize;
        for block in lesson
            .blocks
            .iter()
            .filter(|b| b.content_status == BlockStatus::Pending)
            .take(self.config.pre_generation_depth)
        {
            self.manager
                .create_block_content_task(
                    course_id,
                    section_id,
                    lesson_id,
                    &block.id,
                    user_id,
                    tier,
                    Priority::Low,
                )
                .await?;
            queued += 1;
        }
        tracing::info!(course_id, lesson_id, queued, "cascade_pregeneration_queued");
        Ok(queued)
    }
}
