//! The per-task pipeline (§4.3, §4.7): budget gate, artifact production,
//! usage accounting, artifact persistence, cascade, completion — with the
//! error-classification table turning generator/budget outcomes into the
//! right terminal (or pausable) task state instead of a crashed worker.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cascade::Cascade;
use crate::config::CascadeConfig;
use crate::error::{ErrorKind, QueueError};
use crate::manager::TaskManager;
use crate::types::generator::{
    CheckBudgetArgs, Generator, IncrementUsageArgs, ProduceBlockContentArgs,
    ProduceOutlineArgs, ProduceSkeletonsArgs, WriteBlockContentArgs, WriteLessonBlocksArgs,
};
use crate::types::status::TaskStatus;
use crate::types::task::{GenerationTask, TaskKind};

/// Drives a single claimed task through production, persistence and
/// cascade. Infrastructure failures (store unreachable, lost a CAS race)
/// are returned as `Err`; every other outcome — success, budget pause,
/// generator failure — is folded into the task's own terminal state and
/// returned as `Ok`.
pub struct Processor {
    manager: Arc<TaskManager>,
    generator: Arc<Generator>,
    cascade_config: CascadeConfig,
    task_timeout: Duration,
}

impl Processor {
    pub fn new(manager: Arc<TaskManager>, generator: Arc<Generator>) -> Self {
        Self {
            manager,
            generator,
            cascade_config: CascadeConfig::default(),
            task_timeout: crate::config::DEFAULT_TASK_TIMEOUT,
        }
    }

    pub fn with_cascade_config(mut self, config: CascadeConfig) -> Self {
        self.cascade_config = config;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Processes one already-claimed task to a terminal or pausable
    /// outcome. The caller (the worker pool) is responsible for claiming
    /// the task beforehand via [`TaskManager::get_next_task`].
    pub async fn process(&self, task: GenerationTask) -> Result<(), QueueError> {
        debug_assert_eq!(task.status, TaskStatus::Generating);
        let task_id = task.id.clone();
        let cancellation = CancellationToken::new();

        let result = match task.kind {
            TaskKind::Outline => self.process_outline(&task, cancellation.clone()).await,
            TaskKind::BlockSkeleton => self.process_skeleton(&task, cancellation.clone()).await,
            TaskKind::BlockContent => self.process_content(&task, cancellation.clone()).await,
        };

        match result {
            Ok(StepOutcome::Completed) => {
                self.manager.complete_task(&task_id).await?;
            }
            Ok(StepOutcome::Paused) => {
                self.manager.pause_task_for_token_limit(&task_id).await?;
            }
            Ok(StepOutcome::Failed(message)) => {
                tracing::warn!(task_id = %task_id, error = %message, "queue_processor_task_failed");
                self.manager.fail_task(&task_id, message).await?;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    async fn check_budget(&self, task: &GenerationTask) -> Result<Option<StepOutcome>, QueueError> {
        let budget = self
            .generator
            .check_budget(
                &task.id,
                CheckBudgetArgs {
                    user_id: task.user_id.clone(),
                    tier: task.user_tier.clone(),
                },
            )
            .await;
        match budget {
            Ok(result) if !result.allowed => {
                tracing::info!(
                    task_id = %task.id,
                    limit = result.limit_reached.as_deref().unwrap_or("unknown"),
                    "queue_processor_budget_exceeded"
                );
                Ok(Some(StepOutcome::Paused))
            }
            Ok(_) => Ok(None),
            Err(err) => Ok(Some(classify_error(err))),
        }
    }

    async fn with_deadline<F, T>(
        &self,
        cancellation: CancellationToken,
        fut: F,
    ) -> Result<Result<T, QueueError>, QueueError>
    where
        F: std::future::Future<Output = Result<T, QueueError>>,
    {
        match tokio::time::timeout(self.task_timeout, fut).await {
            Ok(inner) => Ok(inner),
            Err(_) => {
                cancellation.cancel();
                Err(QueueError::DeadlineExceeded { task_id: String::new() })
            }
        }
    }

    async fn process_outline(
        &self,
        task: &GenerationTask,
        cancellation: CancellationToken,
    ) -> Result<StepOutcome, QueueError> {
        if let Some(outcome) = self.check_budget(task).await? {
            return Ok(outcome);
        }
        let course = match self.manager.get_course(&task.course_id).await {
            Ok(course) => course,
            Err(err) => return Ok(classify_error(err)),
        };

        let produced = self
            .with_deadline(
                cancellation.clone(),
                self.generator.produce_outline(
                    &task.id,
                    ProduceOutlineArgs {
                        course_title: course.title.clone(),
                        tier: task.user_tier.clone(),
                        cancellation: cancellation.clone(),
                    },
                ),
            )
            .await;
        let produced = match produced {
            Ok(Ok(p)) => p,
            Ok(Err(err)) => return Ok(classify_error(err)),
            Err(timeout_err) => return Ok(classify_error(timeout_err)),
        };

        if let Err(err) = self
            .generator
            .increment_usage(
                &task.id,
                IncrementUsageArgs {
                    user_id: task.user_id.clone(),
                    tier: task.user_tier.clone(),
                    input_tokens: 0,
                    output_tokens: produced.tokens_used,
                },
            )
            .await
        {
            tracing::warn!(task_id = %task.id, error = %err, "usage accounting failed, continuing");
        }

        if let Err(err) = self
            .manager
            .set_course_outline(&task.course_id, produced.outline)
            .await
        {
            return Ok(classify_error(err));
        }

        let cascade = Cascade::new(&self.manager, self.cascade_config);
        if let Err(err) = cascade
            .on_outline_complete(&task.course_id, &task.user_id, &task.user_tier)
            .await
        {
            tracing::warn!(task_id = %task.id, error = %err, "cascade after outline completion failed");
        }

        Ok(StepOutcome::Completed)
    }

    async fn process_skeleton(
        &self,
        task: &GenerationTask,
        cancellation: CancellationToken,
    ) -> Result<StepOutcome, QueueError> {
        if let Some(outcome) = self.check_budget(task).await? {
            return Ok(outcome);
        }
        let (section_id, lesson_id) = match (&task.section_id, &task.lesson_id) {
            (Some(s), Some(l)) => (s.clone(), l.clone()),
            _ => {
                return Ok(StepOutcome::Failed(
                    "block skeleton task missing sectionId/lessonId".to_string(),
                ))
            }
        };
        let course = match self.manager.get_course(&task.course_id).await {
            Ok(course) => course,
            Err(err) => return Ok(classify_error(err)),
        };

        let produced = self
            .with_deadline(
                cancellation.clone(),
                self.generator.produce_skeletons(
                    &task.id,
                    ProduceSkeletonsArgs {
                        course: course.clone(),
                        section_id: section_id.clone(),
                        lesson_id: lesson_id.clone(),
                        tier: task.user_tier.clone(),
                        cancellation: cancellation.clone(),
                    },
                ),
            )
            .await;
        let produced = match produced {
            Ok(Ok(p)) => p,
            Ok(Err(err)) => return Ok(classify_error(err)),
            Err(timeout_err) => return Ok(classify_error(timeout_err)),
        };

        if let Err(err) = self
            .generator
            .increment_usage(
                &task.id,
                IncrementUsageArgs {
                    user_id: task.user_id.clone(),
                    tier: task.user_tier.clone(),
                    input_tokens: 0,
                    output_tokens: produced.tokens_used,
                },
            )
            .await
        {
            tracing::warn!(task_id = %task.id, error = %err, "usage accounting failed, continuing");
        }

        if let Err(err) = self
            .generator
            .write_lesson_blocks(
                &task.id,
                WriteLessonBlocksArgs {
                    course_id: task.course_id.clone(),
                    section_id: section_id.clone(),
                    lesson_id: lesson_id.clone(),
                    blocks: produced.blocks,
                    status: crate::types::course::BlockStatus::Ready,
                },
            )
            .await
        {
            return Ok(classify_error(err));
        }

        let cascade = Cascade::new(&self.manager, self.cascade_config);
        if let Err(err) = cascade
            .queue_pregeneration(&task.course_id, &section_id, &lesson_id, &task.user_id, &task.user_tier)
            .await
        {
            tracing::warn!(task_id = %task.id, error = %err, "pregeneration cascade failed");
        }

        Ok(StepOutcome::Completed)
    }

    async fn process_content(
        &self,
        task: &GenerationTask,
        cancellation: CancellationToken,
    ) -> Result<StepOutcome, QueueError> {
        if let Some(outcome) = self.check_budget(task).await? {
            return Ok(outcome);
        }
        let (section_id, lesson_id, block_id) =
            match (&task.section_id, &task.lesson_id, &task.block_id) {
                (Some(s), Some(l), Some(b)) => (s.clone(), l.clone(), b.clone()),
                _ => {
                    return Ok(StepOutcome::Failed(
                        "block content task missing sectionId/lessonId/blockId".to_string(),
                    ))
                }
            };
        let course = match self.manager.get_course(&task.course_id).await {
            Ok(course) => course,
            Err(err) => return Ok(classify_error(err)),
        };

        let produced = self
            .with_deadline(
                cancellation.clone(),
                self.generator.produce_block_content(
                    &task.id,
                    ProduceBlockContentArgs {
                        course: course.clone(),
                        section_id: section_id.clone(),
                        lesson_id: lesson_id.clone(),
                        block_id: block_id.clone(),
                        tier: task.user_tier.clone(),
                        cancellation: cancellation.clone(),
                    },
                ),
            )
            .await;
        let produced = match produced {
            Ok(Ok(p)) => p,
            Ok(Err(err)) => return Ok(classify_error(err)),
            Err(timeout_err) => return Ok(classify_error(timeout_err)),
        };

        if let Err(err) = self
            .generator
            .increment_usage(
                &task.id,
                IncrementUsageArgs {
                    user_id: task.user_id.clone(),
                    tier: task.user_tier.clone(),
                    input_tokens: 0,
                    output_tokens: produced.tokens_used,
                },
            )
            .await
        {
            tracing::warn!(task_id = %task.id, error = %err, "usage accounting failed, continuing");
        }

        if let Err(err) = self
            .generator
            .write_block_content(
                &task.id,
                WriteBlockContentArgs {
                    course_id: task.course_id.clone(),
                    section_id,
                    lesson_id,
                    block_id,
                    payload: produced.payload,
                    status: crate::types::course::BlockStatus::Ready,
                },
            )
            .await
        {
            return Ok(classify_error(err));
        }

        Ok(StepOutcome::Completed)
    }
}

enum StepOutcome {
    Completed,
    Paused,
    Failed(String),
}

/// §4.7's error-classification rule: a `BudgetExceeded` error surfaced
/// from the budget gate, a fetch, a generator call, or a writer is
/// absorbed into a pause rather than a terminal failure.
fn classify_error(err: QueueError) -> StepOutcome {
    if err.kind() == ErrorKind::BudgetExceeded {
        StepOutcome::Paused
    } else {
        StepOutcome::Failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::store::CourseBackend;
    use crate::types::course::{Course, Outline, Section, Lesson};
    use crate::types::generator::{CheckBudgetResult, ProduceOutlineResult};

    fn budget_allows() -> impl Fn(CheckBudgetArgs) -> futures::future::BoxFuture<'static, Result<CheckBudgetResult, QueueError>>
           + Send
           + Sync
           + 'static {
        |_args| {
            Box::pin(async move {
                Ok(CheckBudgetResult {
                    allowed: true,
                    daily_used: 0,
                    daily_limit: 100,
                    weekly_used: 0,
                    weekly_limit: 700,
                    limit_reached: None,
                })
            })
        }
    }

    async fn seeded(course: Course) -> (Arc<TaskManager>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        CourseBackend::put(store.as_ref(), &course.id, &serde_json::to_vec(&course).unwrap())
            .await
            .unwrap();
        let manager = Arc::new(TaskManager::new(store.clone(), store.clone()));
        (manager, store)
    }

    #[tokio::test]
    async fn outline_task_completes_and_writes_course() {
        let course = Course {
            id: "c1".into(),
            title: "Rust".into(),
            outline: None,
            outline_status: None,
            total_lessons: 0,
        };
        let (manager, _store) = seeded(course).await;
        let created = manager.create_outline_task("c1", "u1", "free").await.unwrap();
        let claimed = manager.claim_task(&created.id).await.unwrap();

        let generator = Generator::default()
            .with_check_budget(budget_allows())
            .with_produce_outline(|args: ProduceOutlineArgs| async move {
                Ok(ProduceOutlineResult {
                    outline: Outline {
                        sections: vec![Section {
                            id: "s1".into(),
                            lessons: vec![Lesson { id: "l1".into(), blocks_status: None, blocks: vec![] }],
                        }],
                    },
                    tokens_used: 42,
                })
            })
            .with_increment_usage(|_args| async move {
                Ok(crate::types::generator::IncrementUsageResult { new_daily_total: 42, can_continue: true })
            });

        let processor = Processor::new(manager.clone(), Arc::new(generator));
        processor.process(claimed).await.unwrap();

        let task = manager.get_task(&created.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Ready);
        let course = manager.get_course("c1").await.unwrap();
        assert_eq!(course.total_lessons, 1);
    }

    #[tokio::test]
    async fn budget_exceeded_pauses_task_as_token_limit() {
        let course = Course {
            id: "c1".into(),
            title: "Rust".into(),
            outline: None,
            outline_status: None,
            total_lessons: 0,
        };
        let (manager, _store) = seeded(course).await;
        let created = manager.create_outline_task("c1", "u1", "free").await.unwrap();
        let claimed = manager.claim_task(&created.id).await.unwrap();

        let generator = Generator::default().with_check_budget(|_args| async move {
            Ok(CheckBudgetResult {
                allowed: false,
                daily_used: 100,
                daily_limit: 100,
                weekly_used: 0,
                weekly_limit: 700,
                limit_reached: Some("daily".into()),
            })
        });

        let processor = Processor::new(manager.clone(), Arc::new(generator));
        processor.process(claimed).await.unwrap();

        let task = manager.get_task(&created.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::TokenLimit);
        assert!(task.claim.is_none());
    }

    #[tokio::test]
    async fn unconfigured_generator_fails_the_task() {
        let course = Course {
            id: "c1".into(),
            title: "Rust".into(),
            outline: None,
            outline_status: None,
            total_lessons: 0,
        };
        let (manager, _store) = seeded(course).await;
        let created = manager.create_outline_task("c1", "u1", "free").await.unwrap();
        let claimed = manager.claim_task(&created.id).await.unwrap();

        let generator = Generator::default().with_check_budget(budget_allows());
        let processor = Processor::new(manager.clone(), Arc::new(generator));
        processor.process(claimed).await.unwrap();

        let task = manager.get_task(&created.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert!(task.error.is_some());
    }

    #[tokio::test]
    async fn budget_exceeded_error_from_callback_pauses_rather_than_fails() {
        let course = Course {
            id: "c1".into(),
            title: "Rust".into(),
            outline: None,
            outline_status: None,
            total_lessons: 0,
        };
        let (manager, _store) = seeded(course).await;
        let created = manager.create_outline_task("c1", "u1", "free").await.unwrap();
        let claimed = manager.claim_task(&created.id).await.unwrap();

        let generator = Generator::default().with_check_budget(|_args| async move {
            Err(QueueError::BudgetExceeded {
                user_id: "u1".into(),
                limit_reached: "weekly".into(),
            })
        });

        let processor = Processor::new(manager.clone(), Arc::new(generator));
        processor.process(claimed).await.unwrap();

        let task = manager.get_task(&created.id).await.unwrap();
        assert_eq!(task.status, TaskStatus::TokenLimit);
        assert!(task.claim.is_none());
    }
}
