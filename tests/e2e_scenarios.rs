//! End-to-end generation scenarios, exercised against
//! [`genqueue::InMemoryStore`] the way `crates/pmcp-tasks`'s
//! `lifecycle_integration.rs` drives its in-memory backend: no mocks for
//! the queue/course stores themselves, only the generator capability is
//! faked per scenario.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration as ChronoDuration, Utc};
use genqueue::types::generator::{
    CheckBudgetResult, IncrementUsageResult, ProduceOutlineArgs, ProduceOutlineResult,
    ProduceSkeletonsArgs,
};
use genqueue::{
    BlockStatus, Cascade, CascadeConfig, Claim, Course, GenerationTask, Generator, InMemoryStore,
    Lesson, LessonPosition, NewTask, Outline, PoolConfig, Priority, Processor, QueueBackend,
    QueueError, Section, TaskKind, TaskManager, TaskStatus, WorkerPool,
};
use pretty_assertions::assert_eq as passert_eq;

async fn seed_course(store: &Arc<InMemoryStore>, course: &Course) {
    genqueue::CourseBackend::put(store.as_ref(), &course.id, &serde_json::to_vec(course).unwrap())
        .await
        .unwrap();
}

async fn wait_for_status(manager: &TaskManager, task_id: &str, status: TaskStatus) {
    for _ in 0..300 {
        if manager.get_task(task_id).await.unwrap().status == status {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("task {task_id} never reached {status}");
}

/// Scenario 1 (happy path outline): a single worker pool processes an
/// `Outline` task through a generator that returns one section of three
/// lessons, accounts the tokens used, and the progressive buffer cascades
/// into exactly two buffered `BlockSkeleton` tasks at `High` priority.
#[tokio::test]
async fn happy_path_outline_cascades_into_buffered_skeletons() {
    let store = Arc::new(InMemoryStore::new());
    let course = Course {
        id: "c1".into(),
        title: "Rust Basics".into(),
        outline: None,
        outline_status: None,
        total_lessons: 0,
    };
    seed_course(&store, &course).await;

    let manager = Arc::new(TaskManager::new(store.clone(), store.clone()));
    let created = manager.create_outline_task("c1", "u1", "free").await.unwrap();

    let usage_total = Arc::new(AtomicU64::new(0));
    let usage_total_cb = usage_total.clone();

    let generator = Generator::default()
        .with_check_budget(|_args| async move {
            Ok(CheckBudgetResult {
                allowed: true,
                daily_used: 0,
                daily_limit: 10_000,
                weekly_used: 0,
                weekly_limit: 70_000,
                limit_reached: None,
            })
        })
        .with_produce_outline(|_args: ProduceOutlineArgs| async move {
            Ok(ProduceOutlineResult {
                outline: Outline {
                    sections: vec![Section {
                        id: "s1".into(),
                        lessons: vec![
                            Lesson { id: "l1".into(), blocks_status: None, blocks: vec![] },
                            Lesson { id: "l2".into(), blocks_status: None, blocks: vec![] },
                            Lesson { id: "l3".into(), blocks_status: None, blocks: vec![] },
                        ],
                    }],
                },
                tokens_used: 500,
            })
        })
        .with_increment_usage(move |args| {
            let usage_total = usage_total_cb.clone();
            async move {
                usage_total.fetch_add(args.output_tokens, Ordering::SeqCst);
                Ok(IncrementUsageResult { new_daily_total: args.output_tokens, can_continue: true })
            }
        });

    let processor = Arc::new(Processor::new(manager.clone(), Arc::new(generator)));
    let pool = Arc::new(WorkerPool::new(
        manager.clone(),
        processor,
        PoolConfig::default()
            .with_max_concurrent(1)
            .with_poll_interval(StdDuration::from_millis(10))
            .with_recovery_interval(StdDuration::from_secs(3600)),
    ));
    pool.start();
    wait_for_status(&manager, &created.id, TaskStatus::Ready).await;
    pool.stop().await;

    let course = manager.get_course("c1").await.unwrap();
    passert_eq!(course.outline_status, Some(BlockStatus::Ready));
    passert_eq!(course.total_lessons, 3);
    passert_eq!(usage_total.load(Ordering::SeqCst), 500);

    let tasks = manager.get_tasks_by_course("c1").await.unwrap();
    let skeletons: Vec<_> = tasks.iter().filter(|t| t.kind == TaskKind::BlockSkeleton).collect();
    passert_eq!(skeletons.len(), 2);
    assert!(skeletons.iter().all(|t| t.priority == Priority::High));
}

/// Scenario 2 (budget exhaustion): a `check_budget` refusal pauses the
/// task as `TokenLimit` rather than failing it, and nothing downstream of
/// the gate ever runs — no outline is written, no cascade tasks appear,
/// and usage is never incremented.
#[tokio::test]
async fn budget_exhaustion_pauses_without_side_effects() {
    let store = Arc::new(InMemoryStore::new());
    let course = Course {
        id: "c1".into(),
        title: "Rust Basics".into(),
        outline: None,
        outline_status: None,
        total_lessons: 0,
    };
    seed_course(&store, &course).await;

    let manager = Arc::new(TaskManager::new(store.clone(), store.clone()));
    let created = manager.create_outline_task("c1", "u1", "free").await.unwrap();
    let claimed = manager.claim_task(&created.id).await.unwrap();

    let usage_calls = Arc::new(AtomicU64::new(0));
    let usage_calls_cb = usage_calls.clone();
    let generator = Generator::default()
        .with_check_budget(|_args| async move {
            Ok(CheckBudgetResult {
                allowed: false,
                daily_used: 100,
                daily_limit: 100,
                weekly_used: 0,
                weekly_limit: 700,
                limit_reached: Some("daily".into()),
            })
        })
        .with_increment_usage(move |_args| {
            let usage_calls = usage_calls_cb.clone();
            async move {
                usage_calls.fetch_add(1, Ordering::SeqCst);
                Ok(IncrementUsageResult { new_daily_total: 0, can_continue: false })
            }
        });

    let processor = Processor::new(manager.clone(), Arc::new(generator));
    processor.process(claimed).await.unwrap();

    let task = manager.get_task(&created.id).await.unwrap();
    passert_eq!(task.status, TaskStatus::TokenLimit);
    assert!(task.claim.is_none());

    let course = manager.get_course("c1").await.unwrap();
    assert!(course.outline.is_none());

    let tasks = manager.get_tasks_by_course("c1").await.unwrap();
    assert!(tasks.iter().all(|t| t.kind != TaskKind::BlockSkeleton));
    passert_eq!(usage_calls.load(Ordering::SeqCst), 0);
}

/// Scenario 3 (generator failure): the skeleton generator fails after a
/// delay, the task lands in `Error` carrying that failure, and the
/// lesson's `blocksStatus` is left exactly as it was (the cascade never
/// runs on a failed step).
#[tokio::test]
async fn generator_failure_fails_task_and_leaves_lesson_unchanged() {
    let store = Arc::new(InMemoryStore::new());
    let course = Course {
        id: "c1".into(),
        title: "Rust Basics".into(),
        outline: Some(Outline {
            sections: vec![Section {
                id: "s1".into(),
                lessons: vec![Lesson { id: "l1".into(), blocks_status: None, blocks: vec![] }],
            }],
        }),
        outline_status: Some(BlockStatus::Ready),
        total_lessons: 1,
    };
    seed_course(&store, &course).await;

    let manager = Arc::new(TaskManager::new(store.clone(), store.clone()));
    let created = manager
        .create_block_skeleton_task("c1", "s1", "l1", "u1", "free")
        .await
        .unwrap();
    let claimed = manager.claim_task(&created.id).await.unwrap();

    let generator = Generator::default()
        .with_check_budget(|_args| async move {
            Ok(CheckBudgetResult {
                allowed: true,
                daily_used: 0,
                daily_limit: 100,
                weekly_used: 0,
                weekly_limit: 700,
                limit_reached: None,
            })
        })
        .with_produce_skeletons(|_args: ProduceSkeletonsArgs| async move {
            tokio::time::sleep(StdDuration::from_millis(120)).await;
            Err(QueueError::GeneratorError {
                task_id: "ignored-by-processor".into(),
                message: "upstream 503".into(),
            })
        });

    let processor = Processor::new(manager.clone(), Arc::new(generator));
    processor.process(claimed).await.unwrap();

    let task = manager.get_task(&created.id).await.unwrap();
    passert_eq!(task.status, TaskStatus::Error);
    assert!(task.error.as_deref().unwrap().contains("upstream 503"));

    let course = manager.get_course("c1").await.unwrap();
    let lesson = &course.outline.unwrap().sections[0].lessons[0];
    passert_eq!(lesson.blocks_status, None);
}

/// Scenario 4 (stale-claim recovery): a `Generating` task whose claim has
/// an expired lease from a dead worker is swept back to `Queued` by the
/// pool's own recovery loop, and a live worker then claims and completes
/// it on its next poll — no manual intervention.
#[tokio::test]
async fn stale_claim_recovery_then_live_worker_completes() {
    let store = Arc::new(InMemoryStore::new());
    let course = Course {
        id: "c1".into(),
        title: "Rust Basics".into(),
        outline: None,
        outline_status: None,
        total_lessons: 0,
    };
    seed_course(&store, &course).await;

    let manager = Arc::new(TaskManager::new(store.clone(), store.clone()));
    let created = manager.create_outline_task("c1", "u1", "free").await.unwrap();

    let mut ghosted = manager.get_task(&created.id).await.unwrap();
    ghosted.status = TaskStatus::Generating;
    ghosted.claim = Some(Claim::new(
        "ghost-worker",
        Utc::now() - ChronoDuration::seconds(10),
        ChronoDuration::seconds(1),
        1,
    ));
    let data = serde_json::to_vec(&ghosted).unwrap();
    QueueBackend::put_if_version(store.as_ref(), &ghosted.id, &data, 1)
        .await
        .unwrap();

    let generator = Generator::default()
        .with_check_budget(|_args| async move {
            Ok(CheckBudgetResult {
                allowed: true,
                daily_used: 0,
                daily_limit: 100,
                weekly_used: 0,
                weekly_limit: 700,
                limit_reached: None,
            })
        })
        .with_produce_outline(|_args: ProduceOutlineArgs| async move {
            Ok(ProduceOutlineResult { outline: Outline { sections: vec![] }, tokens_used: 0 })
        })
        .with_increment_usage(|_args| async move {
            Ok(IncrementUsageResult { new_daily_total: 0, can_continue: true })
        });

    let processor = Arc::new(Processor::new(manager.clone(), Arc::new(generator)));
    let pool = Arc::new(WorkerPool::new(
        manager.clone(),
        processor,
        PoolConfig::default()
            .with_max_concurrent(1)
            .with_poll_interval(StdDuration::from_millis(10))
            .with_recovery_interval(StdDuration::from_millis(20)),
    ));
    pool.start();
    wait_for_status(&manager, &created.id, TaskStatus::Ready).await;
    pool.stop().await;
}

/// Scenario 5 (priority respected): three tasks sharing an identical
/// `createdAt`, queued at Urgent/Medium/Low, are claimed in exactly that
/// order.
#[tokio::test]
async fn priority_respected_with_identical_timestamps() {
    let store = Arc::new(InMemoryStore::new());
    let now = Utc::now();

    for (id, priority) in [("t-low", Priority::Low), ("t-medium", Priority::Medium), ("t-urgent", Priority::Urgent)]
    {
        let new = NewTask {
            kind: TaskKind::Outline,
            priority,
            course_id: "c1".into(),
            section_id: None,
            lesson_id: None,
            block_id: None,
            user_id: "u1".into(),
            user_tier: "free".into(),
        };
        let mut task = GenerationTask::from_new(new, now);
        task.id = id.into();
        let data = serde_json::to_vec(&task).unwrap();
        QueueBackend::insert(store.as_ref(), &task.id, &data).await.unwrap();
    }

    let manager = TaskManager::new(store.clone(), store.clone());

    let first = manager.get_next_task().await.unwrap().unwrap();
    passert_eq!(first.priority, Priority::Urgent);
    let second = manager.get_next_task().await.unwrap().unwrap();
    passert_eq!(second.priority, Priority::Medium);
    let third = manager.get_next_task().await.unwrap().unwrap();
    passert_eq!(third.priority, Priority::Low);
    assert!(manager.get_next_task().await.unwrap().is_none());
}

/// Scenario 6 (progressive advance): a 5-lesson outline with a buffer of
/// 2 only queues lessons 1 and 2 up front; advancing past lesson 2 (the
/// last buffered lesson) queues lesson 3 exactly once, and repeating the
/// same advance call enqueues nothing further.
#[tokio::test]
async fn progressive_advance_queues_next_lesson_idempotently() {
    let store = Arc::new(InMemoryStore::new());
    let outline = Outline {
        sections: vec![Section {
            id: "s1".into(),
            lessons: (1..=5)
                .map(|n| Lesson {
                    id: format!("l{n}"),
                    blocks_status: Some(BlockStatus::Pending),
                    blocks: vec![],
                })
                .collect(),
        }],
    };
    let course = Course {
        id: "c1".into(),
        title: "Rust Basics".into(),
        outline: Some(outline),
        outline_status: Some(BlockStatus::Ready),
        total_lessons: 5,
    };
    seed_course(&store, &course).await;

    let manager = TaskManager::new(store.clone(), store.clone());
    let cascade = Cascade::new(&manager, CascadeConfig::default().with_progressive_lesson_buffer(2));

    let queued = cascade.on_outline_complete("c1", "u1", "free").await.unwrap();
    passert_eq!(queued, 2);

    let from = LessonPosition { section_index: 0, lesson_index: 1 };
    let advanced = cascade.queue_next_lesson("c1", from, "u1", "free").await.unwrap();
    assert!(advanced);

    let tasks = manager.get_tasks_by_course("c1").await.unwrap();
    let l3_tasks: Vec<_> = tasks.iter().filter(|t| t.lesson_id.as_deref() == Some("l3")).collect();
    passert_eq!(l3_tasks.len(), 1);

    let advanced_again = cascade.queue_next_lesson("c1", from, "u1", "free").await.unwrap();
    assert!(!advanced_again);
    let tasks_after = manager.get_tasks_by_course("c1").await.unwrap();
    passert_eq!(tasks_after.len(), tasks.len());
}

