//! The `Generator` capability: a configuration struct of optional async
//! callbacks (§6.2). Any capability left unconfigured makes the
//! corresponding task type fail with "generator not configured" rather
//! than panicking — the cyclic dependency between the processor and the
//! artifact/usage writers is broken by injection, not by a trait object
//! the processor would otherwise have to implement itself.

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;
use super::course::{Block, BlockStatus, Course, Outline};

pub struct CheckBudgetArgs {
    pub user_id: String,
    pub tier: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckBudgetResult {
    pub allowed: bool,
    pub daily_used: u64,
    pub daily_limit: u64,
    pub weekly_used: u64,
    pub weekly_limit: u64,
    /// Set iff `allowed` is false; names which budget was exhausted
    /// (e.g. `"daily"`, `"weekly"`).
    pub limit_reached: Option<String>,
}

pub struct IncrementUsageArgs {
    pub user_id: String,
    pub tier: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncrementUsageResult {
    pub new_daily_total: u64,
    /// Advisory only; ignored for control flow (spec §4.4).
    pub can_continue: bool,
}

pub struct ProduceOutlineArgs {
    pub course_title: String,
    pub tier: String,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceOutlineResult {
    pub outline: Outline,
    pub tokens_used: u64,
}

pub struct ProduceSkeletonsArgs {
    pub course: Course,
    pub section_id: String,
    pub lesson_id: String,
    pub tier: String,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceSkeletonsResult {
    pub blocks: Vec<Block>,
    pub tokens_used: u64,
}

pub struct ProduceBlockContentArgs {
    pub course: Course,
    pub section_id: String,
    pub lesson_id: String,
    pub block_id: String,
    pub tier: String,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceBlockContentResult {
    pub payload: Value,
    pub tokens_used: u64,
}

pub struct WriteLessonBlocksArgs {
    pub course_id: String,
    pub section_id: String,
    pub lesson_id: String,
    pub blocks: Vec<Block>,
    pub status: BlockStatus,
}

pub struct WriteBlockContentArgs {
    pub course_id: String,
    pub section_id: String,
    pub lesson_id: String,
    pub block_id: String,
    pub payload: Value,
    pub status: BlockStatus,
}

type AsyncFn<Args, Out> =
    Arc<dyn Fn(Args) -> BoxFuture<'static, Result<Out, QueueError>> + Send + Sync>;

/// Injected generation/budget/persistence capability.
///
/// Every field defaults to `None`; calling a capability that is not
/// configured returns `QueueError::GeneratorError` with message
/// `"generator not configured"`, which the processor treats the same
/// as any other generator failure (`FailTask`).
#[derive(Clone, Default)]
pub struct Generator {
    check_budget: Option<AsyncFn<CheckBudgetArgs, CheckBudgetResult>>,
    increment_usage: Option<AsyncFn<IncrementUsageArgs, IncrementUsageResult>>,
    produce_outline: Option<AsyncFn<ProduceOutlineArgs, ProduceOutlineResult>>,
    produce_skeletons: Option<AsyncFn<ProduceSkeletonsArgs, ProduceSkeletonsResult>>,
    produce_block_content: Option<AsyncFn<ProduceBlockContentArgs, ProduceBlockContentResult>>,
    write_lesson_blocks: Option<AsyncFn<WriteLessonBlocksArgs, ()>>,
    write_block_content: Option<AsyncFn<WriteBlockContentArgs, ()>>,
}

const NOT_CONFIGURED: &str = "generator not configured";

macro_rules! capability_setter {
    ($setter:ident, $field:ident, $args:ty, $out:ty) => {
        pub fn $setter<F, Fut>(mut self, f: F) -> Self
        where
            F: Fn($args) -> Fut + Send + Sync + 'static,
            Fut: std::future::Future<Output = Result<$out, QueueError>> + Send + 'static,
        {
            self.$field = Some(Arc::new(move |args| Box::pin(f(args))));
            self
        }
    };
}

impl Generator {
    capability_setter!(with_check_budget, check_budget, CheckBudgetArgs, CheckBudgetResult);
    capability_setter!(with_increment_usage, increment_usage, IncrementUsageArgs, IncrementUsageResult);
    capability_setter!(with_produce_outline, produce_outline, ProduceOutlineArgs, ProduceOutlineResult);
    capability_setter!(with_produce_skeletons, produce_skeletons, ProduceSkeletonsArgs, ProduceSkeletonsResult);
    capability_setter!(with_produce_block_content, produce_block_content, ProduceBlockContentArgs, ProduceBlockContentResult);
    capability_setter!(with_write_lesson_blocks, write_lesson_blocks, WriteLessonBlocksArgs, ());
    capability_setter!(with_write_block_content, write_block_content, WriteBlockContentArgs, ());

    pub async fn check_budget(&self, task_id: &str, args: CheckBudgetArgs) -> Result<CheckBudgetResult, QueueError> {
        match &self.check_budget {
            Some(f) => f(args).await,
            None => Err(not_configured(task_id)),
        }
    }

    pub async fn increment_usage(&self, task_id: &str, args: IncrementUsageArgs) -> Result<IncrementUsageResult, QueueError> {
        match &self.increment_usage {
            Some(f) => f(args).await,
            None => Err(not_configured(task_id)),
        }
    }

    pub async fn produce_outline(&self, task_id: &str, args: ProduceOutlineArgs) -> Result<ProduceOutlineResult, QueueError> {
        match &self.produce_outline {
            Some(f) => f(args).await,
            None => Err(not_configured(task_id)),
        }
    }

    pub async fn produce_skeletons(&self, task_id: &str, args: ProduceSkeletonsArgs) -> Result<ProduceSkeletonsResult, QueueError> {
        match &self.produce_skeletons {
            Some(f) => f(args).await,
            None => Err(not_configured(task_id)),
        }
    }

    pub async fn produce_block_content(&self, task_id: &str, args: ProduceBlockContentArgs) -> Result<ProduceBlockContentResult, QueueError> {
        match &self.produce_block_content {
            Some(f) => f(args).await,
            None => Err(not_configured(task_id)),
        }
    }

    pub async fn write_lesson_blocks(&self, task_id: &str, args: WriteLessonBlocksArgs) -> Result<(), QueueError> {
        match &self.write_lesson_blocks {
            Some(f) => f(args).await,
            None => Err(not_configured(task_id)),
        }
    }

    pub async fn write_block_content(&self, task_id: &str, args: WriteBlockContentArgs) -> Result<(), QueueError> {
        match &self.write_block_content {
            Some(f) => f(args).await,
            None => Err(not_configured(task_id)),
        }
    }
}

fn not_configured(task_id: &str) -> QueueError {
    QueueError::GeneratorError {
        task_id: task_id.to_string(),
        message: NOT_CONFIGURED.to_string(),
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("check_budget", &self.check_budget.is_some())
            .field("increment_usage", &self.increment_usage.is_some())
            .field("produce_outline", &self.produce_outline.is_some())
            .field("produce_skeletons", &self.produce_skeletons.is_some())
            .field("produce_block_content", &self.produce_block_content.is_some())
            .field("write_lesson_blocks", &self.write_lesson_blocks.is_some())
            .field("write_block_content", &self.write_block_content.is_some())
            .finish()
    }
}
