//! Wire and domain types for the generation queue.

pub mod claim;
pub mod course;
pub mod generator;
pub mod priority;
pub mod status;
pub mod task;

pub use claim::Claim;
pub use course::{Block, BlockStatus, Course, Lesson, LessonPosition, Outline, Section};
pub use generator::Generator;
pub use priority::Priority;
pub use status::TaskStatus;
pub use task::{GenerationTask, NewTask, TaskKind};
