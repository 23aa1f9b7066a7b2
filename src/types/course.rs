//! Minimal read-model for course/outline/section/lesson/block state.
//!
//! These types are owned by the artifact store, not by the queue (spec
//! §3): the queue core only needs enough of their shape to drive the
//! cascade and progressive policies (§4.6), so this is deliberately a
//! thin traversal structure, not the full learning-platform schema.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockStatus {
    Pending,
    Queued,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub content_status: BlockStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub blocks_status: Option<BlockStatus>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline: Option<Outline>,
    #[serde(default)]
    pub outline_status: Option<BlockStatus>,
    #[serde(default)]
    pub total_lessons: usize,
}

/// Boundary behaviour: `countLessons(nil outline) = 0`,
/// `countLessons(outline with no sections) = 0`.
pub fn count_lessons(outline: Option<&Outline>) -> usize {
    outline
        .map(|o| o.sections.iter().map(|s| s.lessons.len()).sum())
        .unwrap_or(0)
}

/// A `(section_index, lesson_index)` cursor into an outline, used by the
/// cascade and progressive policies to walk sections/lessons in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonPosition {
    pub section_index: usize,
    pub lesson_index: usize,
}

impl Outline {
    /// Iterates `(LessonPosition, &Section, &Lesson)` in outline order:
    /// sections in order, lessons within each section in order.
    pub fn iter_lessons(&self) -> impl Iterator<Item = (LessonPosition, &Section, &Lesson)> {
        self.sections.iter().enumerate().flat_map(|(si, section)| {
            section.lessons.iter().enumerate().map(move |(li, lesson)| {
                (
                    LessonPosition {
                        section_index: si,
                        lesson_index: li,
                    },
                    section,
                    lesson,
                )
            })
        })
    }

    /// The lesson one position forward from `from`: the next lesson in
    /// the same section, or the first lesson of the next section.
    /// Returns `None` if `from` is the last lesson of the outline.
    pub fn next_position(&self, from: LessonPosition) -> Option<LessonPosition> {
        let section = self.sections.get(from.section_index)?;
        if from.lesson_index + 1 < section.lessons.len() {
            return Some(LessonPosition {
                section_index: from.section_index,
                lesson_index: from.lesson_index + 1,
            });
        }
        let mut next_section = from.section_index + 1;
        while let Some(section) = self.sections.get(next_section) {
            if !section.lessons.is_empty() {
                return Some(LessonPosition {
                    section_index: next_section,
                    lesson_index: 0,
                });
            }
            next_section += 1;
        }
        None
    }

    pub fn lesson_at(&self, pos: LessonPosition) -> Option<&Lesson> {
        self.sections
            .get(pos.section_index)?
            .lessons
            .get(pos.lesson_index)
    }

    pub fn section_at(&self, pos: LessonPosition) -> Option<&Section> {
        self.sections.get(pos.section_index)
    }
}
