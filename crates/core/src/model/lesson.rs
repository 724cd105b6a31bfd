use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LessonId, StepId};
use crate::model::step::{Step, StepDraft, StepError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson must contain at least one step")]
    NoSteps,

    #[error("duplicate step id {0}")]
    DuplicateStepId(StepId),

    #[error("invalid step: {0}")]
    Step(#[from] StepError),

    #[error("invalid lesson json: {0}")]
    Json(String),
}

//
// ─── LESSON DRAFT ──────────────────────────────────────────────────────────────
//

/// Unvalidated lesson definition as supplied by a content loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonDraft {
    pub id: LessonId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepDraft>,
}

impl LessonDraft {
    /// Validate the draft into a `Lesson`, preserving step order.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if the title is blank, there are no steps, a step
    /// is invalid, or two steps share an id.
    pub fn validate(self) -> Result<Lesson, LessonError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if self.steps.is_empty() {
            return Err(LessonError::NoSteps);
        }

        let mut seen = HashSet::with_capacity(self.steps.len());
        let mut steps = Vec::with_capacity(self.steps.len());
        for draft in self.steps {
            let step = draft.validate()?;
            if !seen.insert(step.id()) {
                return Err(LessonError::DuplicateStepId(step.id()));
            }
            steps.push(step);
        }

        Ok(Lesson {
            id: self.id,
            title: title.to_owned(),
            description: self.description,
            steps,
        })
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// An ordered, non-empty sequence of steps with unique ids.
///
/// Insertion order is pedagogical order and is fixed once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    title: String,
    description: String,
    steps: Vec<Step>,
}

impl Lesson {
    /// Parse and validate a lesson definition from JSON.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Json` for malformed input, or any validation error.
    pub fn from_json(raw: &str) -> Result<Self, LessonError> {
        let draft: LessonDraft =
            serde_json::from_str(raw).map_err(|err| LessonError::Json(err.to_string()))?;
        draft.validate()
    }

    #[must_use]
    pub fn id(&self) -> &LessonId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// Number of steps; always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a validated lesson.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    #[must_use]
    pub fn index_of(&self, id: StepId) -> Option<usize> {
        self.steps.iter().position(|step| step.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: StepId) -> bool {
        self.index_of(id).is_some()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(steps: Vec<StepDraft>) -> LessonDraft {
        LessonDraft {
            id: LessonId::new("lesson-1").unwrap(),
            title: "Introduction to JavaScript".into(),
            description: String::new(),
            steps,
        }
    }

    #[test]
    fn lesson_requires_steps() {
        let err = draft(Vec::new()).validate().unwrap_err();
        assert_eq!(err, LessonError::NoSteps);
    }

    #[test]
    fn lesson_rejects_duplicate_ids() {
        let err = draft(vec![
            StepDraft::reading(1, "A", ""),
            StepDraft::reading(1, "B", ""),
        ])
        .validate()
        .unwrap_err();
        assert_eq!(err, LessonError::DuplicateStepId(StepId::new(1)));
    }

    #[test]
    fn lesson_surfaces_step_errors() {
        let err = draft(vec![StepDraft::reading(0, "A", "")])
            .validate()
            .unwrap_err();
        assert_eq!(err, LessonError::Step(StepError::ZeroId));
    }

    #[test]
    fn lesson_keeps_insertion_order() {
        let lesson = draft(vec![
            StepDraft::reading(7, "A", ""),
            StepDraft::coding(2, "B", "", Some("x")),
            StepDraft::reading(5, "C", ""),
        ])
        .validate()
        .unwrap();

        let ids: Vec<u64> = lesson.steps().iter().map(|s| s.id().value()).collect();
        assert_eq!(ids, vec![7, 2, 5]);
        assert_eq!(lesson.index_of(StepId::new(5)), Some(2));
        assert_eq!(lesson.last_index(), 2);
        assert!(!lesson.contains(StepId::new(1)));
    }

    #[test]
    fn lesson_from_json_reports_malformed_input() {
        let err = Lesson::from_json("{ not json").unwrap_err();
        assert!(matches!(err, LessonError::Json(_)));
    }

    #[test]
    fn lesson_from_json_parses_definition() {
        let raw = r#"{
            "id": "lesson-1",
            "title": "Introduction to JavaScript",
            "description": "Basics",
            "steps": [
                { "id": 1, "title": "What is JavaScript?", "type": "reading", "content": "<p>hi</p>" },
                { "id": 2, "title": "First code", "type": "coding",
                  "defaultCode": "console.log(\"\");", "expectedOutput": "Hello, World!" }
            ]
        }"#;
        let lesson = Lesson::from_json(raw).unwrap();
        assert_eq!(lesson.len(), 2);
        assert_eq!(lesson.description(), "Basics");
        assert!(lesson.step(1).unwrap().is_graded());
    }
}
