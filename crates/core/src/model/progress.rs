use std::collections::BTreeSet;

use crate::grading::ValidationVerdict;
use crate::model::ids::StepId;
use crate::model::lesson::Lesson;

//
// ─── STEP STATUS ───────────────────────────────────────────────────────────────
//

/// Per-step status, always derived from `(index, completed ids)`; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// Some earlier step is not completed yet.
    Locked,
    /// Reachable but not completed.
    Available,
    Completed,
}

/// Gating rule: index 0 is always reachable; index `k` is reachable only when
/// every step before it is completed. Out-of-range indices are never reachable.
#[must_use]
pub fn can_access(lesson: &Lesson, completed: &BTreeSet<StepId>, index: usize) -> bool {
    if index >= lesson.len() {
        return false;
    }
    lesson.steps()[..index]
        .iter()
        .all(|step| completed.contains(&step.id()))
}

/// Derived status of the step at `index`, or `None` when out of range.
#[must_use]
pub fn status_of(
    lesson: &Lesson,
    completed: &BTreeSet<StepId>,
    index: usize,
) -> Option<StepStatus> {
    let step = lesson.step(index)?;
    let status = if completed.contains(&step.id()) {
        StepStatus::Completed
    } else if can_access(lesson, completed, index) {
        StepStatus::Available
    } else {
        StepStatus::Locked
    };
    Some(status)
}

/// Index of the furthest step the gating rule allows.
#[must_use]
pub fn furthest_accessible(lesson: &Lesson, completed: &BTreeSet<StepId>) -> usize {
    lesson
        .steps()
        .iter()
        .position(|step| !completed.contains(&step.id()))
        .unwrap_or_else(|| lesson.last_index())
}

/// `round(100 * completed / total)`, rounding halves up. Zero when `total` is zero.
#[must_use]
pub fn progress_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let rounded = (200 * completed + total) / (2 * total);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

//
// ─── PROGRESS STATE ────────────────────────────────────────────────────────────
//

/// Mutable progress through one lesson.
///
/// `completed_ids` only grows, except on an explicit reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub current_index: usize,
    pub completed_ids: BTreeSet<StepId>,
    pub last_run_output: String,
    pub last_verdict: Option<ValidationVerdict>,
    pub feedback_visible: bool,
}

impl ProgressState {
    /// Restore persisted progress; transient fields start empty.
    #[must_use]
    pub fn restored(current_index: usize, completed_ids: BTreeSet<StepId>) -> Self {
        Self {
            current_index,
            completed_ids,
            ..Self::default()
        }
    }

    /// Clear last output, verdict and feedback flag.
    pub fn clear_transient(&mut self) {
        self.last_run_output.clear();
        self.last_verdict = None;
        self.feedback_visible = false;
    }

    /// Mark a step completed. Returns `true` if it was not already completed.
    pub fn complete(&mut self, id: StepId) -> bool {
        self.completed_ids.insert(id)
    }

    #[must_use]
    pub fn is_completed(&self, id: StepId) -> bool {
        self.completed_ids.contains(&id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LessonDraft, LessonId, StepDraft};

    fn lesson() -> Lesson {
        LessonDraft {
            id: LessonId::new("gating").unwrap(),
            title: "Gating".into(),
            description: String::new(),
            steps: vec![
                StepDraft::reading(10, "R0", ""),
                StepDraft::coding(20, "C1", "", Some("one")),
                StepDraft::coding(30, "C2", "", Some("two")),
            ],
        }
        .validate()
        .unwrap()
    }

    fn ids(raw: &[u64]) -> BTreeSet<StepId> {
        raw.iter().copied().map(StepId::new).collect()
    }

    #[test]
    fn first_step_is_always_accessible() {
        let lesson = lesson();
        assert!(can_access(&lesson, &ids(&[]), 0));
        assert_eq!(status_of(&lesson, &ids(&[]), 0), Some(StepStatus::Available));
    }

    #[test]
    fn later_steps_require_all_previous() {
        let lesson = lesson();
        assert!(!can_access(&lesson, &ids(&[10]), 2));
        assert!(can_access(&lesson, &ids(&[10]), 1));
        assert!(can_access(&lesson, &ids(&[10, 20]), 2));
        assert_eq!(status_of(&lesson, &ids(&[10]), 2), Some(StepStatus::Locked));
    }

    #[test]
    fn gap_in_completion_locks_following_steps() {
        let lesson = lesson();
        // Step 20 completed without 10: step 2 stays locked.
        assert!(!can_access(&lesson, &ids(&[20]), 2));
        assert_eq!(status_of(&lesson, &ids(&[20]), 1), Some(StepStatus::Completed));
    }

    #[test]
    fn out_of_range_is_never_accessible() {
        let lesson = lesson();
        assert!(!can_access(&lesson, &ids(&[10, 20, 30]), 3));
        assert_eq!(status_of(&lesson, &ids(&[]), 9), None);
    }

    #[test]
    fn furthest_accessible_stops_at_first_incomplete() {
        let lesson = lesson();
        assert_eq!(furthest_accessible(&lesson, &ids(&[])), 0);
        assert_eq!(furthest_accessible(&lesson, &ids(&[10])), 1);
        assert_eq!(furthest_accessible(&lesson, &ids(&[10, 20, 30])), 2);
    }

    #[test]
    fn progress_percent_rounds_like_math_round() {
        assert_eq!(progress_percent(0, 3), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(1, 8), 13);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(0, 0), 0);
    }

    #[test]
    fn completion_is_idempotent() {
        let mut state = ProgressState::default();
        assert!(state.complete(StepId::new(1)));
        assert!(!state.complete(StepId::new(1)));
        assert_eq!(state.completed_ids.len(), 1);
    }

    #[test]
    fn clear_transient_keeps_progress() {
        let mut state = ProgressState::restored(2, ids(&[10, 20]));
        state.last_run_output = "out".into();
        state.feedback_visible = true;
        state.clear_transient();
        assert_eq!(state.current_index, 2);
        assert_eq!(state.completed_ids.len(), 2);
        assert!(state.last_run_output.is_empty());
        assert!(!state.feedback_visible);
    }
}
