use std::collections::BTreeSet;

use learn_core::model::progress::{self, furthest_accessible};
use learn_core::model::{Lesson, ProgressState, Step, StepId, StepStatus};
use learn_core::{ValidationVerdict, compare};
use sandbox::{RunOutput, Sandbox};

use super::view::{ChallengeStatus, LessonProgress, StepOutline};

//
// ─── TRANSITIONS ───────────────────────────────────────────────────────────────
//

/// Which persisted values an operation touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistIntent {
    /// The current-step index should be saved.
    pub index: bool,
    /// The completed-step set should be saved.
    pub completed: bool,
    /// Both persisted values should be removed.
    pub erase: bool,
}

impl PersistIntent {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.index || self.completed || self.erase)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            index: self.index || other.index,
            completed: self.completed || other.completed,
            erase: self.erase || other.erase,
        }
    }
}

/// Outcome of one session operation.
///
/// Rejected operations (locked jump, advancing past an unsolved exercise)
/// come back as [`Transition::unchanged`]; they are guards, not errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub changed: bool,
    pub persist: PersistIntent,
}

impl Transition {
    #[must_use]
    pub fn unchanged() -> Self {
        Self::default()
    }

    fn changed() -> Self {
        Self {
            changed: true,
            persist: PersistIntent::default(),
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            changed: self.changed || other.changed,
            persist: self.persist.merge(other.persist),
        }
    }
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory progression through one lesson.
///
/// Owns the lesson and its `ProgressState`; every mutation goes through the
/// operations below. Step status is always derived from the completed set,
/// never stored.
#[derive(Debug, Clone)]
pub struct LessonSession {
    lesson: Lesson,
    state: ProgressState,
}

impl LessonSession {
    /// Fresh session at step 0 with nothing completed.
    #[must_use]
    pub fn new(lesson: Lesson) -> Self {
        Self {
            lesson,
            state: ProgressState::default(),
        }
    }

    /// Session rebuilt from persisted values.
    ///
    /// Ids that are not part of the lesson are dropped. A missing or
    /// out-of-range index falls back to 0, and an index the gating rule does
    /// not allow is pulled back to the furthest reachable step.
    #[must_use]
    pub fn restore(lesson: Lesson, index: Option<usize>, completed: BTreeSet<StepId>) -> Self {
        let completed: BTreeSet<StepId> = completed
            .into_iter()
            .filter(|id| lesson.contains(*id))
            .collect();
        let index = index.filter(|&i| i < lesson.len()).unwrap_or(0);
        let index = if progress::can_access(&lesson, &completed, index) {
            index
        } else {
            furthest_accessible(&lesson, &completed)
        };
        Self {
            lesson,
            state: ProgressState::restored(index, completed),
        }
    }

    #[must_use]
    pub fn lesson(&self) -> &Lesson {
        &self.lesson
    }

    #[must_use]
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    #[must_use]
    pub fn current_step(&self) -> &Step {
        // current_index is kept in range by every operation, and lessons are non-empty.
        &self.lesson.steps()[self.state.current_index]
    }

    #[must_use]
    pub fn completed_ids(&self) -> &BTreeSet<StepId> {
        &self.state.completed_ids
    }

    #[must_use]
    pub fn is_step_completed(&self, id: StepId) -> bool {
        self.state.is_completed(id)
    }

    #[must_use]
    pub fn can_access(&self, index: usize) -> bool {
        progress::can_access(&self.lesson, &self.state.completed_ids, index)
    }

    #[must_use]
    pub fn status_of(&self, index: usize) -> Option<StepStatus> {
        progress::status_of(&self.lesson, &self.state.completed_ids, index)
    }

    #[must_use]
    pub fn is_last_step(&self) -> bool {
        self.state.current_index >= self.lesson.last_index()
    }

    #[must_use]
    pub fn progress(&self) -> LessonProgress {
        LessonProgress::new(self.state.completed_ids.len(), self.lesson.len())
    }

    #[must_use]
    pub fn outline(&self) -> Vec<StepOutline> {
        self.lesson
            .steps()
            .iter()
            .enumerate()
            .map(|(index, step)| StepOutline {
                index,
                id: step.id(),
                title: step.title().to_owned(),
                kind: step.kind(),
                status: self.status_of(index).unwrap_or(StepStatus::Locked),
                is_current: index == self.state.current_index,
            })
            .collect()
    }

    #[must_use]
    pub fn last_run_output(&self) -> &str {
        &self.state.last_run_output
    }

    #[must_use]
    pub fn last_verdict(&self) -> Option<&ValidationVerdict> {
        self.state.last_verdict.as_ref()
    }

    #[must_use]
    pub fn feedback_visible(&self) -> bool {
        self.state.feedback_visible
    }

    #[must_use]
    pub fn challenge_status(&self) -> ChallengeStatus {
        ChallengeStatus::from_run(&self.state.last_run_output, self.last_verdict())
    }

    /// Run `source` in `sandbox` against the current step.
    pub fn run_code(&mut self, sandbox: &Sandbox, source: &str) -> Transition {
        let output = sandbox.run(source);
        self.record_run(&output)
    }

    /// Apply a finished sandbox run to the current step.
    ///
    /// Graded steps get a verdict and show feedback; a match completes the
    /// step. Ungraded steps only keep the output.
    pub fn record_run(&mut self, output: &RunOutput) -> Transition {
        let text = output.text();
        let step = self.current_step();
        let Some(expected) = step.expected_output() else {
            self.state.last_run_output = text;
            self.state.last_verdict = None;
            self.state.feedback_visible = false;
            return Transition::changed();
        };

        let id = step.id();
        let verdict = compare(&text, expected);
        let solved = verdict.is_match();
        tracing::debug!(step = %id, solved, "graded run");

        self.state.last_run_output = text;
        self.state.last_verdict = Some(verdict);
        self.state.feedback_visible = true;

        let mut transition = Transition::changed();
        if solved && self.state.complete(id) {
            transition.persist.completed = true;
        }
        transition
    }

    /// Move to the next step.
    ///
    /// Reading and ungraded steps are completed on the way out. An unsolved
    /// graded step blocks the move. On the last step nothing moves, but an
    /// ungraded step still gets completed.
    pub fn advance(&mut self) -> Transition {
        let step = self.current_step();
        let id = step.id();
        let mut transition = Transition::unchanged();

        if !self.state.is_completed(id) {
            if !step.completes_on_advance() {
                return transition;
            }
            self.state.complete(id);
            transition.changed = true;
            transition.persist.completed = true;
        }

        if self.is_last_step() {
            return transition;
        }
        self.state.current_index += 1;
        self.state.clear_transient();
        tracing::debug!(index = self.state.current_index, "advanced");
        transition.merge(Transition {
            changed: true,
            persist: PersistIntent {
                index: true,
                ..PersistIntent::default()
            },
        })
    }

    /// Move back one step. Never un-completes anything.
    pub fn retreat(&mut self) -> Transition {
        if self.state.current_index == 0 {
            return Transition::unchanged();
        }
        self.state.current_index -= 1;
        self.state.clear_transient();
        Transition::changed()
    }

    /// Move to `index` if the gating rule allows it.
    pub fn jump_to(&mut self, index: usize) -> Transition {
        if !self.can_access(index) {
            tracing::debug!(index, "jump rejected by gating");
            return Transition::unchanged();
        }
        self.state.current_index = index;
        self.state.clear_transient();
        Transition {
            changed: true,
            persist: PersistIntent {
                index: true,
                ..PersistIntent::default()
            },
        }
    }

    /// Hide feedback; a solved step that is not the last one moves on.
    pub fn dismiss_feedback(&mut self) -> Transition {
        let mut transition = Transition::unchanged();
        if self.state.feedback_visible {
            self.state.feedback_visible = false;
            transition.changed = true;
        }
        let solved = self.last_verdict().is_some_and(ValidationVerdict::is_match);
        if solved && !self.is_last_step() {
            transition = transition.merge(self.advance());
        }
        transition
    }

    /// Forget all progress.
    pub fn reset(&mut self) -> Transition {
        self.state = ProgressState::default();
        Transition {
            changed: true,
            persist: PersistIntent {
                erase: true,
                ..PersistIntent::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::model::{LessonDraft, LessonId, StepDraft};

    fn lesson() -> Lesson {
        LessonDraft {
            id: LessonId::new("basics").unwrap(),
            title: "Basics".into(),
            description: String::new(),
            steps: vec![
                StepDraft::reading(1, "R0", "Welcome"),
                StepDraft::coding(2, "C1", "", Some("Sum: 15")),
                StepDraft::coding(3, "C2", "", Some("done")),
            ],
        }
        .validate()
        .unwrap()
    }

    fn ids(raw: &[u64]) -> BTreeSet<StepId> {
        raw.iter().copied().map(StepId::new).collect()
    }

    fn sum_program() -> &'static str {
        "let a = 5;\nlet b = 10;\nconsole.log('Sum: ' + (a + b));"
    }

    #[test]
    fn advance_completes_reading_and_moves() {
        let mut session = LessonSession::new(lesson());
        let transition = session.advance();
        assert!(transition.changed);
        assert!(transition.persist.index && transition.persist.completed);
        assert_eq!(session.current_index(), 1);
        assert!(session.is_step_completed(StepId::new(1)));
    }

    #[test]
    fn advance_on_unsolved_coding_step_is_a_no_op() {
        let mut session = LessonSession::new(lesson());
        session.advance();
        let transition = session.advance();
        assert_eq!(transition, Transition::unchanged());
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn jump_is_gated_until_previous_steps_complete() {
        let sandbox = Sandbox::default();
        let mut session = LessonSession::new(lesson());
        session.advance();

        assert_eq!(session.jump_to(2), Transition::unchanged());
        assert_eq!(session.current_index(), 1);

        let transition = session.run_code(&sandbox, sum_program());
        assert!(transition.persist.completed);
        assert!(session.last_verdict().unwrap().is_match());

        assert!(session.jump_to(2).changed);
        assert_eq!(session.current_index(), 2);
        assert_eq!(session.last_run_output(), "");
    }

    #[test]
    fn repeated_matching_runs_complete_once() {
        let sandbox = Sandbox::default();
        let mut session = LessonSession::new(lesson());
        session.advance();

        let first = session.run_code(&sandbox, sum_program());
        let second = session.run_code(&sandbox, sum_program());
        assert!(first.persist.completed);
        assert!(!second.persist.completed);
        assert_eq!(session.completed_ids().len(), 2);
    }

    #[test]
    fn mismatch_shows_feedback_without_completing() {
        let sandbox = Sandbox::default();
        let mut session = LessonSession::new(lesson());
        session.advance();

        session.run_code(&sandbox, "console.log('sum: 15');");
        let verdict = session.last_verdict().unwrap();
        assert!(!verdict.is_match());
        assert_eq!(verdict.per_line().len(), 1);
        assert_eq!(verdict.per_line()[0].actual, "sum: 15");
        assert_eq!(verdict.per_line()[0].expected, "Sum: 15");
        assert!(!verdict.per_line()[0].matches);
        assert!(session.feedback_visible());
        assert_eq!(session.challenge_status(), ChallengeStatus::Attempted);
        assert!(!session.is_step_completed(StepId::new(2)));
    }

    #[test]
    fn dismissing_solved_feedback_advances() {
        let sandbox = Sandbox::default();
        let mut session = LessonSession::new(lesson());
        session.advance();
        session.run_code(&sandbox, sum_program());

        let transition = session.dismiss_feedback();
        assert!(transition.persist.index);
        assert_eq!(session.current_index(), 2);
        assert!(!session.feedback_visible());
    }

    #[test]
    fn dismissing_on_last_step_stays_put() {
        let sandbox = Sandbox::default();
        let mut session = LessonSession::restore(lesson(), Some(2), ids(&[1, 2]));
        session.run_code(&sandbox, "console.log('done')");
        session.dismiss_feedback();
        assert_eq!(session.current_index(), 2);
        assert_eq!(session.progress().percent, 100);
        assert_eq!(session.challenge_status(), ChallengeStatus::Solved);
    }

    #[test]
    fn retreat_keeps_completion_and_clears_transients() {
        let sandbox = Sandbox::default();
        let mut session = LessonSession::new(lesson());
        session.advance();
        session.run_code(&sandbox, "console.log('nope')");

        let transition = session.retreat();
        assert!(transition.changed);
        assert!(transition.persist.is_empty());
        assert_eq!(session.current_index(), 0);
        assert!(session.last_verdict().is_none());
        assert!(session.is_step_completed(StepId::new(1)));
        assert_eq!(session.retreat(), Transition::unchanged());
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = LessonSession::restore(lesson(), Some(2), ids(&[1, 2]));
        let transition = session.reset();
        assert!(transition.persist.erase);
        assert_eq!(session.current_index(), 0);
        assert!(session.completed_ids().is_empty());
        assert_eq!(session.progress().percent, 0);
    }

    #[test]
    fn restore_repairs_inconsistent_values() {
        let session = LessonSession::restore(lesson(), Some(9), ids(&[1, 99]));
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.completed_ids(), &ids(&[1]));

        let session = LessonSession::restore(lesson(), Some(2), ids(&[1]));
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn runs_on_ungraded_steps_only_record_output() {
        let sandbox = Sandbox::default();
        let lesson = LessonDraft {
            id: LessonId::new("free").unwrap(),
            title: "Free".into(),
            description: String::new(),
            steps: vec![StepDraft::coding(1, "Play", "", None)],
        }
        .validate()
        .unwrap();
        let mut session = LessonSession::new(lesson);

        session.run_code(&sandbox, "console.log(1 + 1)");
        assert_eq!(session.last_run_output(), "2\n");
        assert!(session.last_verdict().is_none());
        assert!(!session.feedback_visible());

        let transition = session.advance();
        assert!(transition.persist.completed);
        assert!(!transition.persist.index);
        assert_eq!(session.progress().percent, 100);
    }

    #[test]
    fn outline_reflects_gating() {
        let mut session = LessonSession::new(lesson());
        session.advance();
        let statuses: Vec<_> = session.outline().iter().map(|row| row.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Completed, StepStatus::Available, StepStatus::Locked]
        );
        assert!(session.outline()[1].is_current);
    }
}
