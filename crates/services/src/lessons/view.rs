use learn_core::model::progress::progress_percent;
use learn_core::model::{StepId, StepKind, StepStatus};
use learn_core::ValidationVerdict;

/// Aggregated view of lesson progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonProgress {
    pub total: usize,
    pub completed: usize,
    pub percent: u32,
    pub is_complete: bool,
}

impl LessonProgress {
    #[must_use]
    pub fn new(completed: usize, total: usize) -> Self {
        Self {
            total,
            completed,
            percent: progress_percent(completed, total),
            is_complete: total > 0 && completed >= total,
        }
    }
}

/// One row of the step list shown next to a lesson.
///
/// Presentation-agnostic: no pre-formatted strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutline {
    pub index: usize,
    pub id: StepId,
    pub title: String,
    pub kind: StepKind,
    pub status: StepStatus,
    pub is_current: bool,
}

/// Exercise state of the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengeStatus {
    NotAttempted,
    /// Ran at least once without a matching verdict.
    Attempted,
    Solved,
}

impl ChallengeStatus {
    #[must_use]
    pub fn from_run(last_output: &str, verdict: Option<&ValidationVerdict>) -> Self {
        match verdict {
            Some(verdict) if verdict.is_match() => Self::Solved,
            Some(_) => Self::Attempted,
            None if !last_output.is_empty() => Self::Attempted,
            None => Self::NotAttempted,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotAttempted => "not-attempted",
            Self::Attempted => "attempted",
            Self::Solved => "solved",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_reports_completion() {
        let progress = LessonProgress::new(2, 3);
        assert_eq!(progress.percent, 67);
        assert!(!progress.is_complete);
        assert!(LessonProgress::new(3, 3).is_complete);
    }

    #[test]
    fn challenge_status_follows_verdict() {
        let solved = learn_core::compare("Sum: 15\n", "Sum: 15");
        let missed = learn_core::compare("sum: 15\n", "Sum: 15");
        assert_eq!(ChallengeStatus::from_run("", None), ChallengeStatus::NotAttempted);
        assert_eq!(ChallengeStatus::from_run("x\n", None), ChallengeStatus::Attempted);
        assert_eq!(
            ChallengeStatus::from_run("sum: 15\n", Some(&missed)),
            ChallengeStatus::Attempted
        );
        assert_eq!(
            ChallengeStatus::from_run("Sum: 15\n", Some(&solved)),
            ChallengeStatus::Solved
        );
    }
}
