use learn_core::{ValidationVerdict, compare};
use sandbox::{RunOutput, Sandbox};

/// Outcome of running a program and grading its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResult {
    pub output: RunOutput,
    pub verdict: ValidationVerdict,
}

impl ChallengeResult {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.verdict.is_match()
    }
}

/// Stateless run-then-compare flow, usable without a lesson session.
#[derive(Debug, Clone, Default)]
pub struct ChallengeService {
    sandbox: Sandbox,
}

impl ChallengeService {
    #[must_use]
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Run `code` and compare what it printed, fault line included, against `expected`.
    #[must_use]
    pub fn execute(&self, code: &str, expected: &str) -> ChallengeResult {
        let output = self.sandbox.run(code);
        let verdict = compare(&output.text(), expected);
        tracing::debug!(
            correct = verdict.is_match(),
            mismatches = verdict.mismatch_count(),
            "challenge graded"
        );
        ChallengeResult { output, verdict }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_output_is_correct() {
        let service = ChallengeService::default();
        let result = service.execute(
            "let a = 5;\nlet b = 10;\nconsole.log('Sum: ' + (a + b));",
            "Sum: 15",
        );
        assert!(result.is_correct());
        assert_eq!(result.output.captured(), "Sum: 15\n");
    }

    #[test]
    fn case_difference_is_a_mismatch() {
        let result = ChallengeService::default().execute("console.log('sum: 15')", "Sum: 15");
        assert!(!result.is_correct());
        assert_eq!(result.verdict.first_mismatch(), Some(0));
    }

    #[test]
    fn faults_are_graded_as_text() {
        let result = ChallengeService::default()
            .execute("throw new Error('boom')", "Error: boom");
        assert!(result.is_correct());
        assert!(!result.output.is_success());
    }
}
