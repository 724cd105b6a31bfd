//! Plain-text rendering of lesson state for the terminal.

use std::fmt::Write as _;

use learn_core::ValidationVerdict;
use learn_core::model::{StepKind, StepStatus};
use services::{ChallengeStatus, LessonSession};

pub fn verdict(verdict: &ValidationVerdict) -> String {
    let mut out = String::new();
    if verdict.is_match() {
        out.push_str("Correct! Your output matches.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "Not quite. {} of {} line(s) differ.",
        verdict.mismatch_count(),
        verdict.per_line().len()
    );
    if !verdict.line_count_matches() {
        let _ = writeln!(
            out,
            "Expected {} line(s), got {}.",
            verdict.normalized_expected().len(),
            verdict.normalized_actual().len()
        );
    }
    for (i, line) in verdict.per_line().iter().enumerate() {
        let mark = if line.matches { "ok  " } else { "diff" };
        let _ = writeln!(out, "  {mark} {:>3} | {}", i + 1, line.actual);
        if !line.matches {
            let _ = writeln!(out, "       expected | {}", line.expected);
        }
    }
    out
}

fn status_mark(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Completed => "[x]",
        StepStatus::Available => "[ ]",
        StepStatus::Locked => "[-]",
    }
}

/// Lesson header, step outline and the current step's content.
pub fn session(session: &LessonSession) -> String {
    let lesson = session.lesson();
    let progress = session.progress();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}  ({}%, {}/{} steps)",
        lesson.title(),
        progress.percent,
        progress.completed,
        progress.total
    );
    for row in session.outline() {
        let cursor = if row.is_current { '>' } else { ' ' };
        let _ = writeln!(
            out,
            "{cursor} {} {:>2}. {} ({})",
            status_mark(row.status),
            row.index + 1,
            row.title,
            row.kind.as_str()
        );
    }

    let step = session.current_step();
    let _ = writeln!(
        out,
        "\nStep {} of {}: {}",
        session.current_index() + 1,
        lesson.len(),
        step.title()
    );
    if !step.content().is_empty() {
        let _ = writeln!(out, "{}", step.content().trim_end());
    }
    if step.kind() == StepKind::Coding {
        if let Some(challenge) = step.challenge() {
            let _ = writeln!(out, "Challenge: {challenge}");
        }
        if let Some(source) = step.default_source() {
            let _ = writeln!(out, "Starter code:\n{}", indent(source));
        }
        let status = session.challenge_status();
        if step.is_graded() && status != ChallengeStatus::NotAttempted {
            let _ = writeln!(out, "Challenge status: {}", status.as_str());
        }
    }
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use learn_core::compare;
    use learn_core::model::{LessonDraft, LessonId, StepDraft};

    #[test]
    fn matching_verdict_is_one_line() {
        assert_eq!(verdict(&compare("a\n", "a")), "Correct! Your output matches.\n");
    }

    #[test]
    fn mismatch_lists_each_line() {
        let text = verdict(&compare("sum: 15\n", "Sum: 15"));
        assert!(text.starts_with("Not quite. 1 of 1 line(s) differ."));
        assert!(text.contains("diff   1 | sum: 15"));
        assert!(text.contains("expected | Sum: 15"));
    }

    #[test]
    fn session_view_marks_current_and_locked_steps() {
        let lesson = LessonDraft {
            id: LessonId::new("demo").unwrap(),
            title: "Demo".into(),
            description: String::new(),
            steps: vec![
                StepDraft::reading(1, "Read", "Some text"),
                StepDraft::coding(2, "Code", "console.log(1)", Some("1")),
            ],
        }
        .validate()
        .unwrap();
        let text = session(&LessonSession::new(lesson));
        assert!(text.starts_with("Demo  (0%, 0/2 steps)"));
        assert!(text.contains("> [ ]  1. Read (reading)"));
        assert!(text.contains("  [-]  2. Code (coding)"));
        assert!(text.contains("Step 1 of 2: Read"));
    }
}
