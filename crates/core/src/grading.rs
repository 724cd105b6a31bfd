//! Output validation: normalizes captured output and compares it line by line
//! against the expected output of a coding step.
//!
//! Normalization unifies line endings, trims the whole block, trims every line
//! and drops lines that end up empty. Comparison is then exact per line: no case
//! folding, no whitespace collapsing, no numeric tolerance.

/// Unify `\r\n` and `\r` into `\n` and trim the block.
#[must_use]
pub fn clean_block(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_owned()
}

/// Normalized, non-empty, trimmed lines of a text block.
#[must_use]
pub fn normalize_block(text: &str) -> Vec<String> {
    clean_block(text)
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// One aligned pair of normalized lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineComparison {
    pub actual: String,
    pub expected: String,
    pub matches: bool,
}

/// Immutable result of comparing actual output against expected output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    is_match: bool,
    cleaned_actual: String,
    cleaned_expected: String,
    normalized_actual: Vec<String>,
    normalized_expected: Vec<String>,
    per_line: Vec<LineComparison>,
}

impl ValidationVerdict {
    #[must_use]
    pub fn is_match(&self) -> bool {
        self.is_match
    }

    /// Actual output with unified line endings, trimmed as a block.
    #[must_use]
    pub fn cleaned_actual(&self) -> &str {
        &self.cleaned_actual
    }

    #[must_use]
    pub fn cleaned_expected(&self) -> &str {
        &self.cleaned_expected
    }

    #[must_use]
    pub fn normalized_actual(&self) -> &[String] {
        &self.normalized_actual
    }

    #[must_use]
    pub fn normalized_expected(&self) -> &[String] {
        &self.normalized_expected
    }

    /// Pairs for every index in `0..max(actual, expected)`; a missing side is `""`.
    #[must_use]
    pub fn per_line(&self) -> &[LineComparison] {
        &self.per_line
    }

    #[must_use]
    pub fn line_count_matches(&self) -> bool {
        self.normalized_actual.len() == self.normalized_expected.len()
    }

    #[must_use]
    pub fn first_mismatch(&self) -> Option<usize> {
        self.per_line.iter().position(|line| !line.matches)
    }

    #[must_use]
    pub fn mismatch_count(&self) -> usize {
        self.per_line.iter().filter(|line| !line.matches).count()
    }
}

/// Compare captured output with the expected output.
///
/// Never fails: a mismatch is a normal verdict, not an error.
#[must_use]
pub fn compare(actual: &str, expected: &str) -> ValidationVerdict {
    let normalized_actual = normalize_block(actual);
    let normalized_expected = normalize_block(expected);

    let rows = normalized_actual.len().max(normalized_expected.len());
    let per_line: Vec<LineComparison> = (0..rows)
        .map(|index| {
            let actual = normalized_actual.get(index).cloned().unwrap_or_default();
            let expected = normalized_expected.get(index).cloned().unwrap_or_default();
            let matches = actual == expected;
            LineComparison {
                actual,
                expected,
                matches,
            }
        })
        .collect();

    let is_match = normalized_actual.len() == normalized_expected.len()
        && per_line.iter().all(|line| line.matches);

    ValidationVerdict {
        is_match,
        cleaned_actual: clean_block(actual),
        cleaned_expected: clean_block(expected),
        normalized_actual,
        normalized_expected,
        per_line,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blank_lines_carry_no_weight() {
        assert!(compare("a\n\nb", "a\nb").is_match());
        assert!(compare("  a  \r\n\r\n b\r", "a\nb\n\n").is_match());
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let verdict = compare("A", "a");
        assert!(!verdict.is_match());
        assert_eq!(verdict.first_mismatch(), Some(0));
    }

    #[test]
    fn comparison_is_order_sensitive() {
        let verdict = compare("a\nb", "b\na");
        assert!(!verdict.is_match());
        assert_eq!(verdict.mismatch_count(), 2);
    }

    #[test]
    fn inner_whitespace_is_not_collapsed() {
        assert!(!compare("Sum:  15", "Sum: 15").is_match());
    }

    #[test]
    fn extra_actual_line_pairs_with_empty_expected() {
        let verdict = compare("Sum: 15\nextra", "Sum: 15");
        assert!(!verdict.is_match());
        assert!(!verdict.line_count_matches());
        assert_eq!(
            verdict.per_line()[1],
            LineComparison {
                actual: "extra".into(),
                expected: String::new(),
                matches: false,
            }
        );
    }

    #[test]
    fn missing_actual_line_pairs_with_empty_actual() {
        let verdict = compare("Sum: 15", "Sum: 15\nDone");
        assert!(!verdict.is_match());
        assert_eq!(verdict.per_line().len(), 2);
        assert_eq!(verdict.per_line()[1].actual, "");
        assert_eq!(verdict.per_line()[1].expected, "Done");
    }

    #[test]
    fn case_mismatch_reports_per_line_diff() {
        let verdict = compare("sum: 15\n", "Sum: 15");
        assert!(!verdict.is_match());
        assert_eq!(
            verdict.per_line(),
            &[LineComparison {
                actual: "sum: 15".into(),
                expected: "Sum: 15".into(),
                matches: false,
            }]
        );
    }

    #[test]
    fn empty_output_matches_empty_expected() {
        let verdict = compare("\n\n  \n", "");
        assert!(verdict.is_match());
        assert!(verdict.per_line().is_empty());
    }

    #[test]
    fn cleaned_blocks_keep_inner_blank_lines() {
        let verdict = compare("\r\nA\r\n\r\nB\r\n", "A\nB");
        assert_eq!(verdict.cleaned_actual(), "A\n\nB");
        assert_eq!(verdict.normalized_actual(), &["A".to_string(), "B".to_string()]);
    }

    proptest! {
        #[test]
        fn compare_is_reflexive(text in "[ -~\\n\\r\\t]{0,200}") {
            prop_assert!(compare(&text, &text).is_match());
        }

        #[test]
        fn interleaved_blank_lines_are_ignored(
            lines in proptest::collection::vec("[a-zA-Z0-9:]{1,12}", 0..8),
            pad in 0usize..4,
        ) {
            let expected = lines.join("\n");
            let spacer = "\n".repeat(pad + 1);
            let actual = format!("{spacer}{}{spacer}", lines.join(&spacer));
            prop_assert!(compare(&actual, &expected).is_match());
        }

        #[test]
        fn length_mismatch_never_matches(
            lines in proptest::collection::vec("[a-z]{1,8}", 1..6),
        ) {
            let expected = lines.join("\n");
            let actual = format!("{expected}\nsurplus");
            prop_assert!(!compare(&actual, &expected).is_match());
        }
    }
}
