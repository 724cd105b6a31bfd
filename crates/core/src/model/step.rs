use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::StepId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepError {
    #[error("step id must be > 0")]
    ZeroId,

    #[error("step {id} title cannot be empty")]
    EmptyTitle { id: u64 },
}

//
// ─── STEP KIND ─────────────────────────────────────────────────────────────────
//

/// Whether a step only explains, or also carries an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Explanatory content. Completed by advancing past it.
    Reading,
    /// Exercise-bearing content. Completed by a matching run.
    Coding,
}

impl StepKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Reading => "reading",
            StepKind::Coding => "coding",
        }
    }
}

//
// ─── STEP DRAFT ────────────────────────────────────────────────────────────────
//

/// Unvalidated step record, shaped like the lesson definition files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDraft {
    pub id: u64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: StepKind,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}

impl StepDraft {
    #[must_use]
    pub fn reading(id: u64, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            kind: StepKind::Reading,
            content: content.into(),
            default_code: None,
            expected_output: None,
            challenge: None,
        }
    }

    #[must_use]
    pub fn coding(
        id: u64,
        title: impl Into<String>,
        default_code: impl Into<String>,
        expected_output: Option<&str>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            kind: StepKind::Coding,
            content: String::new(),
            default_code: Some(default_code.into()),
            expected_output: expected_output.map(str::to_owned),
            challenge: None,
        }
    }

    /// Validate the draft into a `Step`.
    ///
    /// A blank `expected_output` counts as absent: the step is then not graded.
    /// Reading steps never carry source or expected output.
    ///
    /// # Errors
    ///
    /// Returns `StepError::ZeroId` or `StepError::EmptyTitle`.
    pub fn validate(self) -> Result<Step, StepError> {
        if self.id == 0 {
            return Err(StepError::ZeroId);
        }
        let title = self.title.trim();
        if title.is_empty() {
            return Err(StepError::EmptyTitle { id: self.id });
        }

        let (default_source, expected_output) = match self.kind {
            StepKind::Reading => (None, None),
            StepKind::Coding => (
                self.default_code,
                self.expected_output.filter(|text| !text.trim().is_empty()),
            ),
        };

        Ok(Step {
            id: StepId::new(self.id),
            title: title.to_owned(),
            kind: self.kind,
            content: self.content,
            default_source,
            expected_output,
            challenge: self.challenge.filter(|text| !text.trim().is_empty()),
        })
    }
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// One validated unit of lesson content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    id: StepId,
    title: String,
    kind: StepKind,
    content: String,
    default_source: Option<String>,
    expected_output: Option<String>,
    challenge: Option<String>,
}

impl Step {
    #[must_use]
    pub fn id(&self) -> StepId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn kind(&self) -> StepKind {
        self.kind
    }

    /// Opaque rich text; not interpreted here.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Initial editor source for coding steps.
    #[must_use]
    pub fn default_source(&self) -> Option<&str> {
        self.default_source.as_deref()
    }

    #[must_use]
    pub fn expected_output(&self) -> Option<&str> {
        self.expected_output.as_deref()
    }

    #[must_use]
    pub fn challenge(&self) -> Option<&str> {
        self.challenge.as_deref()
    }

    #[must_use]
    pub fn is_reading(&self) -> bool {
        self.kind == StepKind::Reading
    }

    /// True when a run on this step is compared against an expected output.
    #[must_use]
    pub fn is_graded(&self) -> bool {
        self.kind == StepKind::Coding && self.expected_output.is_some()
    }

    /// True when advancing past this step completes it implicitly.
    #[must_use]
    pub fn completes_on_advance(&self) -> bool {
        !self.is_graded()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
