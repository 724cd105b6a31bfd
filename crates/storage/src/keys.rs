use learn_core::model::LessonId;

const CURRENT_STEP: &str = "current-step";
const COMPLETED_STEPS: &str = "completed-steps";

/// The two persisted keys for one lesson's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressKeys {
    current_step: String,
    completed_steps: String,
}

impl ProgressKeys {
    /// Keys namespaced by lesson, so several lessons can share one store.
    #[must_use]
    pub fn for_lesson(id: &LessonId) -> Self {
        Self {
            current_step: format!("lesson:{id}:{CURRENT_STEP}"),
            completed_steps: format!("lesson:{id}:{COMPLETED_STEPS}"),
        }
    }

    /// The un-namespaced keys used when only one lesson existed.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            current_step: format!("lesson-{CURRENT_STEP}"),
            completed_steps: format!("lesson-{COMPLETED_STEPS}"),
        }
    }

    #[must_use]
    pub fn current_step(&self) -> &str {
        &self.current_step
    }

    #[must_use]
    pub fn completed_steps(&self) -> &str {
        &self.completed_steps
    }
}
