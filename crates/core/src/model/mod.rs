mod ids;
mod lesson;
pub mod progress;
mod step;

pub use ids::{LessonId, ParseIdError, StepId};
pub use lesson::{Lesson, LessonDraft, LessonError};
pub use progress::{ProgressState, StepStatus};
pub use step::{Step, StepDraft, StepError, StepKind};
