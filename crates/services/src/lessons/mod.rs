mod session;
mod view;
mod workflow;

// Public API of the lesson subsystem.
pub use session::{LessonSession, PersistIntent, Transition};
pub use view::{ChallengeStatus, LessonProgress, StepOutline};
pub use workflow::{KeyLayout, LessonLoopService};
