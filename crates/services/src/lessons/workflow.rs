use std::collections::BTreeSet;
use std::sync::Arc;

use learn_core::model::{Lesson, StepId};
use sandbox::{ExecutionError, RunOutput, Sandbox};
use storage::ProgressKeys;
use storage::codec::{decode_completed, decode_index, encode_completed, encode_index};
use storage::repository::{ProgressStore, StorageError};

use super::session::{LessonSession, Transition};

/// How persisted keys are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyLayout {
    /// `lesson:<id>:...`, one pair of keys per lesson.
    #[default]
    PerLesson,
    /// The single global pair shared by every lesson.
    Legacy,
}

/// Orchestrates lesson sessions with best-effort persistence.
///
/// Each action applies the session transition first, then writes whatever
/// the transition asks for. Storage faults are logged and swallowed: the
/// in-memory session stays authoritative.
#[derive(Clone)]
pub struct LessonLoopService {
    sandbox: Sandbox,
    store: Arc<dyn ProgressStore>,
    layout: KeyLayout,
}

impl LessonLoopService {
    #[must_use]
    pub fn new(sandbox: Sandbox, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            sandbox,
            store,
            layout: KeyLayout::default(),
        }
    }

    #[must_use]
    pub fn with_key_layout(mut self, layout: KeyLayout) -> Self {
        self.layout = layout;
        self
    }

    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    #[must_use]
    pub fn keys_for(&self, lesson: &Lesson) -> ProgressKeys {
        match self.layout {
            KeyLayout::PerLesson => ProgressKeys::for_lesson(lesson.id()),
            KeyLayout::Legacy => ProgressKeys::legacy(),
        }
    }

    /// Open `lesson`, restoring saved progress when there is any.
    ///
    /// Unreadable or malformed values are ignored and the matching default
    /// (step 0, nothing completed) is used instead.
    pub async fn open(&self, lesson: Lesson) -> LessonSession {
        let keys = self.keys_for(&lesson);
        let index = self
            .load_with(keys.current_step(), decode_index)
            .await;
        let completed: BTreeSet<StepId> = self
            .load_with(keys.completed_steps(), decode_completed)
            .await
            .unwrap_or_default();

        let session = LessonSession::restore(lesson, index, completed);
        tracing::debug!(
            lesson = %session.lesson().id(),
            index = session.current_index(),
            completed = session.completed_ids().len(),
            "opened lesson"
        );
        session
    }

    /// Run `source` against the current step and persist a new completion.
    pub async fn run_code(&self, session: &mut LessonSession, source: &str) -> Transition {
        let output = self.execute(source).await;
        let transition = session.record_run(&output);
        self.persist(session, transition).await;
        transition
    }

    pub async fn advance(&self, session: &mut LessonSession) -> Transition {
        let transition = session.advance();
        self.persist(session, transition).await;
        transition
    }

    pub async fn retreat(&self, session: &mut LessonSession) -> Transition {
        let transition = session.retreat();
        self.persist(session, transition).await;
        transition
    }

    pub async fn jump_to(&self, session: &mut LessonSession, index: usize) -> Transition {
        let transition = session.jump_to(index);
        self.persist(session, transition).await;
        transition
    }

    pub async fn dismiss_feedback(&self, session: &mut LessonSession) -> Transition {
        let transition = session.dismiss_feedback();
        self.persist(session, transition).await;
        transition
    }

    pub async fn reset(&self, session: &mut LessonSession) -> Transition {
        let transition = session.reset();
        self.persist(session, transition).await;
        transition
    }

    /// The interpreter is synchronous and bounded by its own budget; keep it
    /// off the async workers.
    async fn execute(&self, source: &str) -> RunOutput {
        let sandbox = self.sandbox.clone();
        let source = source.to_owned();
        match tokio::task::spawn_blocking(move || sandbox.run(&source)).await {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!(error = %err, "sandbox task failed");
                RunOutput::failed(ExecutionError::Internal(err.to_string()))
            }
        }
    }

    async fn load_with<T>(
        &self,
        key: &str,
        decode: impl Fn(&str) -> Result<T, StorageError>,
    ) -> Option<T> {
        let raw = match self.store.load(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(error = %err, key, "failed to load lesson progress");
                return None;
            }
        };
        match decode(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(error = %err, key, "ignoring malformed lesson progress");
                None
            }
        }
    }

    async fn persist(&self, session: &LessonSession, transition: Transition) {
        let intent = transition.persist;
        if intent.is_empty() {
            return;
        }
        let keys = self.keys_for(session.lesson());

        if intent.erase {
            for key in [keys.current_step(), keys.completed_steps()] {
                if let Err(err) = self.store.remove(key).await {
                    tracing::warn!(error = %err, key, "failed to clear lesson progress");
                }
            }
            return;
        }
        if intent.completed {
            let value = encode_completed(session.completed_ids());
            self.save(keys.completed_steps(), &value).await;
        }
        if intent.index {
            let value = encode_index(session.current_index());
            self.save(keys.current_step(), &value).await;
        }
    }

    async fn save(&self, key: &str, value: &str) {
        if let Err(err) = self.store.save(key, value).await {
            tracing::warn!(error = %err, key, "failed to save lesson progress");
        }
    }
}
