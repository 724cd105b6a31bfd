use std::sync::Arc;

use async_trait::async_trait;
use learn_core::model::{Lesson, LessonDraft, LessonId, StepDraft, StepId};
use sandbox::Sandbox;
use services::{ChallengeStatus, KeyLayout, LessonLoopService};
use storage::ProgressKeys;
use storage::repository::{InMemoryStore, ProgressStore, StorageError};

const SUM_PROGRAM: &str = "let a = 5;\nlet b = 10;\nconsole.log(\"Sum: \" + (a + b));";

fn lesson() -> Lesson {
    LessonDraft {
        id: LessonId::new("variables").unwrap(),
        title: "Variables".into(),
        description: "let and const".into(),
        steps: vec![
            StepDraft::reading(1, "Intro", "Variables hold values."),
            StepDraft::coding(2, "Add", "let a = 5;", Some("Sum: 15")),
            StepDraft::coding(3, "Shout", "", Some("HELLO")),
        ],
    }
    .validate()
    .unwrap()
}

fn keys() -> ProgressKeys {
    ProgressKeys::for_lesson(&LessonId::new("variables").unwrap())
}

struct BrokenStore;

#[async_trait]
impl ProgressStore for BrokenStore {
    async fn load(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn save(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Connection("offline".into()))
    }
}

#[tokio::test]
async fn progress_survives_reopening() {
    let store = InMemoryStore::new();
    let service = LessonLoopService::new(Sandbox::default(), Arc::new(store.clone()));

    let mut session = service.open(lesson()).await;
    service.advance(&mut session).await;
    service.run_code(&mut session, SUM_PROGRAM).await;
    service.dismiss_feedback(&mut session).await;
    assert_eq!(session.current_index(), 2);

    assert_eq!(
        store.load(keys().completed_steps()).await.unwrap().as_deref(),
        Some("[1,2]")
    );
    assert_eq!(
        store.load(keys().current_step()).await.unwrap().as_deref(),
        Some("2")
    );

    let reopened = service.open(lesson()).await;
    assert_eq!(reopened.current_index(), 2);
    assert_eq!(reopened.progress().completed, 2);
    assert_eq!(reopened.progress().percent, 67);
    assert!(!reopened.feedback_visible());
    assert_eq!(reopened.challenge_status(), ChallengeStatus::NotAttempted);
}

#[tokio::test]
async fn jump_waits_for_the_exercise() {
    let service = LessonLoopService::new(Sandbox::default(), Arc::new(InMemoryStore::new()));
    let mut session = service.open(lesson()).await;
    service.advance(&mut session).await;

    assert!(!service.jump_to(&mut session, 2).await.changed);
    service.run_code(&mut session, "console.log('sum: 15')").await;
    assert!(!service.jump_to(&mut session, 2).await.changed);
    assert!(!session.is_step_completed(StepId::new(2)));

    service.run_code(&mut session, SUM_PROGRAM).await;
    assert!(service.jump_to(&mut session, 2).await.changed);
    assert_eq!(session.current_index(), 2);
}

#[tokio::test]
async fn reset_erases_persisted_keys() {
    let store = InMemoryStore::new();
    let service = LessonLoopService::new(Sandbox::default(), Arc::new(store.clone()));
    let mut session = service.open(lesson()).await;
    service.advance(&mut session).await;
    assert!(!store.is_empty().unwrap());

    service.reset(&mut session).await;
    assert_eq!(session.current_index(), 0);
    assert!(session.completed_ids().is_empty());
    assert_eq!(session.progress().percent, 0);
    assert_eq!(store.load(keys().current_step()).await.unwrap(), None);
    assert_eq!(store.load(keys().completed_steps()).await.unwrap(), None);
}

#[tokio::test]
async fn storage_faults_do_not_break_the_session() {
    let service = LessonLoopService::new(Sandbox::default(), Arc::new(BrokenStore));
    let mut session = service.open(lesson()).await;
    assert_eq!(session.current_index(), 0);

    service.advance(&mut session).await;
    service.run_code(&mut session, SUM_PROGRAM).await;
    assert!(session.is_step_completed(StepId::new(2)));
    service.reset(&mut session).await;
    assert_eq!(session.progress().completed, 0);
}

#[tokio::test]
async fn malformed_values_fall_back_to_defaults() {
    let store = InMemoryStore::new();
    store.save(keys().current_step(), "two").await.unwrap();
    store.save(keys().completed_steps(), "1").await.unwrap();
    let service = LessonLoopService::new(Sandbox::default(), Arc::new(store));

    let session = service.open(lesson()).await;
    assert_eq!(session.current_index(), 0);
    assert!(session.is_step_completed(StepId::new(1)));
}

#[tokio::test]
async fn legacy_layout_reads_global_keys() {
    let store = InMemoryStore::new();
    store.save("lesson-current-step", "1").await.unwrap();
    store.save("lesson-completed-steps", "[1]").await.unwrap();
    let service = LessonLoopService::new(Sandbox::default(), Arc::new(store))
        .with_key_layout(KeyLayout::Legacy);

    let session = service.open(lesson()).await;
    assert_eq!(session.current_index(), 1);
}

#[tokio::test]
async fn thrown_errors_are_graded_as_output() {
    let service = LessonLoopService::new(Sandbox::default(), Arc::new(InMemoryStore::new()));
    let mut session = service.open(lesson()).await;
    service.advance(&mut session).await;

    service
        .run_code(&mut session, "console.log(total);")
        .await;
    assert_eq!(session.last_run_output(), "Error: total is not defined\n");
    assert!(session.feedback_visible());
    assert!(!session.last_verdict().unwrap().is_match());
}
