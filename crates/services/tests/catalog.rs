use std::fs;

use learn_core::model::LessonId;
use services::{LessonCatalog, LessonLoadError};

const LESSON: &str = r#"{
  "id": "intro",
  "title": "Intro",
  "steps": [
    { "id": 1, "title": "Hello", "type": "reading", "content": "Hi" },
    { "id": 2, "title": "Print", "type": "coding", "defaultCode": "", "expectedOutput": "Hello" }
  ]
}"#;

#[test]
fn loads_lessons_keyed_by_file_stem() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("intro.json"), LESSON).unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let catalog = LessonCatalog::load_dir(dir.path()).unwrap();
    assert_eq!(catalog.len(), 1);
    let lesson = catalog.get(&LessonId::new("intro").unwrap()).unwrap();
    assert_eq!(lesson.len(), 2);
    assert!(lesson.steps()[1].is_graded());
}

#[test]
fn rejects_id_that_disagrees_with_file_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("other.json"), LESSON).unwrap();

    let err = LessonCatalog::load_dir(dir.path()).unwrap_err();
    assert!(matches!(err, LessonLoadError::IdMismatch { .. }));
}

#[test]
fn reports_invalid_lessons_with_their_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.json"), r#"{"id":"broken","title":"B","steps":[]}"#)
        .unwrap();

    let err = LessonCatalog::load_dir(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        LessonLoadError::Lesson {
            source: learn_core::Error::Lesson(_),
            ..
        }
    ));
    assert!(err.to_string().contains("broken.json"));
}

#[test]
fn file_names_that_are_not_lesson_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Intro Lesson.json"), LESSON).unwrap();

    let err = LessonCatalog::load_dir(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        LessonLoadError::Lesson {
            source: learn_core::Error::Id(_),
            ..
        }
    ));
    assert!(err.to_string().contains("Intro Lesson.json"));
}

#[test]
fn missing_directory_is_an_io_error() {
    let err = LessonCatalog::load_dir("/definitely/not/here").unwrap_err();
    assert!(matches!(err, LessonLoadError::Io { .. }));
}

#[test]
fn bundled_lessons_load_and_their_complete_examples_pass() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../lessons");
    let catalog = LessonCatalog::load_dir(dir).unwrap();
    assert!(catalog.len() >= 4);

    let challenges = services::ChallengeService::default();
    let mut graded_examples = 0;
    for lesson in catalog.lessons() {
        for step in lesson.steps() {
            let (Some(source), Some(expected)) = (step.default_source(), step.expected_output())
            else {
                continue;
            };
            let result = challenges.execute(source, expected);
            // Starter code with blanks is supposed to fail; finished examples must pass.
            let finished = source.contains("console.log(")
                && !source.contains("= ;")
                && !source.contains("console.log(\"\")");
            if finished {
                assert!(
                    result.is_correct(),
                    "{} step {}: got {:?}",
                    lesson.id(),
                    step.id(),
                    result.output.text()
                );
                graded_examples += 1;
            } else {
                assert!(!result.is_correct());
            }
        }
    }
    assert!(graded_examples >= 5);
}
