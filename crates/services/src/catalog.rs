use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use learn_core::model::{Lesson, LessonId};

use crate::error::LessonLoadError;

/// Lesson definitions loaded from a directory of `*.json` files.
///
/// Each file's stem is the lesson id and must agree with the `id` it declares.
#[derive(Debug, Clone, Default)]
pub struct LessonCatalog {
    lessons: BTreeMap<LessonId, Lesson>,
}

impl LessonCatalog {
    /// Load every `*.json` file directly inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns `LessonLoadError` if the directory or a file cannot be read, a
    /// file is not a valid lesson, or its id disagrees with its file name.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, LessonLoadError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| LessonLoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| LessonLoadError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut lessons = BTreeMap::new();
        for path in paths {
            let expected = file_lesson_id(&path)?;
            let lesson = load_file(&path)?;
            if lesson.id() != &expected {
                return Err(LessonLoadError::IdMismatch {
                    path,
                    expected: expected.to_string(),
                    found: lesson.id().to_string(),
                });
            }
            lessons.insert(expected, lesson);
        }
        tracing::debug!(dir = %dir.display(), count = lessons.len(), "loaded lesson catalog");
        Ok(Self { lessons })
    }

    #[must_use]
    pub fn get(&self, id: &LessonId) -> Option<&Lesson> {
        self.lessons.get(id)
    }

    /// Lessons ordered by id.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.lessons.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

/// Read and validate one lesson file.
///
/// # Errors
///
/// Returns `LessonLoadError::Io` if the file cannot be read, or
/// `LessonLoadError::Lesson` if it is not a valid lesson definition.
pub fn load_file(path: impl AsRef<Path>) -> Result<Lesson, LessonLoadError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| LessonLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Lesson::from_json(&raw).map_err(|source| LessonLoadError::Lesson {
        path: path.to_path_buf(),
        source: source.into(),
    })
}

fn file_lesson_id(path: &Path) -> Result<LessonId, LessonLoadError> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| LessonLoadError::InvalidFileName {
            path: PathBuf::from(path),
        })?;
    LessonId::new(stem).map_err(|source| LessonLoadError::Lesson {
        path: path.to_path_buf(),
        source: source.into(),
    })
}
