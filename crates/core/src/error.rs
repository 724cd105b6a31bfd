use thiserror::Error;

use crate::model::{LessonError, ParseIdError};

/// Why lesson content was rejected: a bad definition or an unusable id.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Id(#[from] ParseIdError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LessonId, StepId};

    fn parse_pair(lesson: &str, step: &str) -> Result<(LessonId, StepId), Error> {
        Ok((lesson.parse()?, step.parse()?))
    }

    #[test]
    fn id_errors_convert_into_crate_error() {
        assert!(parse_pair("intro", "3").is_ok());
        assert!(matches!(parse_pair("", "3"), Err(Error::Id(_))));
        assert!(matches!(parse_pair("intro", "x"), Err(Error::Id(_))));
    }
}
