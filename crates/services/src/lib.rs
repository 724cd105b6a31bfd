#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod challenge_service;
pub mod error;
pub mod lessons;

pub use app_services::AppServices;
pub use catalog::{LessonCatalog, load_file};
pub use challenge_service::{ChallengeResult, ChallengeService};
pub use error::{AppServicesError, LessonLoadError};
pub use lessons::{
    ChallengeStatus, KeyLayout, LessonLoopService, LessonProgress, LessonSession, PersistIntent,
    StepOutline, Transition,
};
