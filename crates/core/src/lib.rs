//! Domain model and output grading for interactive lessons.

#![forbid(unsafe_code)]

pub mod error;
pub mod grading;
pub mod model;

pub use error::Error;
pub use grading::{LineComparison, ValidationVerdict, compare};
