//! Data models for platform entities.
//!
//! This module contains the structures used to represent server data:
//!
//! - `User`: the authenticated account profile
//! - `Course`, `Lecture`: catalog content, embedded lectures on detail reads
//! - `Test`, `Question`, `TestResult`: assessments and attempts
//! - `Purchase`, `CourseDetailWithStatus`: enrollment state
//! - `CourseProgress`, `LectureProgress`: playback progress tracking
//!
//! Field names follow the server's wire format (Mongo-style `_id`,
//! camelCase) via serde renames.

pub mod course;
pub mod progress;
pub mod purchase;
pub mod user;

pub use course::{Course, CourseCreator, CourseUpdate, Lecture, LectureUpdate};
pub use progress::{CourseProgress, LectureProgress};
pub use purchase::{CourseDetailWithStatus, Purchase};
pub use test::{NewQuestion, NewTest, Question, Test, TestResult, TestSubmission};
pub use user::User;
