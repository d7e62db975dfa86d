//! Persistence for a daily team digest bot.
//!
//! [`DigestStore`] keeps team members, one digest per team and day, the GitHub
//! and Jira activity snapshots attached to each digest, and scrum meetings.
//! Collectors write through it; the reporting layer reads [`TeamReport`]s from it.

pub mod database;
pub mod error;
pub mod report;
pub mod settings;

pub use database::DigestStore;
pub use error::Error;
pub use report::TeamReport;
