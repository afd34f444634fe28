//! Workflow pipelines orchestrating stateless services.

pub mod sign;
pub mod verify;

pub use sign::{SignEngine, SignOptions, SignOutcome, SignState};
pub use verify::{check_archive_on_startup, VerifyEngine};
