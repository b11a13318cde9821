use std::path::PathBuf;
use thiserror::Error;

/// Session lifecycle failures. These are surfaced to the host; out-of-state
/// `record` calls are not errors and never show up here.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already recording in {}", .0.display())]
    AlreadyActive(PathBuf),
    #[error("no session is recording")]
    NotActive,
    #[error("session in {} has no recorded samples", .0.display())]
    EmptySession(PathBuf),
    #[error("assessment item q{item} scored {value}, expected 0..=4")]
    InvalidAssessment { item: usize, value: u8 },
    #[error(transparent)]
    Artifact(#[from] anyhow::Error),
}
