use thiserror::Error;

use crate::entry::EntryStatus;
use crate::pipeline::Stage;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Draft listing could not be created: {0}")]
    DraftInit(String),

    #[error("{stage} stage failed: {message}")]
    StageFailed { stage: Stage, message: String },

    #[error("{stage} stage timed out after {timeout_secs}s")]
    StageTimeout { stage: Stage, timeout_secs: u64 },

    #[error("Invalid entry state transition from {from} to {to}")]
    InvalidTransition { from: EntryStatus, to: EntryStatus },

    #[error("Invalid entry status: {0}")]
    InvalidStatus(String),
}

pub type Result<T> = std::result::Result<T, UploadError>;
