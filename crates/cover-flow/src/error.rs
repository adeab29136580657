//! Faults that abort a single item's pipeline run.

use cover_capture::CaptureError;
use cover_state::{NewsId, StorageError};
use thiserror::Error;

use crate::stage::Stage;

/// A stage could not do its job. Domain-negative answers are outcomes, not
/// faults; only these end a run early.
#[derive(Error, Debug)]
pub enum StageFault {
    #[error("{stage}: {source}")]
    Capture {
        stage: Stage,
        #[source]
        source: CaptureError,
    },

    #[error("{stage}: {source}")]
    Storage {
        stage: Stage,
        #[source]
        source: StorageError,
    },

    #[error("news {news_id} reached update_record without a verdict")]
    MissingVerdict { news_id: NewsId },
}

impl StageFault {
    pub fn capture(stage: Stage, source: CaptureError) -> Self {
        StageFault::Capture { stage, source }
    }

    pub fn storage(stage: Stage, source: StorageError) -> Self {
        StageFault::Storage { stage, source }
    }

    /// Stage that faulted.
    pub fn stage(&self) -> Stage {
        match self {
            StageFault::Capture { stage, .. } | StageFault::Storage { stage, .. } => *stage,
            StageFault::MissingVerdict { .. } => Stage::UpdateRecord,
        }
    }
}

/// Result type for stage execution.
pub type Result<T> = std::result::Result<T, StageFault>;

/// A fault that outlasted its retries, with the stages run before it.
#[derive(Error, Debug)]
#[error("{fault}")]
pub struct FlowAbort {
    /// Stages executed, in order, including every faulted attempt
    pub visited: Vec<Stage>,
    pub fault: StageFault,
}
