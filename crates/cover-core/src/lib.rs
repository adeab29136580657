//! Cover-Core: domain model shared by the repair pipeline
//!
//! Holds the per-item [`PipelineContext`], the process [`RepairConfig`],
//! tracing setup, lifecycle events and run artifacts. Storage and
//! capability types the pipeline touches are re-exported from here.

pub mod artifact;
pub mod config;
pub mod context;
pub mod error;
pub mod obs;
pub mod telemetry;

pub use artifact::{content_digest, read_json_artifact, write_json_artifact};
pub use config::{PipelineSettings, RepairConfig, DEFAULT_PUBLIC_BASE};
pub use context::{Candidate, EscalationTier, PipelineContext, RetryStage};
pub use error::{ConfigError, CoreError, Result};

pub use cover_capture::{ImageSource, Verdict};
pub use cover_state::{CheckResultUpdate, NewsId, NewsItem};
