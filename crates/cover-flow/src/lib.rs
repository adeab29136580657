//! Cover-Flow: the escalating cover repair pipeline
//!
//! - [`Stage`] / [`Outcome`]: what runs and what it reports
//! - [`FlowGraph`]: static `(stage, outcome) -> stage` edge table
//! - [`FlowEngine`]: driver loop with a per-stage retry ceiling
//! - [`StageRunner`]: stage implementations over the capability traits
//! - [`RepairRun`]: sequential batch over pending items, producing a [`RunReport`]

pub mod engine;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod runner;
pub mod stage;

pub use engine::{FlowEngine, FlowTrace, Termination};
pub use error::{FlowAbort, StageFault};
pub use graph::FlowGraph;
pub use orchestrator::{ItemOutcome, ItemReport, RepairRun, RunReport};
pub use runner::{StageRunner, NO_IMAGE_REASON};
pub use stage::{Outcome, Stage};
