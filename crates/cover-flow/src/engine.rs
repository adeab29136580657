//! Driver loop over the stage graph.
//!
//! Starting from the graph's entry, the engine runs a stage, routes on its
//! outcome and repeats until a stage ends the run. Each stage may be entered
//! at most `1 + max_retries` times per run; one more entry fails the run
//! closed without executing the stage.
//!
//! A faulted stage is entered again in place and the attempt counts against
//! the same ceiling. The fault from the last allowed attempt aborts the run.

use std::collections::BTreeMap;

use cover_core::obs::{emit_stage_completed, emit_stage_entered};
use cover_core::{EscalationTier, PipelineContext};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FlowAbort;
use crate::graph::FlowGraph;
use crate::runner::StageRunner;
use crate::stage::Stage;

/// How a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// `last` produced no routable outcome
    Completed { last: Stage },
    /// `stage` would have been entered once more than allowed
    CeilingExceeded { stage: Stage },
}

/// Path a run took through the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowTrace {
    /// Stages executed, in order
    pub visited: Vec<Stage>,
    /// Escalation tiers that produced a candidate, in order
    pub tiers: Vec<EscalationTier>,
    pub termination: Termination,
}

impl FlowTrace {
    /// Number of times `stage` was executed.
    pub fn visits(&self, stage: Stage) -> usize {
        self.visited.iter().filter(|s| **s == stage).count()
    }
}

/// Executes the pipeline for one context at a time.
#[derive(Clone)]
pub struct FlowEngine {
    graph: FlowGraph,
    runner: StageRunner,
    max_retries: u32,
}

impl FlowEngine {
    /// Uses the runner's configured retry ceiling.
    pub fn new(graph: FlowGraph, runner: StageRunner) -> Self {
        let max_retries = runner.settings().max_retries;
        Self {
            graph,
            runner,
            max_retries,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    /// Drive `ctx` from the entry stage to termination.
    ///
    /// Returns `Err` only for stage faults that outlast the ceiling; a failed
    /// check is an outcome.
    pub async fn run(&self, ctx: &mut PipelineContext) -> Result<FlowTrace, FlowAbort> {
        let news_id = ctx.item().id;
        let ceiling = 1 + self.max_retries;
        let mut entries: BTreeMap<Stage, u32> = BTreeMap::new();
        let mut visited = Vec::new();
        let mut stage = self.graph.entry();

        let termination = loop {
            let count = entries.entry(stage).or_insert(0);
            *count += 1;
            let attempt = *count;
            if attempt > ceiling {
                warn!(
                    news_id,
                    stage = %stage,
                    ceiling,
                    "Stage retry ceiling exceeded, stopping run"
                );
                break Termination::CeilingExceeded { stage };
            }

            emit_stage_entered(news_id, stage.name(), attempt);
            visited.push(stage);

            let outcome = match self.runner.execute(stage, ctx).await {
                Ok(outcome) => outcome,
                Err(fault) if attempt < ceiling => {
                    let error = fault.to_string();
                    warn!(
                        news_id,
                        stage = %stage,
                        attempt,
                        error = %error,
                        "Stage faulted, retrying"
                    );
                    continue;
                }
                Err(fault) => return Err(FlowAbort { visited, fault }),
            };
            emit_stage_completed(news_id, stage.name(), outcome.map(|o| o.name()));

            match outcome.and_then(|o| self.graph.route(stage, o)) {
                Some(next) => stage = next,
                None => break Termination::Completed { last: stage },
            }
        };

        Ok(FlowTrace {
            visited,
            tiers: ctx.tier_trail().to_vec(),
            termination,
        })
    }
}
