//! Static edge table of the repair pipeline.
//!
//! An edge maps `(stage, outcome)` to the next stage. A stage that reports no
//! outcome, or an outcome without an edge, ends the run.

use std::collections::BTreeMap;

use crate::stage::{Outcome, Stage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowGraph {
    entry: Stage,
    edges: BTreeMap<(Stage, Outcome), Stage>,
}

impl FlowGraph {
    /// Graph with no edges.
    pub fn new(entry: Stage) -> Self {
        Self {
            entry,
            edges: BTreeMap::new(),
        }
    }

    /// Add or replace an edge.
    pub fn edge(mut self, from: Stage, outcome: Outcome, to: Stage) -> Self {
        self.edges.insert((from, outcome), to);
        self
    }

    /// Default cascade: delayed snapshot, then HTML metadata, then a human.
    ///
    /// AI generation keeps its own edges but nothing routes into it, so it is
    /// only reachable as an entry point.
    pub fn observed() -> Self {
        use Outcome::*;
        use Stage::*;

        FlowGraph::new(VisualCheck)
            .edge(VisualCheck, CheckPassed, UpdateRecord)
            .edge(VisualCheck, FirstCheckFailed, DelaySnapshot)
            .edge(VisualCheck, DelaySnapshotCheckFailed, HtmlParse)
            .edge(VisualCheck, HtmlParseCheckFailed, HumanFeedback)
            .edge(VisualCheck, AiGenerateCheckFailed, HumanFeedback)
            .edge(DelaySnapshot, NeedCheck, VisualCheck)
            .edge(HtmlParse, NeedCheck, VisualCheck)
            .edge(HtmlParse, HtmlParseCheckFailed, HumanFeedback)
            .edge(AiGenerate, NeedCheck, VisualCheck)
            .edge(AiGenerate, AiGenerateCheckFailed, HumanFeedback)
    }

    /// [`FlowGraph::observed`] with AI generation as the last automated tier.
    pub fn with_ai_fallback() -> Self {
        use Outcome::*;
        use Stage::*;

        Self::observed()
            .edge(VisualCheck, HtmlParseCheckFailed, AiGenerate)
            .edge(HtmlParse, HtmlParseCheckFailed, AiGenerate)
    }

    /// Pick the graph for a configuration.
    pub fn for_ai_fallback(enabled: bool) -> Self {
        if enabled {
            Self::with_ai_fallback()
        } else {
            Self::observed()
        }
    }

    pub fn with_entry(mut self, entry: Stage) -> Self {
        self.entry = entry;
        self
    }

    pub fn entry(&self) -> Stage {
        self.entry
    }

    /// Next stage after `stage` reported `outcome`.
    pub fn route(&self, stage: Stage, outcome: Outcome) -> Option<Stage> {
        self.edges.get(&(stage, outcome)).copied()
    }

    /// All edges in `(from, outcome, to)` form.
    pub fn edges(&self) -> impl Iterator<Item = (Stage, Outcome, Stage)> + '_ {
        self.edges.iter().map(|(&(from, outcome), &to)| (from, outcome, to))
    }
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::observed()
    }
}
