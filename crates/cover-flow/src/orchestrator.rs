//! Batch runs over pending news items.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use cover_core::obs::{
    emit_batch_finished, emit_batch_started, emit_item_aborted, emit_item_finished,
    emit_item_started, item_span,
};
use cover_core::{EscalationTier, PipelineContext};
use cover_state::{object_key_for_url, NewsId, NewsItem, NewsRepository, StorageResult};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::engine::{FlowEngine, FlowTrace, Termination};
use crate::stage::Stage;

/// Final state of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Check result written as passed; `uploaded` names the new object
    Passed { uploaded: Option<String> },
    /// Check result written as failed
    Rejected,
    /// Handed to a person; nothing written
    Escalated { reason: String },
    /// A stage hit the retry ceiling; nothing written
    CeilingExceeded { stage: Stage },
    /// A stage faulted; nothing written
    Aborted { stage: Stage, error: String },
    /// Run ended on a stage with no onward edge
    Unresolved { last_stage: Stage },
}

impl ItemOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            ItemOutcome::Passed { .. } => "passed",
            ItemOutcome::Rejected => "rejected",
            ItemOutcome::Escalated { .. } => "escalated",
            ItemOutcome::CeilingExceeded { .. } => "ceiling_exceeded",
            ItemOutcome::Aborted { .. } => "aborted",
            ItemOutcome::Unresolved { .. } => "unresolved",
        }
    }

    /// Whether this item ended in a fault rather than a decision.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ItemOutcome::CeilingExceeded { .. } | ItemOutcome::Aborted { .. }
        )
    }
}

/// Report line for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
    pub news_id: NewsId,
    pub url: String,
    pub outcome: ItemOutcome,
    /// Stages executed, up to and including a fault that aborted the run
    pub visited: Vec<Stage>,
    pub tiers: Vec<EscalationTier>,
    pub duration_ms: u64,
}

/// Result of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub items: Vec<ItemReport>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn passed_count(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Passed { .. }))
    }

    pub fn rejected_count(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Rejected))
    }

    pub fn escalated_count(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Escalated { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(ItemOutcome::is_failure)
    }

    pub fn unresolved_count(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Unresolved { .. }))
    }

    /// Outcome of one item, if it was part of this batch.
    pub fn outcome(&self, news_id: NewsId) -> Option<&ItemOutcome> {
        self.items
            .iter()
            .find(|i| i.news_id == news_id)
            .map(|i| &i.outcome)
    }

    /// Write `<dir>/<run_id>/report.json` with a digest sidecar.
    pub fn write_json(&self, dir: &Path) -> cover_core::Result<PathBuf> {
        cover_core::write_json_artifact(dir, &self.run_id, "report", self)
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

/// One batch over the pending items of a repository.
pub struct RepairRun {
    engine: FlowEngine,
    repository: Arc<dyn NewsRepository>,
    limit: Option<usize>,
}

impl RepairRun {
    pub fn new(engine: FlowEngine, repository: Arc<dyn NewsRepository>) -> Self {
        Self {
            engine,
            repository,
            limit: None,
        }
    }

    /// Process at most `limit` items, newest first.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Pull pending items and run each through a fresh context, one at a time.
    ///
    /// Only the initial listing can fail the batch; per-item faults are
    /// recorded in the report.
    pub async fn execute(&self) -> StorageResult<RunReport> {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();

        let mut pending = self.repository.list_unchecked().await?;
        emit_batch_started(&run_id, pending.len(), self.limit);
        if let Some(limit) = self.limit {
            pending.truncate(limit);
        }

        if pending.is_empty() {
            info!(run_id = %run_id, "No images to check.");
        }

        let mut items = Vec::with_capacity(pending.len());
        for item in pending {
            let news_id = item.id;
            let report = self
                .process(&run_id, item)
                .instrument(item_span(news_id))
                .await;
            items.push(report);
        }

        let report = RunReport {
            run_id,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            items,
        };
        emit_batch_finished(
            &report.run_id,
            report.total(),
            report.passed_count(),
            report.escalated_count(),
            report.failed_count(),
            report.duration_ms,
        );
        Ok(report)
    }

    async fn process(&self, run_id: &str, item: NewsItem) -> ItemReport {
        let start = Instant::now();
        let news_id = item.id;
        let url = item.url.clone();
        emit_item_started(run_id, news_id, &url);

        let mut ctx = PipelineContext::new(item);
        let (outcome, visited, tiers) = match self.engine.run(&mut ctx).await {
            Ok(trace) => {
                let outcome = classify(&trace, &ctx);
                (outcome, trace.visited, trace.tiers)
            }
            Err(abort) => {
                emit_item_aborted(run_id, news_id, &abort.fault);
                let outcome = ItemOutcome::Aborted {
                    stage: abort.fault.stage(),
                    error: abort.fault.to_string(),
                };
                (outcome, abort.visited, ctx.tier_trail().to_vec())
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        emit_item_finished(run_id, news_id, outcome.name(), duration_ms);
        ItemReport {
            news_id,
            url,
            outcome,
            visited,
            tiers,
            duration_ms,
        }
    }
}

fn classify(trace: &FlowTrace, ctx: &PipelineContext) -> ItemOutcome {
    match trace.termination {
        Termination::CeilingExceeded { stage } => ItemOutcome::CeilingExceeded { stage },
        Termination::Completed {
            last: Stage::UpdateRecord,
        } => match ctx.verdict() {
            Some(verdict) if verdict.sufficient => ItemOutcome::Passed {
                uploaded: ctx
                    .candidate()
                    .and_then(|_| object_key_for_url(&ctx.item().url).ok()),
            },
            _ => ItemOutcome::Rejected,
        },
        Termination::Completed {
            last: Stage::HumanFeedback,
        } => ItemOutcome::Escalated {
            reason: ctx
                .verdict()
                .map(|v| v.reason.clone())
                .unwrap_or_default(),
        },
        Termination::Completed { last } => ItemOutcome::Unresolved { last_stage: last },
    }
}
