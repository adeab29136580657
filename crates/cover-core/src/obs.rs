//! Structured lifecycle events for repair batches.
//!
//! Every event carries an `event` field (`batch.started`, `item.finished`,
//! ...) so log pipelines can filter on it. Per-item work runs inside
//! [`item_span`], which tags everything below it with `news_id`.

use cover_state::NewsId;
use tracing::{info, warn};

/// Span covering one pipeline run.
///
/// ```ignore
/// run_pipeline(ctx).instrument(item_span(42)).await;
/// // every event inside carries news_id = 42
/// ```
pub fn item_span(news_id: NewsId) -> tracing::Span {
    tracing::info_span!("cover.item", news_id = news_id)
}

/// Batch pulled its pending items; `limit` caps how many will run.
pub fn emit_batch_started(run_id: &str, pending: usize, limit: Option<usize>) {
    info!(event = "batch.started", run_id = %run_id, pending = pending, limit = ?limit);
}

/// One item entered the pipeline.
pub fn emit_item_started(run_id: &str, news_id: NewsId, url: &str) {
    info!(event = "item.started", run_id = %run_id, news_id = news_id, url = %url);
}

/// Stage about to run; `visit` counts entries of this stage within the item's run.
pub fn emit_stage_entered(news_id: NewsId, stage: &str, visit: u32) {
    info!(event = "stage.entered", news_id = news_id, stage = %stage, visit = visit);
}

/// `outcome` is `None` when the stage ended the run.
pub fn emit_stage_completed(news_id: NewsId, stage: &str, outcome: Option<&str>) {
    info!(
        event = "stage.completed",
        news_id = news_id,
        stage = %stage,
        outcome = outcome.unwrap_or("none"),
    );
}

/// Item reached a final outcome, including aborts.
pub fn emit_item_finished(run_id: &str, news_id: NewsId, outcome: &str, duration_ms: u64) {
    info!(
        event = "item.finished",
        run_id = %run_id,
        news_id = news_id,
        outcome = %outcome,
        duration_ms = duration_ms,
    );
}

/// Fault that aborted one item (warning level; the batch goes on).
pub fn emit_item_aborted(run_id: &str, news_id: NewsId, error: &dyn std::fmt::Display) {
    warn!(event = "item.aborted", run_id = %run_id, news_id = news_id, error = %error);
}

/// Batch summary.
///
/// ```ignore
/// emit_batch_finished(&run_id, 12, 9, 2, 1, 48_210);
/// ```
pub fn emit_batch_finished(
    run_id: &str,
    total: usize,
    passed: usize,
    escalated: usize,
    failed: usize,
    duration_ms: u64,
) {
    info!(
        event = "batch.finished",
        run_id = %run_id,
        total = total,
        passed = passed,
        escalated = escalated,
        failed = failed,
        duration_ms = duration_ms,
    );
}
