//! Integration tests for the repair pipeline with in-memory fakes.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use cover_capture::fakes::{FakeFetcher, FakeImageGenerator, FakeJudge, FakeScreenshot};
use cover_capture::{ImageSource, Verdict};
use cover_core::{EscalationTier, PipelineContext, PipelineSettings};
use cover_flow::{
    FlowEngine, FlowGraph, ItemOutcome, Outcome, RepairRun, RunReport, Stage, StageRunner,
    Termination,
};
use cover_state::fakes::{MemoryNewsRepository, MemoryObjectStore};
use cover_state::{CheckResultUpdate, NewsItem};

const ARTICLE_URL: &str = "https://www.example.com/news/launch";
const ARTICLE_KEY: &str = "example-com-news-launch.png";

const PAGE_WITH_COVER: &str = r#"<html><head>
    <meta property="og:image" content="https://cdn.example.com/cover.png">
    </head><body></body></html>"#;

const PAGE_WITHOUT_COVER: &str = "<html><head><title>Launch</title></head><body></body></html>";

struct Harness {
    repo: Arc<MemoryNewsRepository>,
    store: Arc<MemoryObjectStore>,
    screenshot: Arc<FakeScreenshot>,
    fetcher: Arc<FakeFetcher>,
    judge: Arc<FakeJudge>,
    generator: Arc<FakeImageGenerator>,
}

impl Harness {
    fn new(items: Vec<NewsItem>, screenshot: FakeScreenshot, judge: FakeJudge) -> Self {
        Self {
            repo: Arc::new(MemoryNewsRepository::with_items(items)),
            store: Arc::new(MemoryObjectStore::new()),
            screenshot: Arc::new(screenshot),
            fetcher: Arc::new(
                FakeFetcher::new().with_image("https://cdn.example.com/cover.png", b"og-cover"),
            ),
            judge: Arc::new(judge),
            generator: Arc::new(FakeImageGenerator::new()),
        }
    }

    fn with_store(mut self, store: MemoryObjectStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    fn with_generator(mut self, generator: FakeImageGenerator) -> Self {
        self.generator = Arc::new(generator);
        self
    }

    fn runner(&self) -> StageRunner {
        StageRunner::new(
            self.screenshot.clone(),
            self.fetcher.clone(),
            self.judge.clone(),
            self.repo.clone(),
            self.store.clone(),
            PipelineSettings::default(),
        )
        .with_generator(self.generator.clone())
    }

    fn engine(&self, graph: FlowGraph) -> FlowEngine {
        FlowEngine::new(graph, self.runner())
    }

    async fn run(&self, graph: FlowGraph) -> RunReport {
        RepairRun::new(self.engine(graph), self.repo.clone())
            .execute()
            .await
            .expect("listing failed")
    }
}

fn article(id: i64, image: Option<&str>) -> NewsItem {
    let item = NewsItem::new(id, ARTICLE_URL, "Launch day")
        .with_content("We shipped.")
        .with_created_at(Utc.with_ymd_and_hms(2024, 11, 1, 8, 0, id as u32).unwrap());
    match image {
        Some(image) => item.with_image(image),
        None => item,
    }
}

/// The stored image is fine.
#[tokio::test]
async fn test_sufficient_stored_image_passes_without_upload() {
    let h = Harness::new(
        vec![article(1, Some("stored.png"))],
        FakeScreenshot::new(),
        FakeJudge::new().then_pass(),
    );

    let report = h.run(FlowGraph::observed()).await;

    assert_eq!(report.outcome(1), Some(&ItemOutcome::Passed { uploaded: None }));
    assert_eq!(report.items[0].visited, vec![Stage::VisualCheck, Stage::UpdateRecord]);
    assert_eq!(h.store.put_count(), 0);
    assert!(h.screenshot.calls().is_empty());
    assert_eq!(
        h.judge.seen(),
        vec![ImageSource::Url("https://r2.koala-oss.app/stored.png".to_string())]
    );

    let row = h.repo.item(1).unwrap();
    assert_eq!(row.image_checked, Some(true));
    assert_eq!(row.image.as_deref(), Some("stored.png"));
}

/// The delayed snapshot fixes it.
#[tokio::test]
async fn test_delayed_snapshot_candidate_is_uploaded() {
    let h = Harness::new(
        vec![article(1, Some("stored.png"))],
        FakeScreenshot::new().then_ok(b"settled-png", PAGE_WITH_COVER),
        FakeJudge::new().then_reject("half loaded").then_pass(),
    );

    let report = h.run(FlowGraph::observed()).await;

    assert_eq!(
        report.outcome(1),
        Some(&ItemOutcome::Passed {
            uploaded: Some(ARTICLE_KEY.to_string())
        })
    );
    assert_eq!(
        report.items[0].visited,
        vec![
            Stage::VisualCheck,
            Stage::DelaySnapshot,
            Stage::VisualCheck,
            Stage::UpdateRecord
        ]
    );
    assert_eq!(report.items[0].tiers, vec![EscalationTier::DelaySnapshot]);

    assert_eq!(h.store.put_count(), 1);
    assert_eq!(h.store.get(ARTICLE_KEY), Some(b"settled-png".to_vec()));
    assert_eq!(h.store.content_type(ARTICLE_KEY).as_deref(), Some("image/png"));
    assert_eq!(
        h.judge.seen()[1],
        ImageSource::Bytes(b"settled-png".to_vec())
    );

    let row = h.repo.item(1).unwrap();
    assert_eq!(row.image_checked, Some(true));
    assert_eq!(row.image.as_deref(), Some(ARTICLE_KEY));
}

/// Every tier fails and a person takes over.
#[tokio::test]
async fn test_exhausted_cascade_escalates_without_writing() {
    let h = Harness::new(
        vec![article(1, Some("stored.png"))],
        FakeScreenshot::new().then_ok(b"settled-png", PAGE_WITH_COVER),
        FakeJudge::new()
            .then_reject("blank")
            .then_reject("spinner")
            .then_reject("logo only"),
    );

    let report = h.run(FlowGraph::observed()).await;

    assert_eq!(
        report.outcome(1),
        Some(&ItemOutcome::Escalated {
            reason: "logo only".to_string()
        })
    );
    assert_eq!(
        report.items[0].visited,
        vec![
            Stage::VisualCheck,
            Stage::DelaySnapshot,
            Stage::VisualCheck,
            Stage::HtmlParse,
            Stage::VisualCheck,
            Stage::HumanFeedback,
        ]
    );
    assert_eq!(
        report.items[0].tiers,
        vec![EscalationTier::DelaySnapshot, EscalationTier::HtmlParse]
    );
    assert_eq!(h.judge.seen()[2], ImageSource::Bytes(b"og-cover".to_vec()));
    assert!(h.generator.requests().is_empty());

    assert_eq!(h.store.put_count(), 0);
    assert!(h.repo.writes().is_empty());
    assert_eq!(h.repo.item(1).unwrap().image_checked, None);
}

/// Every tier fails with AI generation wired in as the last tier.
#[tokio::test]
async fn test_ai_fallback_runs_all_three_tiers() {
    let h = Harness::new(
        vec![article(1, Some("stored.png"))],
        FakeScreenshot::new().then_ok(b"settled-png", PAGE_WITH_COVER),
        FakeJudge::new()
            .then_reject("blank")
            .then_reject("spinner")
            .then_reject("logo only")
            .then_reject("abstract noise"),
    )
    .with_generator(FakeImageGenerator::new().then_image(b"generated"));

    let report = h.run(FlowGraph::with_ai_fallback()).await;

    assert_eq!(
        report.outcome(1),
        Some(&ItemOutcome::Escalated {
            reason: "abstract noise".to_string()
        })
    );
    assert_eq!(
        report.items[0].tiers,
        vec![
            EscalationTier::DelaySnapshot,
            EscalationTier::HtmlParse,
            EscalationTier::AiGenerate
        ]
    );
    assert_eq!(h.judge.call_count(), 4);
    assert_eq!(
        h.generator.requests(),
        vec![("Launch day".to_string(), "We shipped.".to_string())]
    );
    assert!(h.repo.writes().is_empty());
}

#[tokio::test]
async fn test_ai_fallback_candidate_can_pass() {
    let h = Harness::new(
        vec![article(1, None)],
        FakeScreenshot::new().then_ok(b"settled-png", PAGE_WITHOUT_COVER),
        FakeJudge::new().then_reject("spinner").then_pass(),
    )
    .with_generator(FakeImageGenerator::new().then_image(b"generated"));

    let report = h.run(FlowGraph::with_ai_fallback()).await;

    assert_eq!(
        report.items[0].visited,
        vec![
            Stage::VisualCheck,
            Stage::DelaySnapshot,
            Stage::VisualCheck,
            Stage::HtmlParse,
            Stage::AiGenerate,
            Stage::VisualCheck,
            Stage::UpdateRecord,
        ]
    );
    assert_eq!(h.store.get(ARTICLE_KEY), Some(b"generated".to_vec()));
    assert_eq!(h.repo.item(1).unwrap().image_checked, Some(true));
}

/// No metadata means no second check for the HTML tier.
#[tokio::test]
async fn test_html_parse_without_candidate_skips_recheck() {
    let h = Harness::new(
        vec![article(1, Some("stored.png"))],
        FakeScreenshot::new().then_ok(b"settled-png", PAGE_WITHOUT_COVER),
        FakeJudge::new().then_reject("blank").then_reject("spinner"),
    );

    let report = h.run(FlowGraph::observed()).await;

    assert_eq!(
        report.items[0].visited,
        vec![
            Stage::VisualCheck,
            Stage::DelaySnapshot,
            Stage::VisualCheck,
            Stage::HtmlParse,
            Stage::HumanFeedback,
        ]
    );
    assert_eq!(h.judge.call_count(), 2);
    assert_eq!(report.items[0].tiers, vec![EscalationTier::DelaySnapshot]);
    assert!(h.repo.writes().is_empty());
}

/// A screenshot fault that outlasts every attempt aborts only its own item.
#[tokio::test]
async fn test_screenshot_fault_aborts_single_item() {
    let screenshot = (0..4).fold(FakeScreenshot::new(), |s, _| s.then_fail("browser crashed"));
    let h = Harness::new(
        vec![article(1, Some("ok.png")), article(2, Some("broken.png"))],
        screenshot,
        FakeJudge::new().then_reject("blank").then_pass(),
    );

    let report = h.run(FlowGraph::observed()).await;

    // Default ceiling: one attempt plus three retries.
    assert_eq!(h.screenshot.calls().len(), 4);
    assert_eq!(
        report.items[0].visited,
        vec![
            Stage::VisualCheck,
            Stage::DelaySnapshot,
            Stage::DelaySnapshot,
            Stage::DelaySnapshot,
            Stage::DelaySnapshot
        ]
    );

    // Newest first: item 2 is processed before item 1.
    assert_eq!(report.items[0].news_id, 2);
    assert!(matches!(
        report.outcome(2),
        Some(ItemOutcome::Aborted {
            stage: Stage::DelaySnapshot,
            error
        }) if error.contains("browser crashed")
    ));
    assert_eq!(report.outcome(1), Some(&ItemOutcome::Passed { uploaded: None }));
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.passed_count(), 1);

    assert_eq!(h.repo.writes(), vec![(1, CheckResultUpdate::passed(None))]);
    assert_eq!(h.repo.item(2).unwrap().image_checked, None);
    assert_eq!(h.store.put_count(), 0);
}

#[tokio::test]
async fn test_upload_failure_writes_no_record() {
    let h = Harness::new(
        vec![article(1, None)],
        FakeScreenshot::new().then_ok(b"settled-png", PAGE_WITH_COVER),
        FakeJudge::new().then_reject("blank").then_pass(),
    )
    .with_store(MemoryObjectStore::failing());

    let report = h.run(FlowGraph::observed()).await;

    assert!(matches!(
        report.outcome(1),
        Some(ItemOutcome::Aborted {
            stage: Stage::UpdateRecord,
            ..
        })
    ));
    // Every attempt re-uploads; none of them writes the record.
    assert_eq!(h.store.put_count(), 4);
    assert_eq!(report.items[0].visited.last(), Some(&Stage::UpdateRecord));
    assert!(h.repo.writes().is_empty());
}

#[tokio::test]
async fn test_transient_screenshot_fault_is_retried() {
    let h = Harness::new(
        vec![article(1, Some("stored.png"))],
        FakeScreenshot::new()
            .then_fail("transient 502")
            .then_ok(b"settled-png", PAGE_WITH_COVER),
        FakeJudge::new().then_reject("half loaded").then_pass(),
    );

    let report = h.run(FlowGraph::observed()).await;

    assert_eq!(
        report.outcome(1),
        Some(&ItemOutcome::Passed {
            uploaded: Some(ARTICLE_KEY.to_string())
        })
    );
    assert_eq!(h.screenshot.calls().len(), 2);
    assert_eq!(
        report.items[0].visited,
        vec![
            Stage::VisualCheck,
            Stage::DelaySnapshot,
            Stage::DelaySnapshot,
            Stage::VisualCheck,
            Stage::UpdateRecord
        ]
    );
    assert_eq!(report.items[0].tiers, vec![EscalationTier::DelaySnapshot]);
    assert_eq!(h.store.put_count(), 1);
    assert_eq!(h.repo.item(1).unwrap().image_checked, Some(true));
}

#[tokio::test]
async fn test_persistent_fault_stops_at_ceiling() {
    let screenshot = (0..5).fold(FakeScreenshot::new(), |s, _| s.then_fail("browser crashed"));
    let h = Harness::new(
        vec![article(1, Some("stored.png"))],
        screenshot,
        FakeJudge::new().then_reject("blank"),
    );
    let engine = h.engine(FlowGraph::observed()).with_max_retries(2);

    let mut ctx = PipelineContext::new(article(1, Some("stored.png")));
    let abort = engine.run(&mut ctx).await.unwrap_err();

    assert_eq!(h.screenshot.calls().len(), 3);
    assert_eq!(abort.fault.stage(), Stage::DelaySnapshot);
    assert!(abort.to_string().contains("browser crashed"));
    assert_eq!(
        abort.visited,
        vec![
            Stage::VisualCheck,
            Stage::DelaySnapshot,
            Stage::DelaySnapshot,
            Stage::DelaySnapshot
        ]
    );
    assert!(ctx.candidate().is_none());
    assert!(h.repo.writes().is_empty());
    assert_eq!(h.store.put_count(), 0);
}

#[tokio::test]
async fn test_retry_ceiling_fails_closed() {
    let h = Harness::new(
        vec![article(1, Some("stored.png"))],
        FakeScreenshot::new().then_ok(b"settled-png", PAGE_WITH_COVER),
        FakeJudge::new(),
    );
    let engine = h.engine(FlowGraph::observed()).with_max_retries(0);

    let mut ctx = PipelineContext::new(article(1, Some("stored.png")));
    let trace = engine.run(&mut ctx).await.unwrap();

    assert_eq!(
        trace.termination,
        Termination::CeilingExceeded {
            stage: Stage::VisualCheck
        }
    );
    assert_eq!(trace.visited, vec![Stage::VisualCheck, Stage::DelaySnapshot]);
    assert!(h.repo.writes().is_empty());
    assert_eq!(h.store.put_count(), 0);
}

#[tokio::test]
async fn test_cycle_is_bounded_per_stage() {
    let screenshot = (0..10).fold(FakeScreenshot::new(), |s, _| {
        s.then_ok(b"settled-png", PAGE_WITHOUT_COVER)
    });
    let h = Harness::new(vec![article(1, None)], screenshot, FakeJudge::new());

    // Every failed check goes back to another delayed snapshot.
    let looping = FlowGraph::new(Stage::VisualCheck)
        .edge(Stage::VisualCheck, Outcome::FirstCheckFailed, Stage::DelaySnapshot)
        .edge(
            Stage::VisualCheck,
            Outcome::DelaySnapshotCheckFailed,
            Stage::DelaySnapshot,
        )
        .edge(Stage::DelaySnapshot, Outcome::NeedCheck, Stage::VisualCheck);

    let mut ctx = PipelineContext::new(article(1, None));
    let trace = h.engine(looping).run(&mut ctx).await.unwrap();

    assert_eq!(
        trace.termination,
        Termination::CeilingExceeded {
            stage: Stage::VisualCheck
        }
    );
    assert_eq!(trace.visits(Stage::VisualCheck), 4);
    assert_eq!(trace.visits(Stage::DelaySnapshot), 4);
    assert_eq!(h.screenshot.calls().len(), 4);
}

#[tokio::test]
async fn test_ai_generate_as_entry_point() {
    let h = Harness::new(
        vec![article(1, None)],
        FakeScreenshot::new(),
        FakeJudge::new().then_pass(),
    )
    .with_generator(FakeImageGenerator::new().then_image(b"generated"));

    let report = h
        .run(FlowGraph::observed().with_entry(Stage::AiGenerate))
        .await;

    assert_eq!(
        report.items[0].visited,
        vec![Stage::AiGenerate, Stage::VisualCheck, Stage::UpdateRecord]
    );
    assert_eq!(
        report.outcome(1),
        Some(&ItemOutcome::Passed {
            uploaded: Some(ARTICLE_KEY.to_string())
        })
    );
}

#[tokio::test]
async fn test_update_record_is_idempotent() {
    let h = Harness::new(vec![article(1, None)], FakeScreenshot::new(), FakeJudge::new());
    let runner = h.runner();

    let mut ctx = PipelineContext::new(article(1, None));
    ctx.propose(EscalationTier::HtmlParse, b"og-cover".to_vec());
    ctx.record_verdict(Verdict::sufficient("clear cover"));

    runner.execute(Stage::UpdateRecord, &mut ctx).await.unwrap();
    let first = h.repo.item(1).unwrap();
    runner.execute(Stage::UpdateRecord, &mut ctx).await.unwrap();
    let second = h.repo.item(1).unwrap();

    assert_eq!(first, second);
    assert_eq!(second.image.as_deref(), Some(ARTICLE_KEY));
    assert_eq!(h.store.keys(), vec![ARTICLE_KEY.to_string()]);
    let writes = h.repo.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0], writes[1]);
}

#[tokio::test]
async fn test_missing_stored_image_starts_cascade() {
    let h = Harness::new(
        vec![article(1, None)],
        FakeScreenshot::new().then_ok(b"settled-png", PAGE_WITHOUT_COVER),
        FakeJudge::new().then_pass(),
    );

    let report = h.run(FlowGraph::observed()).await;

    // The first check never reaches the judge.
    assert_eq!(h.judge.call_count(), 1);
    assert_eq!(
        h.judge.seen(),
        vec![ImageSource::Bytes(b"settled-png".to_vec())]
    );
    assert_eq!(
        report.outcome(1),
        Some(&ItemOutcome::Passed {
            uploaded: Some(ARTICLE_KEY.to_string())
        })
    );
}

#[tokio::test]
async fn test_limit_and_checked_items() {
    let checked = NewsItem {
        image_checked: Some(true),
        ..article(9, Some("done.png"))
    };
    let h = Harness::new(
        vec![article(1, Some("a.png")), article(2, Some("b.png")), checked],
        FakeScreenshot::new(),
        FakeJudge::new().then_pass(),
    );

    let report = RepairRun::new(h.engine(FlowGraph::observed()), h.repo.clone())
        .with_limit(Some(1))
        .execute()
        .await
        .unwrap();

    assert_eq!(report.total(), 1);
    assert_eq!(report.items[0].news_id, 2);
    assert_eq!(h.repo.writes(), vec![(2, CheckResultUpdate::passed(None))]);
}

#[tokio::test]
async fn test_empty_batch() {
    let h = Harness::new(Vec::new(), FakeScreenshot::new(), FakeJudge::new());
    let report = h.run(FlowGraph::observed()).await;

    assert_eq!(report.total(), 0);
    assert_eq!(report.failed_count(), 0);
    assert!(!report.run_id.is_empty());
}

#[tokio::test]
async fn test_report_artifact_round_trip() {
    let h = Harness::new(
        vec![article(1, Some("stored.png")), article(2, Some("other.png"))],
        FakeScreenshot::new().then_fail("timeout"),
        FakeJudge::new().then_reject("blank").then_pass(),
    );
    let report = h.run(FlowGraph::observed()).await;

    let dir = tempfile::tempdir().unwrap();
    let path = report.write_json(dir.path()).unwrap();
    assert_eq!(path, dir.path().join(&report.run_id).join("report.json"));

    let back: RunReport =
        cover_core::read_json_artifact(dir.path(), &report.run_id, "report").unwrap();
    assert_eq!(back, report);

    let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(json["items"][0]["outcome"]["status"], "aborted");
    assert_eq!(json["items"][1]["outcome"]["status"], "passed");
}
