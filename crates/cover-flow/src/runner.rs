//! Stage execution.
//!
//! [`StageRunner`] owns the capabilities every stage may call and runs one
//! stage against a [`PipelineContext`], returning the outcome that routes
//! the run onward (`None` for terminal stages).

use std::sync::Arc;

use cover_capture::{
    HtmlCoverParser, ImageGenerator, ImageSource, PageFetcher, ScreenshotCapture, Verdict,
    VisualJudge,
};
use cover_core::{EscalationTier, PipelineContext, PipelineSettings, RetryStage};
use cover_state::{
    object_key_for_url, CheckResultUpdate, NewsRepository, ObjectStore, PNG_CONTENT_TYPE,
};
use tracing::{debug, info, warn};

use crate::error::{Result, StageFault};
use crate::stage::{Outcome, Stage};

/// Reason recorded when there is nothing to judge.
pub const NO_IMAGE_REASON: &str = "no image on record";

/// Capabilities and settings shared by every stage.
#[derive(Clone)]
pub struct StageRunner {
    screenshot: Arc<dyn ScreenshotCapture>,
    fetcher: Arc<dyn PageFetcher>,
    html_parser: HtmlCoverParser,
    judge: Arc<dyn VisualJudge>,
    generator: Option<Arc<dyn ImageGenerator>>,
    repository: Arc<dyn NewsRepository>,
    store: Arc<dyn ObjectStore>,
    settings: PipelineSettings,
}

impl StageRunner {
    pub fn new(
        screenshot: Arc<dyn ScreenshotCapture>,
        fetcher: Arc<dyn PageFetcher>,
        judge: Arc<dyn VisualJudge>,
        repository: Arc<dyn NewsRepository>,
        store: Arc<dyn ObjectStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            screenshot,
            html_parser: HtmlCoverParser::new(fetcher.clone()),
            fetcher,
            judge,
            generator: None,
            repository,
            store,
            settings,
        }
    }

    /// Enable the AI generation stage.
    pub fn with_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run one stage.
    pub async fn execute(&self, stage: Stage, ctx: &mut PipelineContext) -> Result<Option<Outcome>> {
        match stage {
            Stage::VisualCheck => Ok(Some(self.visual_check(ctx).await)),
            Stage::DelaySnapshot => self.delay_snapshot(ctx).await.map(Some),
            Stage::HtmlParse => Ok(Some(self.html_parse(ctx).await)),
            Stage::AiGenerate => self.ai_generate(ctx).await.map(Some),
            Stage::HumanFeedback => {
                self.human_feedback(ctx);
                Ok(None)
            }
            Stage::UpdateRecord => self.update_record(ctx).await.map(|()| None),
        }
    }

    async fn visual_check(&self, ctx: &mut PipelineContext) -> Outcome {
        let source = match ctx.candidate() {
            Some(candidate) => Some(ImageSource::Bytes(candidate.bytes.clone())),
            None => ctx
                .item()
                .image
                .as_deref()
                .map(str::trim)
                .filter(|image| !image.is_empty())
                .map(|image| ImageSource::Url(self.settings.stored_image_url(image))),
        };

        let verdict = match source {
            Some(source) => self.judge.judge(source).await,
            None => Verdict::insufficient(NO_IMAGE_REASON),
        };

        let outcome = if verdict.sufficient {
            Outcome::CheckPassed
        } else {
            match ctx.retry_stage() {
                RetryStage::Unescalated => Outcome::FirstCheckFailed,
                RetryStage::DelaySnapshot => Outcome::DelaySnapshotCheckFailed,
                RetryStage::HtmlParse => Outcome::HtmlParseCheckFailed,
                RetryStage::AiGenerate => Outcome::AiGenerateCheckFailed,
            }
        };

        info!(
            sufficient = verdict.sufficient,
            reason = %verdict.reason,
            outcome = %outcome,
            "Visual check"
        );
        ctx.record_verdict(verdict);
        outcome
    }

    async fn delay_snapshot(&self, ctx: &mut PipelineContext) -> Result<Outcome> {
        let url = ctx.item().url.clone();
        let snapshot = self
            .screenshot
            .capture(&url, Some(self.settings.settle_delay))
            .await
            .map_err(|e| StageFault::capture(Stage::DelaySnapshot, e))?;
        let bytes = snapshot
            .decode_screenshot()
            .map_err(|e| StageFault::capture(Stage::DelaySnapshot, e))?;

        if !snapshot.content.is_empty() {
            ctx.cache_html(snapshot.content);
        }
        ctx.propose(EscalationTier::DelaySnapshot, bytes);
        Ok(Outcome::NeedCheck)
    }

    async fn html_parse(&self, ctx: &mut PipelineContext) -> Outcome {
        let url = ctx.item().url.clone();
        let html = match ctx.html() {
            Some(html) => html.to_string(),
            None => match self.fetcher.fetch_html(&url).await {
                Ok(html) => {
                    ctx.cache_html(html.clone());
                    html
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Page fetch failed, no HTML candidate");
                    return Outcome::HtmlParseCheckFailed;
                }
            },
        };

        match self.html_parser.parse_cover_image(&html, &url).await {
            Some(bytes) => {
                debug!(bytes = bytes.len(), "HTML candidate found");
                ctx.propose(EscalationTier::HtmlParse, bytes);
                Outcome::NeedCheck
            }
            None => {
                info!("No cover image in page metadata");
                Outcome::HtmlParseCheckFailed
            }
        }
    }

    async fn ai_generate(&self, ctx: &mut PipelineContext) -> Result<Outcome> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            StageFault::capture(
                Stage::AiGenerate,
                cover_capture::CaptureError::NotConfigured("image generator".to_string()),
            )
        })?;

        let item = ctx.item();
        let generated = generator
            .generate(&item.title, &item.content)
            .await
            .map_err(|e| StageFault::capture(Stage::AiGenerate, e))?;

        match generated {
            Some(bytes) => {
                ctx.propose(EscalationTier::AiGenerate, bytes);
                Ok(Outcome::NeedCheck)
            }
            None => {
                info!("Image generation returned nothing");
                Ok(Outcome::AiGenerateCheckFailed)
            }
        }
    }

    fn human_feedback(&self, ctx: &PipelineContext) {
        let item = ctx.item();
        warn!(
            news_id = item.id,
            title = %item.title,
            reason = ctx.verdict().map(|v| v.reason.as_str()).unwrap_or(""),
            "Cover needs manual review"
        );
    }

    async fn update_record(&self, ctx: &PipelineContext) -> Result<()> {
        let item = ctx.item();
        let verdict = ctx
            .verdict()
            .ok_or(StageFault::MissingVerdict { news_id: item.id })?;

        let update = match (verdict.sufficient, ctx.candidate()) {
            (true, Some(candidate)) => {
                let key = object_key_for_url(&item.url)
                    .map_err(|e| StageFault::storage(Stage::UpdateRecord, e))?;
                self.store
                    .put(&key, &candidate.bytes, PNG_CONTENT_TYPE)
                    .await
                    .map_err(|e| StageFault::storage(Stage::UpdateRecord, e))?;
                info!(key = %key, tier = %candidate.tier, "Uploaded cover");
                CheckResultUpdate::passed(Some(key))
            }
            (true, None) => CheckResultUpdate::passed(None),
            (false, _) => CheckResultUpdate::rejected(),
        };

        self.repository
            .mark_check_result(item.id, update)
            .await
            .map_err(|e| StageFault::storage(Stage::UpdateRecord, e))?;
        info!(news_id = item.id, passed = verdict.sufficient, "Check result recorded");
        Ok(())
    }
}
