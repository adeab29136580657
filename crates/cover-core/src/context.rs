//! Per-item pipeline state.
//!
//! A [`PipelineContext`] lives for exactly one pipeline run over one news
//! item and is dropped afterwards. The retry-stage marker is not stored: it
//! is read off the tier that produced the current candidate, so the two can
//! never disagree.

use cover_capture::Verdict;
use cover_state::NewsItem;
use serde::{Deserialize, Serialize};

/// Recovery strategy that produced a candidate, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTier {
    DelaySnapshot,
    HtmlParse,
    AiGenerate,
}

impl EscalationTier {
    pub fn name(self) -> &'static str {
        match self {
            EscalationTier::DelaySnapshot => "delay_snapshot",
            EscalationTier::HtmlParse => "html_parse",
            EscalationTier::AiGenerate => "ai_generate",
        }
    }
}

impl std::fmt::Display for EscalationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which tier the current candidate came from, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStage {
    /// No escalation yet; the stored image is what gets judged
    Unescalated,
    DelaySnapshot,
    HtmlParse,
    AiGenerate,
}

impl From<Option<EscalationTier>> for RetryStage {
    fn from(tier: Option<EscalationTier>) -> Self {
        match tier {
            None => RetryStage::Unescalated,
            Some(EscalationTier::DelaySnapshot) => RetryStage::DelaySnapshot,
            Some(EscalationTier::HtmlParse) => RetryStage::HtmlParse,
            Some(EscalationTier::AiGenerate) => RetryStage::AiGenerate,
        }
    }
}

/// Image bytes awaiting a verdict, tagged with their provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub bytes: Vec<u8>,
    pub tier: EscalationTier,
}

/// Mutable scratchpad for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    item: NewsItem,
    candidate: Option<Candidate>,
    verdict: Option<Verdict>,
    html: Option<String>,
    trail: Vec<EscalationTier>,
}

impl PipelineContext {
    pub fn new(item: NewsItem) -> Self {
        Self {
            item,
            candidate: None,
            verdict: None,
            html: None,
            trail: Vec::new(),
        }
    }

    pub fn item(&self) -> &NewsItem {
        &self.item
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        self.candidate.as_ref()
    }

    pub fn retry_stage(&self) -> RetryStage {
        self.candidate.as_ref().map(|c| c.tier).into()
    }

    /// Replace the in-flight candidate.
    pub fn propose(&mut self, tier: EscalationTier, bytes: Vec<u8>) {
        self.trail.push(tier);
        self.candidate = Some(Candidate { bytes, tier });
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    pub fn record_verdict(&mut self, verdict: Verdict) {
        self.verdict = Some(verdict);
    }

    /// Markup cached by an earlier capture.
    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn cache_html(&mut self, html: impl Into<String>) {
        self.html = Some(html.into());
    }

    /// Tiers that produced a candidate, in order.
    pub fn tier_trail(&self) -> &[EscalationTier] {
        &self.trail
    }
}
