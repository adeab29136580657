//! Pipeline stages and the outcomes they report.

use serde::{Deserialize, Serialize};

/// One step of the repair pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Judge the current candidate, or the stored image when there is none
    VisualCheck,

    /// Re-capture the page after a settle delay
    DelaySnapshot,

    /// Look for a cover in the page's metadata
    HtmlParse,

    /// Synthesize a cover from title and content
    AiGenerate,

    /// Hand the item to a person (terminal)
    HumanFeedback,

    /// Persist the accepted state (terminal)
    UpdateRecord,
}

impl Stage {
    /// Every stage, in cascade order.
    pub const ALL: [Stage; 6] = [
        Stage::VisualCheck,
        Stage::DelaySnapshot,
        Stage::HtmlParse,
        Stage::AiGenerate,
        Stage::HumanFeedback,
        Stage::UpdateRecord,
    ];

    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::VisualCheck => "visual_check",
            Stage::DelaySnapshot => "delay_snapshot",
            Stage::HtmlParse => "html_parse",
            Stage::AiGenerate => "ai_generate",
            Stage::HumanFeedback => "human_feedback",
            Stage::UpdateRecord => "update_record",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Named result of a stage, used to pick the next one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    NeedCheck,
    CheckPassed,
    FirstCheckFailed,
    DelaySnapshotCheckFailed,
    HtmlParseCheckFailed,
    AiGenerateCheckFailed,
}

impl Outcome {
    pub fn name(&self) -> &'static str {
        match self {
            Outcome::NeedCheck => "need_check",
            Outcome::CheckPassed => "check_passed",
            Outcome::FirstCheckFailed => "first_check_failed",
            Outcome::DelaySnapshotCheckFailed => "delay_snapshot_check_failed",
            Outcome::HtmlParseCheckFailed => "html_parse_check_failed",
            Outcome::AiGenerateCheckFailed => "ai_generate_check_failed",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
