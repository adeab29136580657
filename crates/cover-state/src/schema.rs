//! Row shapes for the `news` table
//!
//! Only the columns the repair pipeline reads or writes are modelled; any
//! other column in a fetched row is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Primary key of a news row
pub type NewsId = i64;

/// One news record that may need its cover image verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: NewsId,
    /// Article URL the cover was captured from
    pub url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    /// Object key of the stored cover, if any
    #[serde(default)]
    pub image: Option<String>,
    /// `null` until a check result has been written
    #[serde(default)]
    pub image_checked: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    /// Create an unchecked item (mostly useful for tests and tooling).
    pub fn new(id: NewsId, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            title: title.into(),
            content: String::new(),
            image: None,
            image_checked: None,
            created_at: None,
        }
    }

    /// Set the article body.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the stored cover object key.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the creation timestamp used for newest-first ordering.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Prior check outcome of this row.
    pub fn check_state(&self) -> CheckState {
        match self.image_checked {
            None => CheckState::Pending,
            Some(false) => CheckState::Rejected,
            Some(true) => CheckState::Passed,
        }
    }
}

/// Ternary view over the nullable `image_checked` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// Never checked, or checked without a resolution. Picked up by every run.
    Pending,
    Rejected,
    Passed,
}

/// Terminal write for one news row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResultUpdate {
    pub image_checked: bool,
    /// New cover object key; omitted when the stored cover is kept
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CheckResultUpdate {
    pub fn passed(image: Option<String>) -> Self {
        Self {
            image_checked: true,
            image,
        }
    }

    pub fn rejected() -> Self {
        Self {
            image_checked: false,
            image: None,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
