use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Category, category_or_latest};

/// Longest title shown in a list row.
pub const DISPLAY_TITLE_LIMIT: usize = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub title: String,
    /// Identity key for deduplication.
    pub url: String,
    #[serde(default)]
    pub price: String,
    #[serde(default = "default_category", deserialize_with = "category_or_latest")]
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Set once, when the URL is first recorded.
    #[serde(default = "Utc::now")]
    pub first_seen: DateTime<Utc>,
}

fn default_category() -> Category {
    Category::Latest
}

/// A candidate produced by an extractor, before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub title: String,
    pub url: String,
    pub price: String,
    pub category: Category,
    pub expires_at: Option<String>,
}

impl Asset {
    pub fn new(new_asset: NewAsset, first_seen: DateTime<Utc>) -> Self {
        Self {
            title: new_asset.title,
            url: new_asset.url,
            price: new_asset.price,
            category: new_asset.category,
            expires_at: new_asset.expires_at,
            first_seen,
        }
    }

    pub fn is_free(&self) -> bool {
        self.category == Category::Free
    }

    /// Title capped for list rows.
    pub fn display_title(&self) -> String {
        truncate_with_ellipsis(&self.title, DISPLAY_TITLE_LIMIT)
    }

    /// Secondary line shown under the title.
    pub fn info_line(&self) -> String {
        match self.category {
            Category::Free => match &self.expires_at {
                Some(expires) if !expires.is_empty() => format!("⏰ {}", expires),
                _ => "🎁 FREE - Claim now!".to_string(),
            },
            Category::Latest => format!(
                "💰 {} • Found: {}",
                self.price,
                self.first_seen.format("%b %-d")
            ),
        }
    }

    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        term.is_empty()
            || self.title.to_lowercase().contains(&term)
            || self.url.to_lowercase().contains(&term)
    }
}

/// Cut `text` to at most `max` characters, ending in "..." when shortened.
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
