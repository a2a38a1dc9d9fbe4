use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub mod app_data;
pub mod asset;

// Re-exports for convenience
pub use app_data::*;
pub use asset::*;

/// Which list an asset belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Time-limited giveaway.
    Free,
    /// General news or announcement.
    Latest,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Free => "free",
            Category::Latest => "latest",
        }
    }

    pub fn all() -> [Category; 2] {
        [Category::Free, Category::Latest]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Category::Free),
            "latest" => Ok(Category::Latest),
            other => Err(format!("Unknown category: {}", other)),
        }
    }
}

/// Older state files carry no category, or an empty string. Anything that is
/// not explicitly "free" lands in the latest list.
pub(crate) fn category_or_latest<'de, D>(deserializer: D) -> Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|s| s.parse().ok())
        .unwrap_or(Category::Latest))
}
