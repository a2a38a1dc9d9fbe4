use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

use crate::models::{Asset, Category};

/// Everything the monitor remembers between runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppData {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub seen_assets: HashMap<String, Asset>,
    /// `None` until the first cycle completes. Written as the zero time.
    #[serde(
        default,
        serialize_with = "none_as_zero_time",
        deserialize_with = "zero_time_as_none"
    )]
    pub last_check: Option<DateTime<Utc>>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, Asset>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

// "Never" is stored as the zero time, matching files written by earlier builds.
const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

fn zero_time_as_none<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<DateTime<Utc>> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|t| t.year() > 1))
}

fn none_as_zero_time<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(t) => t.serialize(serializer),
        None => serializer.serialize_str(ZERO_TIME),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetQuery {
    pub category: Option<Category>,
    pub search: Option<String>,
}

impl AppData {
    pub fn contains(&self, url: &str) -> bool {
        self.seen_assets.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.seen_assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_assets.is_empty()
    }

    pub fn count(&self, category: Category) -> usize {
        self.seen_assets
            .values()
            .filter(|a| a.category == category)
            .count()
    }

    /// Assets of one category, most recently first seen first.
    pub fn sorted(&self, category: Category) -> Vec<Asset> {
        self.query(&AssetQuery {
            category: Some(category),
            search: None,
        })
    }

    pub fn query(&self, query: &AssetQuery) -> Vec<Asset> {
        let term = query.search.as_deref().unwrap_or("");
        let mut assets: Vec<Asset> = self
            .seen_assets
            .values()
            .filter(|a| query.category.is_none_or(|c| a.category == c))
            .filter(|a| a.matches(term))
            .cloned()
            .collect();
        assets.sort_by(|a, b| {
            b.first_seen
                .cmp(&a.first_seen)
                .then_with(|| a.url.cmp(&b.url))
        });
        assets
    }

    pub fn clear(&mut self) {
        self.seen_assets.clear();
    }

    /// One-line status, e.g. "3 free • 12 latest • Last check: Jan 2, 15:04".
    pub fn status_summary(&self) -> String {
        let check_time = match self.last_check {
            Some(t) => t.format("%b %-d, %H:%M").to_string(),
            None => "Never".to_string(),
        };
        format!(
            "{} free • {} latest • Last check: {}",
            self.count(Category::Free),
            self.count(Category::Latest),
            check_time
        )
    }
}
