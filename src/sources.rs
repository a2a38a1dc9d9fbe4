use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::extractor::{ExtractionRule, Extractor, LinkPattern, TitleFallback, validate_pattern};
use crate::models::{Category, NewAsset};
use crate::scraper::PageFetcher;
use crate::utils::error::Result;

/// A configured catalog page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDefinition {
    pub name: String,
    pub url: String,
    /// Prefix for relative links found on this source's pages.
    pub origin: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub kind: SourceKind,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    /// Items are linked straight from the page.
    Listing { rule: ExtractionRule },
    /// An index page links to a detail page holding the current free batch;
    /// its remaining article links are news.
    Hub {
        detail_link_pattern: String,
        detail_rule: ExtractionRule,
        index_rule: ExtractionRule,
    },
}

impl SourceDefinition {
    /// Unreal Source dispatch: free Fab batches plus general news.
    pub fn defaults() -> Vec<SourceDefinition> {
        vec![SourceDefinition {
            name: "unrealsource".to_string(),
            url: "https://unrealsource.com/dispatch/".to_string(),
            origin: "https://unrealsource.com".to_string(),
            enabled: true,
            kind: SourceKind::Hub {
                detail_link_pattern: "/d/free-fab-assets".to_string(),
                detail_rule: ExtractionRule {
                    link_pattern: "fab.com/listings".to_string(),
                    exclude_pattern: None,
                    category: Category::Free,
                    price_label: "FREE".to_string(),
                    min_title_len: 3,
                    max_title_len: 70,
                    fallbacks: vec![TitleFallback::ImageAlt],
                    extract_expiry: true,
                },
                index_rule: ExtractionRule {
                    link_pattern: "/d/".to_string(),
                    exclude_pattern: Some("free-fab-assets".to_string()),
                    category: Category::Latest,
                    price_label: "News".to_string(),
                    min_title_len: 5,
                    max_title_len: 80,
                    fallbacks: vec![TitleFallback::ImageAlt, TitleFallback::UrlSlug],
                    extract_expiry: false,
                },
            },
        }]
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        Url::parse(&self.url).map_err(|e| format!("invalid url '{}': {}", self.url, e))?;
        Url::parse(&self.origin).map_err(|e| format!("invalid origin '{}': {}", self.origin, e))?;
        match &self.kind {
            SourceKind::Listing { rule } => rule.validate(),
            SourceKind::Hub {
                detail_link_pattern,
                detail_rule,
                index_rule,
            } => {
                validate_pattern(detail_link_pattern)?;
                detail_rule.validate()?;
                index_rule.validate()
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Compiled {
    Listing(Extractor),
    Hub {
        detail_link: LinkPattern,
        detail: Extractor,
        index: Extractor,
    },
}

/// A source ready to be checked.
#[derive(Debug, Clone)]
pub struct Source {
    definition: SourceDefinition,
    compiled: Compiled,
}

impl Source {
    pub fn new(definition: SourceDefinition) -> Result<Self> {
        let compiled = match &definition.kind {
            SourceKind::Listing { rule } => Compiled::Listing(Extractor::new(rule.clone())?),
            SourceKind::Hub {
                detail_link_pattern,
                detail_rule,
                index_rule,
            } => Compiled::Hub {
                detail_link: LinkPattern::new(detail_link_pattern)?,
                detail: Extractor::new(detail_rule.clone())?,
                index: Extractor::new(index_rule.clone())?,
            },
        };
        Ok(Self {
            definition,
            compiled,
        })
    }

    /// Compile every enabled definition.
    pub fn from_definitions(definitions: &[SourceDefinition]) -> Result<Vec<Source>> {
        definitions
            .iter()
            .filter(|d| d.enabled)
            .cloned()
            .map(Source::new)
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn url(&self) -> &str {
        &self.definition.url
    }

    /// Fetch this source and extract its candidates. Fails only when the
    /// primary page cannot be fetched.
    pub async fn collect(&self, fetcher: &dyn PageFetcher) -> Result<Vec<NewAsset>> {
        let origin = self.definition.origin.as_str();
        let markup = fetcher.fetch(&self.definition.url).await?;
        let mut seen = HashSet::new();

        match &self.compiled {
            Compiled::Listing(extractor) => Ok(extractor.extract_markup(&markup, origin, &mut seen)),
            Compiled::Hub {
                detail_link,
                detail,
                index,
            } => {
                // Html is not Send; keep it out of scope across awaits.
                let detail_url = {
                    let document = Html::parse_document(&markup);
                    detail_link.first_link(&document, origin)
                };

                let mut candidates = Vec::new();
                if let Some(detail_url) = detail_url {
                    match fetcher.fetch(&detail_url).await {
                        Ok(detail_markup) => {
                            let free = detail.extract_markup(&detail_markup, origin, &mut seen);
                            tracing::info!(
                                source = self.name(),
                                url = %detail_url,
                                count = free.len(),
                                "Found assets on detail page"
                            );
                            candidates.extend(free);
                        }
                        Err(e) => {
                            tracing::warn!(source = self.name(), url = %detail_url, "Detail page failed: {}", e);
                        }
                    }
                } else {
                    tracing::debug!(source = self.name(), pattern = detail_link.pattern(), "No detail link on index page");
                }

                let latest = index.extract_markup(&markup, origin, &mut seen);
                tracing::info!(
                    source = self.name(),
                    free = candidates.len(),
                    latest = latest.len(),
                    "Scraped source"
                );
                candidates.extend(latest);
                Ok(candidates)
            }
        }
    }
}
