use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

use crate::models::{Category, NewAsset, truncate_with_ellipsis};
use crate::utils::error::{AppError, Result};

static IMAGE_ALT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[alt]").expect("static selector is valid"));

// "until June 5, 2025", "before Dec 1 2025"
static EXPIRY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:until|before).*?(\w+\s+\d+,?\s*20\d{2})").expect("static regex is valid")
});

const RELATIVE_TIME_MARKERS: [&str; 5] = ["ago", "month", "year", "week", "day"];

/// Where to look for a title when the link text is unusable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TitleFallback {
    /// `alt` of an image inside the link.
    ImageAlt,
    /// Last path segment of the URL, de-slugified.
    UrlSlug,
}

/// Per-source extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionRule {
    /// Substring the link's href must contain.
    pub link_pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_pattern: Option<String>,
    pub category: Category,
    pub price_label: String,
    #[serde(default = "default_min_title_len")]
    pub min_title_len: usize,
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
    #[serde(default)]
    pub fallbacks: Vec<TitleFallback>,
    #[serde(default)]
    pub extract_expiry: bool,
}

fn default_min_title_len() -> usize {
    3
}

fn default_max_title_len() -> usize {
    80
}

impl ExtractionRule {
    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_pattern(&self.link_pattern)?;
        if self.min_title_len == 0 {
            return Err("min_title_len must be greater than 0".to_string());
        }
        if self.max_title_len <= 3 || self.max_title_len < self.min_title_len {
            return Err("max_title_len must exceed 3 and min_title_len".to_string());
        }
        Ok(())
    }
}

pub(crate) fn validate_pattern(pattern: &str) -> std::result::Result<(), String> {
    if pattern.trim().is_empty() {
        return Err("link pattern must not be empty".to_string());
    }
    if pattern.contains(['\'', '"', '\\']) {
        return Err(format!("link pattern contains quotes: {}", pattern));
    }
    Ok(())
}

/// Anchors whose href contains a fixed substring.
#[derive(Debug, Clone)]
pub struct LinkPattern {
    pattern: String,
    selector: Selector,
}

impl LinkPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        validate_pattern(pattern).map_err(|message| AppError::Parse { message })?;
        let css = format!("a[href*='{}']", pattern);
        let selector = Selector::parse(&css).map_err(|e| AppError::Parse {
            message: format!("Invalid link pattern '{}': {:?}", pattern, e),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            selector,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Matching anchors with their raw href, in document order.
    pub fn links<'a>(&'a self, document: &'a Html) -> impl Iterator<Item = (ElementRef<'a>, &'a str)> + 'a {
        document
            .select(&self.selector)
            .filter_map(|el| el.value().attr("href").map(|href| (el, href)))
    }

    /// First matching link, made absolute.
    pub fn first_link(&self, document: &Html, origin: &str) -> Option<String> {
        self.links(document)
            .map(|(_, href)| normalize_url(href, origin))
            .find(|url| !url.is_empty())
    }
}

/// Turns a parsed page into candidate assets according to one rule.
#[derive(Debug, Clone)]
pub struct Extractor {
    rule: ExtractionRule,
    links: LinkPattern,
}

impl Extractor {
    pub fn new(rule: ExtractionRule) -> Result<Self> {
        rule.validate().map_err(|message| AppError::Parse { message })?;
        let links = LinkPattern::new(&rule.link_pattern)?;
        Ok(Self { rule, links })
    }

    pub fn rule(&self) -> &ExtractionRule {
        &self.rule
    }

    /// Lazily yield candidates from `document`. URLs already in `seen` are
    /// skipped and every emitted URL is added to it.
    pub fn extract<'a>(
        &'a self,
        document: &'a Html,
        origin: &'a str,
        seen: &'a mut HashSet<String>,
    ) -> impl Iterator<Item = NewAsset> + 'a {
        let expires_at = if self.rule.extract_expiry {
            extract_expiry(document)
        } else {
            None
        };

        self.links.links(document).filter_map(move |(link, href)| {
            if let Some(exclude) = &self.rule.exclude_pattern {
                if href.contains(exclude.as_str()) {
                    return None;
                }
            }

            let url = normalize_url(href, origin);
            if url.is_empty() || seen.contains(&url) {
                return None;
            }

            let title = self.derive_title(link, &url)?;

            seen.insert(url.clone());
            Some(NewAsset {
                title,
                url,
                price: self.rule.price_label.clone(),
                category: self.rule.category,
                expires_at: expires_at.clone(),
            })
        })
    }

    /// Parse `markup` and collect every candidate.
    pub fn extract_markup(&self, markup: &str, origin: &str, seen: &mut HashSet<String>) -> Vec<NewAsset> {
        let document = Html::parse_document(markup);
        self.extract(&document, origin, seen).collect()
    }

    fn derive_title(&self, link: ElementRef<'_>, url: &str) -> Option<String> {
        let slug_fallback = self.rule.fallbacks.contains(&TitleFallback::UrlSlug);
        let usable = |candidate: &str| {
            candidate.chars().count() >= self.rule.min_title_len
                && !(slug_fallback && looks_like_relative_time(candidate))
        };

        let text = element_text(link);
        let mut title = usable(text.as_str()).then_some(text);

        for fallback in &self.rule.fallbacks {
            if title.is_some() {
                break;
            }
            title = match fallback {
                TitleFallback::ImageAlt => link
                    .select(&IMAGE_ALT)
                    .filter_map(|img| img.value().attr("alt"))
                    .map(|alt| alt.trim().to_string())
                    .find(|alt| usable(alt.as_str())),
                TitleFallback::UrlSlug => Some(title_from_url(url)),
            };
        }

        let title = title?;
        if title.is_empty() || title.chars().count() < self.rule.min_title_len {
            return None;
        }
        Some(truncate_with_ellipsis(&title, self.rule.max_title_len))
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// "3 days ago", "last week", ... Also matches words like "Today"; that
/// imprecision is accepted.
pub fn looks_like_relative_time(text: &str) -> bool {
    RELATIVE_TIME_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Absolute hrefs pass through; anything else is prefixed with `origin`.
pub fn normalize_url(href: &str, origin: &str) -> String {
    let href = href.trim();
    if href.is_empty() {
        return String::new();
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    let origin = origin.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{}{}", origin, href)
    } else {
        format!("{}/{}", origin, href)
    }
}

/// "https://x.com/d/cool-free-pack/" -> "Cool Free Pack"
pub fn title_from_url(url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(str::to_string))
        })
        .unwrap_or_default();

    segment
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// "Free until <date>" from the first until/before phrase on the page.
pub fn extract_expiry(document: &Html) -> Option<String> {
    let page_text: String = document.root_element().text().collect();
    expiry_from_text(&page_text)
}

pub fn expiry_from_text(text: &str) -> Option<String> {
    EXPIRY_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| format!("Free until {}", m.as_str()))
}
