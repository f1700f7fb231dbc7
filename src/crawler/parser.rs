//! HTML parsing for feed fragments and engagement records
//!
//! This module handles:
//! - Selecting the content fragments (one per feed item) out of a rendered page
//! - Reading link and text data a fragment's identity is derived from
//! - Mapping one fragment to one [`Record`]

use crate::crawler::ExtractError;
use crate::record::{Record, MISSING};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::borrow::Cow;
use std::fmt::Write;
use url::Url;

/// Any hyperlink; the first one in a fragment carries its content id
const LINK_SELECTOR: &str = "a[href]";

/// Description container holding the hashtag links
const DESCRIPTION_SELECTOR: &str = "div[data-e2e='video-desc']";

/// Hashtag links inside the description
const HASHTAG_SELECTOR: &str = "a[data-e2e='search-common-link']";

/// Engagement buttons carry their kind in `aria-label`
const BUTTON_SELECTOR: &str = "button[aria-label]";

/// Count shown inside an engagement button
const COUNT_SELECTOR: &str = "strong";

fn compile(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector(format!("'{}': {}", css, e)))
}

/// One rendered feed item
#[derive(Debug, Clone, Copy)]
pub struct Fragment<'a> {
    element: ElementRef<'a>,
    source: &'a FragmentSelector,
}

impl<'a> Fragment<'a> {
    pub fn element(&self) -> ElementRef<'a> {
        self.element
    }

    /// URL of the page the fragment was rendered on
    pub fn page_url(&self) -> &'a Url {
        &self.source.page
    }

    /// `href` of the first hyperlink inside the fragment
    pub fn first_href(&self) -> Option<&'a str> {
        self.element
            .select(&self.source.links)
            .next()
            .and_then(|a| a.value().attr("href"))
    }

    /// Every hyperlink target inside the fragment, in document order
    pub fn hrefs(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.element
            .select(&self.source.links)
            .filter_map(|a| a.value().attr("href"))
    }

    /// Content id taken from the first hyperlink
    pub fn link_segment(&self) -> Option<String> {
        self.first_href()
            .and_then(|href| trailing_segment(href, self.page_url()))
    }

    /// Whitespace-normalized text outside any `button`
    ///
    /// Engagement counts live inside buttons and change while the item is on
    /// screen, so they are left out.
    pub fn stable_text(&self) -> String {
        let root = (*self.element).id();
        let parts = (*self.element).descendants().filter_map(|node| {
            let text = node.value().as_text()?;
            let in_button = node
                .ancestors()
                .take_while(|ancestor| ancestor.id() != root)
                .any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|element| element.name() == "button")
                });
            (!in_button).then_some(&**text)
        });
        collapse_whitespace(parts)
    }

    /// Tag name and attributes of the fragment root, e.g. `div class="item"`
    pub fn tag_signature(&self) -> String {
        let element = self.element.value();
        let mut out = element.name().to_string();
        for (name, value) in element.attrs() {
            let _ = write!(out, " {}={:?}", name, value);
        }
        out
    }
}

/// Compiled selector that finds fragments in a page rendered from a feed URL
#[derive(Debug, Clone)]
pub struct FragmentSelector {
    css: String,
    selector: Selector,
    links: Selector,
    page: Url,
}

impl FragmentSelector {
    /// Compiles `css` for pages rendered from `page_url`
    ///
    /// Relative links inside fragments are resolved against `page_url`.
    pub fn new(css: &str, page_url: &str) -> Result<Self, ConfigError> {
        let page = Url::parse(page_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", page_url, e)))?;
        Ok(Self {
            css: css.to_string(),
            selector: compile(css)?,
            links: compile(LINK_SELECTOR)?,
            page,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.css
    }

    /// Returns every fragment in document order
    pub fn select<'a>(&'a self, document: &'a Html) -> Vec<Fragment<'a>> {
        document
            .select(&self.selector)
            .map(|element| Fragment {
                element,
                source: self,
            })
            .collect()
    }

    /// Counts fragments in raw markup
    pub fn count_in(&self, markup: &str) -> usize {
        let document = Html::parse_document(markup);
        document.select(&self.selector).count()
    }
}

/// Maps one fragment to one record
///
/// Implementations must be pure: the same fragment always yields the same
/// result and nothing outside the return value changes.
pub trait RecordExtractor: Send + Sync {
    fn extract(&self, fragment: &Fragment<'_>) -> Result<Record, ExtractError>;
}

/// Extracts hashtags and like/comment/share counts from a feed video item
///
/// # Extraction Rules
///
/// - Hashtags: trailing path segment of every
///   `a[data-e2e='search-common-link']` inside the first
///   `div[data-e2e='video-desc']`
/// - Counts: text of the `strong` inside each `button[aria-label]`; the label
///   (lowercased) is matched against `like`, then `comment`, then `share`
/// - Anything absent becomes `"N/A"` (counts) or an empty list (hashtags)
///
/// A hashtag link without an `href` is malformed and fails the fragment.
///
/// # Example
///
/// ```
/// use feed_harvester::crawler::{EngagementExtractor, FragmentSelector, RecordExtractor};
/// use scraper::Html;
///
/// let html = r#"<div class="item">
///   <div data-e2e="video-desc"><a data-e2e="search-common-link" href="/tag/cats">#cats</a></div>
///   <button aria-label="Like video"><strong>12K</strong></button>
/// </div>"#;
/// let document = Html::parse_document(html);
/// let selector = FragmentSelector::new("div.item", "https://feed.example/foryou").unwrap();
/// let fragments = selector.select(&document);
/// let record = EngagementExtractor::new().unwrap().extract(&fragments[0]).unwrap();
/// assert_eq!(record.hashtags(), ["cats".to_string()]);
/// assert_eq!(record.likes(), "12K");
/// assert_eq!(record.shares(), "N/A");
/// ```
#[derive(Debug, Clone)]
pub struct EngagementExtractor {
    description: Selector,
    hashtags: Selector,
    buttons: Selector,
    count: Selector,
}

impl EngagementExtractor {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self {
            description: compile(DESCRIPTION_SELECTOR)?,
            hashtags: compile(HASHTAG_SELECTOR)?,
            buttons: compile(BUTTON_SELECTOR)?,
            count: compile(COUNT_SELECTOR)?,
        })
    }

    /// Extracts hashtag names from the description links
    fn extract_hashtags(&self, fragment: &Fragment<'_>) -> Result<Vec<String>, ExtractError> {
        let Some(description) = fragment.element().select(&self.description).next() else {
            return Ok(Vec::new());
        };

        let mut hashtags = Vec::new();
        for link in description.select(&self.hashtags) {
            let href = link
                .value()
                .attr("href")
                .ok_or_else(|| ExtractError::MissingAttribute {
                    element: HASHTAG_SELECTOR.to_string(),
                    attribute: "href".to_string(),
                })?;

            if let Some(tag) = trailing_segment(href, fragment.page_url()) {
                hashtags.push(tag);
            }
        }

        Ok(hashtags)
    }

    /// Trimmed text of the first `strong` inside a button
    fn count_text(&self, button: ElementRef<'_>) -> Option<String> {
        button
            .select(&self.count)
            .next()
            .map(|strong| strong.text().collect::<String>().trim().to_string())
    }
}

impl RecordExtractor for EngagementExtractor {
    fn extract(&self, fragment: &Fragment<'_>) -> Result<Record, ExtractError> {
        let hashtags = self.extract_hashtags(fragment)?;

        let mut likes = MISSING.to_string();
        let mut comments = MISSING.to_string();
        let mut shares = MISSING.to_string();

        for button in fragment.element().select(&self.buttons) {
            let label = button
                .value()
                .attr("aria-label")
                .unwrap_or_default()
                .to_lowercase();
            let count = self
                .count_text(button)
                .unwrap_or_else(|| MISSING.to_string());

            if label.contains("like") {
                likes = count;
            } else if label.contains("comment") {
                comments = count;
            } else if label.contains("share") {
                shares = count;
            }
        }

        Ok(Record::new(hashtags, likes, comments, shares))
    }
}

/// Returns the last non-empty path segment of a link, percent-decoded
///
/// The link is resolved against `base` first. Query strings, URL fragments
/// and a trailing `/` are ignored: `/@user/video/7301?lang=en` and
/// `https://host/@user/video/7301/` both yield `7301`. Links that only point
/// back at the page (empty, `?...`, `#...`) and links without a path
/// (`mailto:`) yield nothing.
pub fn trailing_segment(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('?') || href.starts_with('#') {
        return None;
    }

    let resolved = base.join(href).ok()?;
    let segment = resolved.path_segments()?.rfind(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(segment)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| segment.to_string());
    Some(decoded)
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for word in parts.flat_map(str::split_whitespace) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
