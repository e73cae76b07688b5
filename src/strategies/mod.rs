pub mod amazon;
pub mod generic;
pub mod price_parser;
pub mod registry;
pub mod traits;

pub use amazon::AmazonStrategy;
pub use generic::GenericStrategy;
pub use price_parser::{normalize_mojibake, parse_price, parse_split_price, MAX_PRICE_TEXT_LENGTH};
pub use registry::StrategyRegistry;
pub use traits::{BlockedSignals, ExtractionStrategy};

use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Everything a strategy managed to pull out of one page.
///
/// `ExtractionResult::empty()` means total extraction failure and is not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<Decimal>,
}

impl ExtractionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.image_url.is_none() && self.price.is_none()
    }
}

/// A parsed page together with the URL it was served from.
pub struct Document {
    url: String,
    base: Option<Url>,
    html: Html,
}

impl Document {
    pub fn parse(url: &str, body: &str) -> Self {
        Self {
            url: url.to_string(),
            base: Url::parse(url).ok(),
            html: Html::parse_document(body),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> Option<&str> {
        self.base.as_ref().and_then(|u| u.host_str())
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }

    pub fn title(&self) -> Option<String> {
        self.select_first(&TITLE)
            .map(element_text)
            .filter(|t| !t.is_empty())
    }

    /// Content of `<meta property="...">`, e.g. `og:title`.
    pub fn meta_property(&self, property: &str) -> Option<String> {
        self.html
            .select(&META_PROPERTY)
            .find(|el| el.value().attr("property") == Some(property))
            .and_then(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
    }

    /// Resolve an attribute reference (`/img/a.jpg`, `//cdn/x.jpg`) against the page URL.
    pub fn absolute_url(&self, reference: &str) -> String {
        match &self.base {
            Some(base) => base
                .join(reference)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| reference.to_string()),
            None => reference.to_string(),
        }
    }
}

static TITLE: std::sync::LazyLock<Selector> = std::sync::LazyLock::new(|| Selector::parse("title").unwrap());
static META_PROPERTY: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse("meta[property]").unwrap());

/// Ordered selectors paired with their source text for logging.
pub type SelectorList = Vec<(&'static str, Selector)>;

/// Compile a cascade, dropping anything the selector engine rejects.
pub fn compile_selectors(selectors: &[&'static str]) -> SelectorList {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some((*s, selector)),
            Err(e) => {
                tracing::warn!("Ignoring invalid selector '{}': {:?}", s, e);
                None
            }
        })
        .collect()
}

/// Element text with whitespace runs collapsed to single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Text of the element's direct text children only.
pub fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First selector whose first match carries non-empty text.
pub fn first_text(doc: &Document, selectors: &SelectorList) -> Option<String> {
    for (source, selector) in selectors {
        if let Some(element) = doc.select_first(selector) {
            let text = element_text(element);
            if !text.is_empty() {
                tracing::debug!("Found text with selector {}: '{}'", source, text);
                return Some(text);
            }
        }
    }
    None
}

/// First selector whose first match parses as a price.
pub fn first_price(doc: &Document, selectors: &SelectorList) -> Option<Decimal> {
    for (source, selector) in selectors {
        let Some(element) = doc.select_first(selector) else {
            continue;
        };
        let text = element_text(element);
        if text.is_empty() {
            continue;
        }
        tracing::debug!("Found potential price element with selector {}: '{}'", source, text);
        if let Some(price) = parse_price(&text) {
            return Some(price);
        }
    }
    None
}
