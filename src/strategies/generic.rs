use rust_decimal::Decimal;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;

use super::traits::ExtractionStrategy;
use super::{compile_selectors, element_text, first_price, first_text, own_text, parse_price, Document, SelectorList};

static ITEMPROP_PRICE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("[itemprop=price]").unwrap());

static PRICE_SELECTORS: LazyLock<SelectorList> = LazyLock::new(|| {
    compile_selectors(&[
        "#price",
        ".price",
        "[data-price]",
        ".product-price",
        ".current-price",
        ".price-current",
        "span.price",
        "div.price",
        "span[itemprop=price]",
        "[class*=price]:not(del):not(s)",
        ".regular-price",
        ".offer-price",
        ".sale-price",
        ".our-price",
        ".special-price",
    ])
});

static NAME_SELECTORS: LazyLock<SelectorList> = LazyLock::new(|| {
    compile_selectors(&[
        "h1",
        "#title",
        ".product-title",
        ".product-name",
        ".title",
        "h1[itemprop=name]",
        "[itemprop=name]",
        ".page-title",
        ".heading",
    ])
});

static IMAGE_SELECTORS: LazyLock<SelectorList> = LazyLock::new(|| {
    compile_selectors(&[
        "#main-image",
        ".main-image",
        ".product-image",
        ".primary-image",
        "[itemprop=image]",
        "img.product",
        ".product-img",
        ".hero-image",
        ".gallery-image",
        ".featured-image",
    ])
});

static ANY_ELEMENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body *").unwrap());
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];
const LARGE_IMAGE_PX: u32 = 200;

/// Fallback for any retailer without a dedicated strategy.
#[derive(Debug, Default, Clone)]
pub struct GenericStrategy;

impl GenericStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Microdata price, preferring the machine-readable `content` attribute.
    fn find_itemprop_price(doc: &Document) -> Option<Decimal> {
        let element = doc.select_first(&ITEMPROP_PRICE)?;
        element
            .value()
            .attr("content")
            .and_then(parse_price)
            .or_else(|| parse_price(&element_text(element)))
    }

    /// Elements whose own text puts a currency symbol next to a number.
    fn find_currency_text(doc: &Document) -> Option<Decimal> {
        doc.html()
            .select(&ANY_ELEMENT)
            .map(own_text)
            .filter(|text| text.contains(CURRENCY_SYMBOLS) && text.chars().any(|c| c.is_ascii_digit()))
            .find_map(|text| parse_price(&text))
    }

    fn image_source(element: ElementRef<'_>) -> Option<String> {
        let img = if element.value().name() == "img" {
            Some(element)
        } else {
            element.select(&IMG).next()
        };

        let from_img = img.and_then(|img| {
            ["src", "data-src"]
                .iter()
                .filter_map(|name| img.value().attr(name))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(str::to_string)
        });

        // <meta itemprop="image" content="..."> and <link itemprop="image" href="...">
        from_img.or_else(|| {
            ["content", "href"]
                .iter()
                .filter_map(|name| element.value().attr(name))
                .map(str::trim)
                .find(|v| !v.is_empty())
                .map(str::to_string)
        })
    }

    fn declared_size(img: ElementRef<'_>, attr: &str) -> u32 {
        img.value()
            .attr(attr)
            .and_then(|v| v.trim().trim_end_matches("px").parse().ok())
            .unwrap_or(0)
    }

    fn non_empty_src(img: ElementRef<'_>) -> Option<&str> {
        img.value().attr("src").map(str::trim).filter(|s| !s.is_empty())
    }

    fn find_large_image(doc: &Document) -> Option<String> {
        doc.html()
            .select(&IMG)
            .filter(|img| {
                Self::declared_size(*img, "width") > LARGE_IMAGE_PX || Self::declared_size(*img, "height") > LARGE_IMAGE_PX
            })
            .find_map(Self::non_empty_src)
            .map(str::to_string)
    }

    fn find_meaningful_image(doc: &Document) -> Option<String> {
        doc.html()
            .select(&IMG)
            .filter_map(Self::non_empty_src)
            .find(|src| {
                let lower = src.to_lowercase();
                !lower.ends_with(".gif") && !lower.contains("icon") && !lower.contains("logo")
            })
            .map(str::to_string)
    }
}

impl ExtractionStrategy for GenericStrategy {
    fn name(&self) -> &str {
        "generic"
    }

    fn can_handle(&self, _url: &str) -> bool {
        true
    }

    fn find_price(&self, doc: &Document) -> Option<Decimal> {
        Self::find_itemprop_price(doc)
            .or_else(|| first_price(doc, &PRICE_SELECTORS))
            .or_else(|| Self::find_currency_text(doc))
            .or_else(|| {
                tracing::debug!("No price element found in {}", doc.url());
                None
            })
    }

    fn find_name(&self, doc: &Document) -> Option<String> {
        first_text(doc, &NAME_SELECTORS)
            .or_else(|| doc.meta_property("og:title"))
            .or_else(|| doc.title())
    }

    fn find_image(&self, doc: &Document) -> Option<String> {
        IMAGE_SELECTORS
            .iter()
            .filter_map(|(_, selector)| doc.select_first(selector))
            .find_map(Self::image_source)
            .or_else(|| doc.meta_property("og:image"))
            .or_else(|| Self::find_large_image(doc))
            .or_else(|| Self::find_meaningful_image(doc))
            .map(|reference| doc.absolute_url(&reference))
    }
}
