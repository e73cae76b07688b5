use rust_decimal::Decimal;
use scraper::{ElementRef, Selector};
use std::sync::LazyLock;
use url::Url;

use super::traits::ExtractionStrategy;
use super::{compile_selectors, element_text, first_text, parse_price, parse_split_price, Document, SelectorList};

/// Hosts that are Amazon short links rather than storefronts.
const SHORT_LINK_HOSTS: &[&str] = &["amzn.to", "amzn.in", "amzn.eu", "a.co"];

// Most specific first; India storefront layouts lead the list.
static PRICE_SELECTORS: LazyLock<SelectorList> = LazyLock::new(|| {
    compile_selectors(&[
        // India storefront
        "#corePriceDisplay_desktop_feature_div .a-price .a-offscreen",
        "#corePriceDisplay_desktop_feature_div .a-price-whole",
        ".indiaPriceInfoButton span.a-size-base",
        ".currencyINR",
        "span.a-price-whole",
        "#priceblock_ourprice_row .a-span12 span.a-color-price",
        "#priceblock_dealprice_row .a-span12 span.a-color-price",
        "#apex_desktop_newAccordionRow span.a-price span.a-offscreen",
        "#apex_desktop_newAccordionRow span.a-price .a-price-whole",
        "#aod-price-1 span.a-offscreen",
        "#buybox-container .a-price .a-offscreen",
        // Deals
        ".priceToPay .a-offscreen",
        ".apexPriceToPay .a-offscreen",
        // Regular
        "#priceblock_ourprice",
        "#priceblock_dealprice",
        ".a-price .a-offscreen",
        ".a-size-large.a-color-price",
        "#price_inside_buybox",
        "#newBuyBoxPrice",
        "#tp_price_block_total_price_ww",
        "#priceblock_saleprice",
        "#snsPrice .a-color-price",
        // Mobile
        "#corePrice_feature_div .a-offscreen",
        "#corePrice_desktop .a-offscreen",
        "#kindle-price",
        // Legacy
        ".a-color-price",
        ".offer-price",
        ".sale-price",
        ".a-price-whole",
        "#price",
        ".price",
        "#priceblock_ourprice_row span",
        "#dealprice_shippingmessage span",
        "[data-a-color='price'] span.a-offscreen",
    ])
});

static INDIA_PRICE_AREAS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        ".indiaPriceInfoButton, #corePriceDisplay_desktop_feature_div, #corePrice_feature_div, \
         #apex_desktop, .a-box-group .a-section span.a-color-price",
    )
    .unwrap()
});

static NAME_SELECTORS: LazyLock<SelectorList> = LazyLock::new(|| {
    compile_selectors(&[
        "h1#title span#productTitle",
        "h1.product-title-word-break",
        "#productTitle",
        "#title",
        ".product-title-word-break",
        ".a-size-large.product-title-word-break",
        "[data-feature-name='title']",
        "#item_name",
        "#ebooksProductTitle",
        "h1",
    ])
});

static IMAGE_SELECTORS: LazyLock<SelectorList> = LazyLock::new(|| {
    compile_selectors(&[
        "#landingImage",
        "#imgBlkFront",
        "#ebooksImgBlkFront",
        "#main-image",
        "#imgTagWrapperId img",
        ".a-dynamic-image",
        "#dealCardDynImage",
        ".image",
        "#altImages .imageThumbnail img",
        ".imageSwatches img",
    ])
});

static PRICE_FRACTION: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".a-price-fraction").unwrap());
static ANY_ELEMENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("*").unwrap());

const PRICE_CUES: &[&str] = &["₹", "Rs", "INR", "Price:", "MRP", "price", "Deal of the Day", "Limited time deal"];
const CUE_TEXT_MAX_CHARS: usize = 50;
const CUE_MAX_CHILDREN: usize = 5;

/// Amazon storefronts (every `amazon.*` domain) and Amazon short links.
#[derive(Debug, Default, Clone)]
pub struct AmazonStrategy;

impl AmazonStrategy {
    pub fn new() -> Self {
        Self
    }

    fn is_amazon_host(host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        SHORT_LINK_HOSTS.contains(&host.as_str()) || host.split('.').any(|label| label == "amazon")
    }

    /// Rupee scan inside the known India price blocks.
    fn find_india_price(doc: &Document) -> Option<Decimal> {
        for area in doc.html().select(&INDIA_PRICE_AREAS) {
            for element in std::iter::once(area).chain(area.select(&ANY_ELEMENT)) {
                let text = element_text(element);
                if !text.contains('₹') {
                    continue;
                }
                if let Some(price) = parse_price(&text) {
                    tracing::debug!("Found Amazon India price {} from text '{}'", price, text);
                    return Some(price);
                }
            }
        }
        None
    }

    /// Whole-part elements are combined with their sibling fraction when one exists.
    fn price_from_element(source: &str, element: ElementRef<'_>) -> Option<Decimal> {
        let text = element_text(element);
        if text.is_empty() {
            return None;
        }
        tracing::debug!("Found potential price element with selector {}: '{}'", source, text);

        if source.ends_with("a-price-whole") {
            let fraction = element
                .parent()
                .and_then(ElementRef::wrap)
                .and_then(|parent| parent.select(&PRICE_FRACTION).next())
                .map(element_text);
            if let Some(fraction) = fraction {
                if let Some(price) = parse_split_price(&text, &fraction) {
                    return Some(price);
                }
            }
        }

        parse_price(&text)
    }

    /// Last resort: short elements whose text carries a price cue.
    fn find_cued_price(doc: &Document) -> Option<Decimal> {
        for element in doc.html().select(&ANY_ELEMENT) {
            if element.children().filter_map(ElementRef::wrap).count() > CUE_MAX_CHILDREN {
                continue;
            }
            let text = element_text(element);
            if text.is_empty() || text.chars().count() > CUE_TEXT_MAX_CHARS {
                continue;
            }
            if !PRICE_CUES.iter().any(|cue| text.contains(cue)) {
                continue;
            }
            if let Some(price) = parse_price(&text) {
                tracing::debug!("Found price {} in text: '{}'", price, text);
                return Some(price);
            }
        }
        None
    }

    /// `data-a-dynamic-image` holds `{"url": [width, height], ...}`; the largest image wins.
    fn largest_dynamic_image(json: &str) -> Option<String> {
        let images: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json).ok()?;
        images
            .into_iter()
            .map(|(url, size)| {
                let area = Self::declared_area(&size);
                (url, area)
            })
            .max_by_key(|(_, area)| *area)
            .map(|(url, _)| url)
    }

    // Non-numeric or overflowing sizes count as 0
    fn declared_area(size: &serde_json::Value) -> u64 {
        match size.as_array() {
            Some(dims) if !dims.is_empty() => dims
                .iter()
                .try_fold(1u64, |area, d| area.checked_mul(d.as_u64()?))
                .unwrap_or(0),
            _ => 0,
        }
    }

    fn image_from_element(element: ElementRef<'_>) -> Option<String> {
        let attrs = element.value();

        if let Some(url) = attrs.attr("data-a-dynamic-image").and_then(Self::largest_dynamic_image) {
            return Some(url);
        }

        ["data-old-hires", "data-src", "src"]
            .iter()
            .filter_map(|name| attrs.attr(name))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }
}

impl ExtractionStrategy for AmazonStrategy {
    fn name(&self) -> &str {
        "amazon"
    }

    fn can_handle(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(Self::is_amazon_host))
            .unwrap_or(false)
    }

    fn find_price(&self, doc: &Document) -> Option<Decimal> {
        tracing::debug!("Extracting price using Amazon strategy");

        if doc.host().is_some_and(|h| h.ends_with("amazon.in")) {
            if let Some(price) = Self::find_india_price(doc) {
                return Some(price);
            }
        }

        for (source, selector) in PRICE_SELECTORS.iter() {
            if let Some(price) = doc
                .select_first(selector)
                .and_then(|element| Self::price_from_element(source, element))
            {
                return Some(price);
            }
        }

        Self::find_cued_price(doc)
    }

    fn find_name(&self, doc: &Document) -> Option<String> {
        first_text(doc, &NAME_SELECTORS)
    }

    fn find_image(&self, doc: &Document) -> Option<String> {
        IMAGE_SELECTORS
            .iter()
            .filter_map(|(_, selector)| doc.select_first(selector))
            .find_map(Self::image_from_element)
            .map(|reference| doc.absolute_url(&reference))
    }
}
