use rust_decimal::Decimal;
use scraper::Selector;
use std::sync::LazyLock;

use super::{element_text, Document, ExtractionResult};

static CAPTCHA_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img[src*=captcha], form[action*=validateCaptcha]").unwrap());
static PROMPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h4, p").unwrap());
static VERIFICATION_FORM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form[action*=verify]").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

const TITLE_PHRASES: &[&str] = &["robot check", "captcha", "enter the characters"];
const PROMPT_PHRASES: &[&str] = &["enter the characters", "type the characters", "not a robot"];

/// Which verification-page signals a document carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockedSignals {
    pub title: bool,
    pub image: bool,
    pub prompt: bool,
    pub form: bool,
}

impl BlockedSignals {
    pub fn detect(doc: &Document) -> Self {
        let html = doc.html();
        let contains_any = |text: String, phrases: &[&str]| {
            let lower = text.to_lowercase();
            phrases.iter().any(|p| lower.contains(p))
        };

        Self {
            title: html
                .select(&TITLE)
                .any(|el| contains_any(element_text(el), TITLE_PHRASES)),
            image: html.select(&CAPTCHA_IMAGE).next().is_some(),
            prompt: html
                .select(&PROMPT)
                .any(|el| contains_any(element_text(el), PROMPT_PHRASES)),
            form: html.select(&VERIFICATION_FORM).next().is_some(),
        }
    }

    pub fn any(&self) -> bool {
        self.title || self.image || self.prompt || self.form
    }
}

/// Site-specific knowledge of where a retailer puts its price, name and image.
///
/// Implementors provide the raw `find_*` lookups; callers use the `extract_*`
/// methods, which return nothing for verification pages.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn can_handle(&self, url: &str) -> bool;

    /// Default verification-page detector shared by every retailer.
    fn is_blocked_page(&self, doc: &Document) -> bool {
        let signals = BlockedSignals::detect(doc);
        if signals.any() {
            tracing::warn!(
                "Detected verification page at {} (title={}, image={}, prompt={}, form={})",
                doc.url(),
                signals.title,
                signals.image,
                signals.prompt,
                signals.form
            );
        }
        signals.any()
    }

    fn find_price(&self, doc: &Document) -> Option<Decimal>;
    fn find_name(&self, doc: &Document) -> Option<String>;
    fn find_image(&self, doc: &Document) -> Option<String>;

    fn extract_price(&self, doc: &Document) -> Option<Decimal> {
        if self.is_blocked_page(doc) {
            return None;
        }
        self.find_price(doc)
    }

    fn extract_name(&self, doc: &Document) -> Option<String> {
        if self.is_blocked_page(doc) {
            return None;
        }
        self.find_name(doc)
    }

    fn extract_image(&self, doc: &Document) -> Option<String> {
        if self.is_blocked_page(doc) {
            return None;
        }
        self.find_image(doc)
    }

    /// Single blocked-page check followed by all three lookups.
    fn extract_all(&self, doc: &Document) -> ExtractionResult {
        if self.is_blocked_page(doc) {
            return ExtractionResult::empty();
        }
        ExtractionResult {
            name: self.find_name(doc),
            image_url: self.find_image(doc),
            price: self.find_price(doc),
        }
    }
}
