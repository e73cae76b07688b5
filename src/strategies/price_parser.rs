use regex::Regex;
use rust_decimal::Decimal;
use std::borrow::Cow;
use std::str::FromStr;
use std::sync::LazyLock;

/// Text longer than this is assumed to be a page section (related products, offers
/// carousels, ...) rather than a price, and is never parsed.
pub const MAX_PRICE_TEXT_LENGTH: usize = 100;

// Grouped digits bounded by non-digit characters, e.g. "4,599.00" inside "₹4,599.00".
// A leading '.' or ',' is excluded so the fraction of an ungrouped number never matches alone.
static GROUPED_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9.,])([0-9]{1,3}(?:,[0-9]{3})*(?:\.[0-9]+)?)(?:$|[^0-9,])").unwrap()
});

// Currency marker followed by any digit run with separators (covers lakh grouping "1,23,456").
static CURRENCY_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:₹|US\$|\$|€|£|¥|(?i:rs\.?|inr|usd|eur|gbp|jpy))\s*([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap()
});

// Any digit run, or a bare fraction such as ".99"
static ANY_DIGITS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9][0-9,]*(?:\.[0-9]+)?|\.[0-9]+").unwrap()
});

/// Known misdecodings of currency glyphs, as produced when UTF-8 bytes are read as
/// CP437 or Windows-1252.
const MOJIBAKE_REPLACEMENTS: &[(&str, &str)] = &[
    ("Γé╣", "Rs."), // ₹ read as CP437
    ("â‚¹", "Rs."), // ₹ read as Windows-1252
    ("Γé¼", "€"),
    ("â‚¬", "€"),
    ("┬ú", "£"),
    ("Â£", "£"),
    ("Â\u{a0}", " "),
    ("\u{a0}", " "),
];

/// Replace corrupted currency glyphs with a parseable equivalent.
pub fn normalize_mojibake(text: &str) -> Cow<'_, str> {
    if !MOJIBAKE_REPLACEMENTS.iter().any(|(bad, _)| text.contains(bad)) {
        return Cow::Borrowed(text);
    }

    let mut cleaned = text.to_string();
    for (bad, good) in MOJIBAKE_REPLACEMENTS {
        if cleaned.contains(bad) {
            cleaned = cleaned.replace(bad, good);
            tracing::debug!("Replaced corrupted glyph sequence {:?} in price text", bad);
        }
    }
    Cow::Owned(cleaned)
}

/// Parse a price out of free-form element text.
///
/// Tries, in order: a grouped-digit number, a currency-prefixed number, and any digit
/// run. Group separators are stripped and the result is an exact decimal.
pub fn parse_price(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    // Skip excessively long text
    let length = text.chars().count();
    if length > MAX_PRICE_TEXT_LENGTH {
        tracing::debug!("Skipping oversized price text (length {})", length);
        return None;
    }

    let cleaned = normalize_mojibake(text);
    tracing::debug!("Original price text: '{}', cleaned text: '{}'", text, cleaned);

    if let Some(price) = GROUPED_PRICE
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .and_then(|m| to_decimal(m.as_str()))
    {
        return Some(price);
    }

    if let Some(price) = CURRENCY_PRICE
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .and_then(|m| to_decimal(m.as_str()))
    {
        return Some(price);
    }

    ANY_DIGITS
        .find(&cleaned)
        .and_then(|m| to_decimal(m.as_str()))
}

/// Combine a price rendered as separate whole and fraction elements,
/// e.g. `"4,599."` and `"00"` into `4599.00`.
pub fn parse_split_price(whole: &str, fraction: &str) -> Option<Decimal> {
    let whole_digits: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
    if whole_digits.is_empty() {
        return None;
    }

    let fraction_digits: String = fraction.chars().filter(|c| c.is_ascii_digit()).collect();
    if fraction_digits.is_empty() {
        return Decimal::from_str(&whole_digits).ok();
    }

    Decimal::from_str(&format!("{}.{}", whole_digits, fraction_digits)).ok()
}

fn to_decimal(digits: &str) -> Option<Decimal> {
    let stripped = digits.replace(',', "");
    let stripped = stripped.trim_end_matches('.');
    if stripped.is_empty() {
        return None;
    }
    let stripped = if stripped.starts_with('.') {
        Cow::Owned(format!("0{}", stripped))
    } else {
        Cow::Borrowed(stripped)
    };
    match Decimal::from_str(&stripped) {
        Ok(price) => {
            tracing::debug!("Extracted price digits: '{}'", stripped);
            Some(price)
        }
        Err(e) => {
            tracing::debug!("Failed to convert '{}' to a decimal: {}", stripped, e);
            None
        }
    }
}
