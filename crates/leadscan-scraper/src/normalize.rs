//! Text, phone and identity normalization shared by adapters and the
//! deduplicator.
//!
//! Everything here is pure and allocation-light so it can run per listing.

use std::fmt;

use leadscan_core::{BusinessRecord, MergedBusiness};

/// Street-type prefixes dropped from the address token.
const STREET_PREFIXES: [&str; 9] = [
    "ul", "ulica", "al", "aleja", "aleje", "pl", "plac", "os", "osiedle",
];

/// Collapses runs of whitespace and trims the ends.
#[must_use]
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`clean_text`], mapping an empty result to `None`.
#[must_use]
pub fn non_empty(raw: &str) -> Option<String> {
    let cleaned = clean_text(raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Folds a lowercase character to its ASCII base letter(s).
fn fold_char(c: char, out: &mut String) {
    let folded = match c {
        'ą' | 'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'ć' | 'č' | 'ç' => 'c',
        'ď' => 'd',
        'ę' | 'é' | 'è' | 'ê' | 'ë' | 'ě' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ł' => 'l',
        'ń' | 'ñ' | 'ň' => 'n',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ř' => 'r',
        'ś' | 'š' => 's',
        'ť' => 't',
        'ú' | 'ù' | 'û' | 'ü' | 'ů' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        'ß' => {
            out.push_str("ss");
            return;
        }
        other => other,
    };
    out.push(folded);
}

/// Lowercases, folds diacritics and reduces every non-alphanumeric run to a
/// single space.
///
/// `"Kawiarnia  Łąka-Ślęża"` becomes `"kawiarnia laka sleza"`.
#[must_use]
pub fn fold(raw: &str) -> String {
    let mut folded = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        fold_char(c, &mut folded);
    }

    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;
    for c in folded.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Normalizes a Polish phone number.
///
/// Nine digits become `+48XXXXXXXXX`, eleven digits starting with `48` gain a
/// leading `+`. Any other digit count is returned cleaned but otherwise as
/// listed. Input without digits yields `None`.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        0 => None,
        9 => Some(format!("+48{digits}")),
        11 if digits.starts_with("48") => Some(format!("+{digits}")),
        _ => non_empty(raw),
    }
}

/// The last nine digits of a phone number, i.e. the subscriber number without
/// country prefix.
#[must_use]
pub fn phone_digits(raw: &str) -> Option<String> {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let start = digits.len().saturating_sub(9);
    Some(digits[start..].iter().collect())
}

/// Coarse street token of an address: the first comma-separated segment with
/// street-type prefixes and house numbers removed.
///
/// `"ul. Wały Chrobrego 1/3, 70-500 Szczecin"` becomes `"waly chrobrego"`.
#[must_use]
pub fn street_token(address: &str) -> Option<String> {
    let first = address.split(',').next().unwrap_or_default();
    let folded = fold(first);
    let mut tokens = folded.split(' ').filter(|t| !t.is_empty()).peekable();

    if tokens.peek().is_some_and(|t| STREET_PREFIXES.contains(t)) {
        tokens.next();
    }

    let street = tokens
        .filter(|t| !t.chars().any(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ");

    if street.is_empty() {
        None
    } else {
        Some(street)
    }
}

/// Canonical identity string for cross-source matching.
///
/// Built from the folded name plus the street token, or the phone digits when
/// there is no usable address, or the name alone when neither is available.
/// Name-only keys merge more eagerly; sparse listings accept that risk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    #[must_use]
    pub fn derive(name: &str, address: Option<&str>, phone: Option<&str>) -> Self {
        let name = fold(name);
        if let Some(street) = address.and_then(street_token) {
            return Self(format!("{name}|{street}"));
        }
        if let Some(digits) = phone.and_then(phone_digits) {
            return Self(format!("{name}|tel:{digits}"));
        }
        Self(name)
    }

    #[must_use]
    pub fn for_record(record: &BusinessRecord) -> Self {
        Self::derive(
            &record.name,
            record.address.as_deref(),
            record.phone.as_deref(),
        )
    }

    #[must_use]
    pub fn for_merged(business: &MergedBusiness) -> Self {
        Self::derive(
            &business.name,
            business.address.as_deref(),
            business.phone.as_deref(),
        )
    }

    /// `true` when neither address nor phone contributed to the key.
    #[must_use]
    pub fn is_name_only(&self) -> bool {
        !self.0.contains('|')
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
