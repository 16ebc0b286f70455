//! `scraper` helpers for the HTML directory adapters.
//!
//! `scraper::Html` is not `Send`, so documents are parsed and dropped inside
//! synchronous functions; only owned strings cross an `.await`.

use scraper::{ElementRef, Html, Selector};

use crate::normalize::{clean_text, non_empty, normalize_phone};
use crate::parse_helpers::{extract_email, extract_phone, SocialLinks};

/// Visible text of an element with whitespace collapsed.
pub(super) fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first element matching `selector` that has any.
pub(super) fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Value of `attr` on the first matching element that carries it.
pub(super) fn first_attr(root: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    root.select(selector)
        .filter_map(|el| el.value().attr(attr))
        .find_map(non_empty)
}

/// Outer HTML of every element matched by the first selector that matches
/// anything.
pub(super) fn listing_fragments(document: &Html, selectors: &[&Selector]) -> Vec<String> {
    for selector in selectors {
        let fragments: Vec<String> = document.select(selector).map(|el| el.html()).collect();
        if !fragments.is_empty() {
            return fragments;
        }
    }
    Vec::new()
}

/// Contact details found anywhere inside one listing.
#[derive(Debug, Default)]
pub(super) struct Contacts {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub social: SocialLinks,
}

/// Collects `mailto:`/`tel:` links and social profiles, falling back to the
/// listing text for e-mail and phone.
pub(super) fn scan_contacts(root: ElementRef<'_>) -> Contacts {
    static LINKS: std::sync::LazyLock<Selector> =
        std::sync::LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

    let mut contacts = Contacts::default();
    for href in root.select(&LINKS).filter_map(|a| a.value().attr("href")) {
        let href = href.trim();
        if let Some(address) = href.strip_prefix("mailto:") {
            if contacts.email.is_none() {
                let address = address.split('?').next().unwrap_or_default();
                contacts.email = extract_email(address);
            }
        } else if let Some(number) = href.strip_prefix("tel:") {
            if contacts.phone.is_none() {
                contacts.phone = normalize_phone(number);
            }
        } else {
            contacts.social.offer(href);
        }
    }

    if contacts.email.is_none() || contacts.phone.is_none() {
        let text = element_text(root);
        if contacts.email.is_none() {
            contacts.email = extract_email(&text);
        }
        if contacts.phone.is_none() {
            contacts.phone = extract_phone(&text);
        }
    }
    contacts
}
