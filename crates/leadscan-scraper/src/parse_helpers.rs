//! Contact extraction shared by the directory adapters and the verifier.
//!
//! Functions take plain text or hrefs so they stay independent of the HTML
//! parser each adapter uses.

use std::sync::LazyLock;

use regex::Regex;

use crate::normalize::normalize_phone;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").expect("valid email regex")
});

/// `+48 91 555 12 34`, `915-551-234`, `(91) 555 12 34`, `600100200`.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?48[\s-]?)?\(?\d{2,3}\)?[\s-]?\d{3}[\s-]?\d{2,3}(?:[\s-]?\d{2,3})?")
        .expect("valid phone regex")
});

static BARE_WWW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bwww\.[a-z0-9.-]+\.[a-z]{2,}\b").expect("valid www regex")
});

/// Placeholder addresses that show up in templates and never belong to a business.
const PLACEHOLDER_EMAIL_DOMAINS: [&str; 3] = ["example.com", "test.com", "domain.com"];

/// Hosts whose pages never count as a business's own website: social
/// networks, search/maps, and the directories we scrape from.
const FOREIGN_HOSTS: [&str; 22] = [
    "facebook.com",
    "fb.com",
    "fb.me",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "youtube.com",
    "youtu.be",
    "tiktok.com",
    "google.com",
    "google.pl",
    "goo.gl",
    "panoramafirm.pl",
    "pkt.pl",
    "aleo.com",
    "gowork.pl",
    "olx.pl",
    "allegro.pl",
    "zumi.pl",
    "yelp.com",
    "booking.com",
];

/// Social profile links found on a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialLinks {
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
}

impl SocialLinks {
    /// Classifies `href` and keeps it if that network is not filled yet.
    pub fn offer(&mut self, href: &str) {
        let Some(host) = host_of(href) else {
            return;
        };
        let slot = if host_matches(&host, "facebook.com") || host_matches(&host, "fb.com") {
            &mut self.facebook
        } else if host_matches(&host, "instagram.com") {
            &mut self.instagram
        } else if host_matches(&host, "linkedin.com") {
            &mut self.linkedin
        } else {
            return;
        };
        if slot.is_none() {
            *slot = Some(href.trim().to_owned());
        }
    }
}

/// First usable e-mail address in `text`.
#[must_use]
pub fn extract_email(text: &str) -> Option<String> {
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_ascii_lowercase())
        .find(|email| {
            let domain = email.rsplit('@').next().unwrap_or_default();
            !PLACEHOLDER_EMAIL_DOMAINS.contains(&domain)
                && !domain.ends_with(".png")
                && !domain.ends_with(".jpg")
        })
}

/// First phone number in `text`, normalized.
#[must_use]
pub fn extract_phone(text: &str) -> Option<String> {
    PHONE_RE
        .find_iter(text)
        .find_map(|m| {
            let digits = m.as_str().chars().filter(char::is_ascii_digit).count();
            (9..=11).contains(&digits).then_some(m.as_str())
        })
        .and_then(normalize_phone)
}

/// A bare `www.example.pl` mention in free text, returned as an `http://` URL.
#[must_use]
pub fn extract_bare_website(text: &str) -> Option<String> {
    BARE_WWW_RE
        .find(text)
        .map(|m| format!("http://{}", m.as_str().to_ascii_lowercase()))
}

/// Lowercased host of an absolute or scheme-less URL.
#[must_use]
pub fn host_of(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("http://{trimmed}")
    };
    reqwest::Url::parse(&with_scheme)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_ascii_lowercase()))
        .filter(|h| !h.is_empty())
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// `true` if `url` could be a business's own website rather than a profile
/// on a social network or directory.
#[must_use]
pub fn is_own_website(url: &str) -> bool {
    let Some(host) = host_of(url) else {
        return false;
    };
    if host.split('.').any(|label| label == "tripadvisor") {
        return false;
    }
    !FOREIGN_HOSTS.iter().any(|domain| host_matches(&host, domain))
}

/// Resolves `href` against `base`, returning `None` for non-HTTP targets.
#[must_use]
pub fn absolute_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return None;
    }
    let resolved = reqwest::Url::parse(base).ok()?.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_real_email() {
        let text = "Kontakt: info@example.com lub Biuro@Kawiarnia-Lipa.pl";
        assert_eq!(extract_email(text), Some("biuro@kawiarnia-lipa.pl".to_owned()));
    }

    #[test]
    fn ignores_image_names_that_look_like_emails() {
        assert_eq!(extract_email("logo@2x.png"), None);
    }

    #[test]
    fn extracts_and_normalizes_phone() {
        assert_eq!(
            extract_phone("tel. 91 555 12 34, czynne 8-16"),
            Some("+48915551234".to_owned())
        );
        assert_eq!(
            extract_phone("Zadzwoń: +48 600-100-200"),
            Some("+48600100200".to_owned())
        );
    }

    #[test]
    fn short_numbers_are_not_phones() {
        assert_eq!(extract_phone("kod 70-500, lokal 12"), None);
    }

    #[test]
    fn bare_www_mention_becomes_url() {
        assert_eq!(
            extract_bare_website("Zapraszamy: WWW.Lipa.pl!"),
            Some("http://www.lipa.pl".to_owned())
        );
    }

    #[test]
    fn social_and_directory_hosts_are_not_own_websites() {
        for url in [
            "https://www.facebook.com/kawiarnialipa",
            "https://m.facebook.com/kawiarnialipa",
            "instagram.com/lipa",
            "https://panoramafirm.pl/szczecin/lipa",
            "https://www.tripadvisor.co.uk/Restaurant-lipa",
            "https://maps.google.com/?cid=1",
        ] {
            assert!(!is_own_website(url), "{url} should be rejected");
        }
    }

    #[test]
    fn regular_domains_are_own_websites() {
        assert!(is_own_website("https://kawiarnia-lipa.pl"));
        assert!(is_own_website("www.lipa.com.pl"));
        // a domain merely containing "fb" is fine
        assert!(is_own_website("https://fbstudio.pl"));
    }

    #[test]
    fn social_links_keep_first_per_network() {
        let mut links = SocialLinks::default();
        links.offer("https://www.facebook.com/lipa");
        links.offer("https://facebook.com/other");
        links.offer("https://www.instagram.com/lipa");
        links.offer("https://kawiarnia-lipa.pl");
        assert_eq!(links.facebook.as_deref(), Some("https://www.facebook.com/lipa"));
        assert_eq!(links.instagram.as_deref(), Some("https://www.instagram.com/lipa"));
        assert_eq!(links.linkedin, None);
    }

    #[test]
    fn absolute_url_resolves_relative_hrefs() {
        assert_eq!(
            absolute_url("https://www.pkt.pl/szukaj/kawiarnie/szczecin", "/firma/lipa"),
            Some("https://www.pkt.pl/firma/lipa".to_owned())
        );
        assert_eq!(absolute_url("https://www.pkt.pl", "mailto:a@b.pl"), None);
        assert_eq!(absolute_url("https://www.pkt.pl", "#"), None);
    }
}
