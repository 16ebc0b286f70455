//! Business records as produced by sources and as emitted after merging.
//!
//! Field order in [`BusinessRecord`] and [`MergedBusiness`] is the canonical
//! column order handed to exporters.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// External source a record was collected from.
///
/// Variant order is the merge priority: when two sources disagree on a field,
/// the one declared first wins. The orchestrator also scans sources in this
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Maps,
    DirectoryA,
    DirectoryB,
}

impl Source {
    /// All sources in priority order.
    pub const ALL: [Source; 3] = [Source::Maps, Source::DirectoryA, Source::DirectoryB];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Maps => "maps",
            Source::DirectoryA => "directory_a",
            Source::DirectoryB => "directory_b",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = CoreError;

    /// Accepts the canonical names plus the directory names operators know
    /// them by (`google`, `panorama`, `pkt`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "maps" | "google" | "google_maps" => Ok(Source::Maps),
            "directory_a" | "directorya" | "panorama" | "panorama_firm" => {
                Ok(Source::DirectoryA)
            }
            "directory_b" | "directoryb" | "pkt" => Ok(Source::DirectoryB),
            other => Err(CoreError::UnknownSource(other.to_string())),
        }
    }
}

/// Whether a business has a working website of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebsiteStatus {
    Confirmed,
    NoWebsite,
    #[default]
    Unknown,
}

impl WebsiteStatus {
    /// Ranks how much a status tells us; used when two merged entries disagree.
    #[must_use]
    pub(crate) fn certainty(self) -> u8 {
        match self {
            WebsiteStatus::Unknown => 0,
            WebsiteStatus::NoWebsite => 1,
            WebsiteStatus::Confirmed => 2,
        }
    }
}

/// A single listing as yielded by one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub name: String,
    pub industry: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub website_url: Option<String>,
    pub source: Source,
    pub has_website: WebsiteStatus,
}

impl BusinessRecord {
    /// Creates a record with only the identity fields set.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingField`] if `name` or `industry` is blank.
    pub fn new(name: &str, industry: &str, source: Source) -> Result<Self, CoreError> {
        let name = name.trim();
        let industry = industry.trim();
        if name.is_empty() {
            return Err(CoreError::MissingField("name"));
        }
        if industry.is_empty() {
            return Err(CoreError::MissingField("industry"));
        }
        Ok(Self {
            name: name.to_string(),
            industry: industry.to_string(),
            address: None,
            phone: None,
            email: None,
            facebook: None,
            instagram: None,
            linkedin: None,
            website_url: None,
            source,
            has_website: WebsiteStatus::Unknown,
        })
    }
}

/// One real-world business, assembled from every record that shares its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedBusiness {
    pub name: String,
    pub industry: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub facebook: Option<String>,
    pub instagram: Option<String>,
    pub linkedin: Option<String>,
    pub website_url: Option<String>,
    pub sources: BTreeSet<Source>,
    pub has_website: WebsiteStatus,
}

impl MergedBusiness {
    /// Highest-priority source that contributed to this business.
    #[must_use]
    pub fn primary_source(&self) -> Source {
        self.sources.first().copied().unwrap_or(Source::DirectoryB)
    }

    /// `true` when verification settled that the business has no website.
    #[must_use]
    pub fn is_lead(&self) -> bool {
        self.has_website == WebsiteStatus::NoWebsite
    }

    /// Keeps the more informative of two website statuses.
    pub fn absorb_website_status(&mut self, other: WebsiteStatus) {
        if other.certainty() > self.has_website.certainty() {
            self.has_website = other;
        }
    }
}

impl From<BusinessRecord> for MergedBusiness {
    fn from(record: BusinessRecord) -> Self {
        Self {
            name: record.name,
            industry: record.industry,
            address: record.address,
            phone: record.phone,
            email: record.email,
            facebook: record.facebook,
            instagram: record.instagram,
            linkedin: record.linkedin,
            website_url: record.website_url,
            sources: BTreeSet::from([record.source]),
            has_website: record.has_website,
        }
    }
}
