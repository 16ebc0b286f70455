//! Cross-source deduplication.
//!
//! Records are grouped by exact [`NormalizedKey`]. Within a group each field
//! keeps the first non-empty value seen, unless a higher-priority source
//! (see [`Source`] ordering) later supplies a different one.

use std::collections::HashMap;

use leadscan_core::{BusinessRecord, MergedBusiness, Source};

use crate::normalize::NormalizedKey;

/// Merged businesses plus the bookkeeping the run summary needs.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// One entry per distinct key, in first-appearance order.
    pub businesses: Vec<MergedBusiness>,
    /// Number of inputs folded into each business, parallel to `businesses`.
    pub group_sizes: Vec<usize>,
    pub input_records: usize,
}

impl MergeOutcome {
    /// Inputs that were folded into an earlier business.
    #[must_use]
    pub fn duplicates_merged(&self) -> usize {
        self.input_records.saturating_sub(self.businesses.len())
    }
}

/// Source that supplied the current value of each field.
#[derive(Debug, Clone, Copy)]
struct Provenance {
    name: Source,
    industry: Source,
    address: Option<Source>,
    phone: Option<Source>,
    email: Option<Source>,
    facebook: Option<Source>,
    instagram: Option<Source>,
    linkedin: Option<Source>,
    website_url: Option<Source>,
}

impl Provenance {
    fn uniform(business: &MergedBusiness, from: Source) -> Self {
        let tag = |field: &Option<String>| field.as_ref().map(|_| from);
        Self {
            name: from,
            industry: from,
            address: tag(&business.address),
            phone: tag(&business.phone),
            email: tag(&business.email),
            facebook: tag(&business.facebook),
            instagram: tag(&business.instagram),
            linkedin: tag(&business.linkedin),
            website_url: tag(&business.website_url),
        }
    }
}

struct Entry {
    business: MergedBusiness,
    provenance: Provenance,
    group_size: usize,
}

/// Incremental merge table. [`Deduplicator::merge`] is the one-shot form.
#[derive(Default)]
pub struct Deduplicator {
    index: HashMap<NormalizedKey, usize>,
    entries: Vec<Entry>,
    input_records: usize,
}

impl Deduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups `records` by key and merges each group.
    #[must_use]
    pub fn merge<I>(records: I) -> MergeOutcome
    where
        I: IntoIterator<Item = BusinessRecord>,
    {
        let mut dedup = Self::new();
        for record in records {
            dedup.push(record);
        }
        dedup.finish()
    }

    /// Merges an already merged collection again. Idempotent: feeding the
    /// output of [`Deduplicator::merge`] back in returns it unchanged.
    #[must_use]
    pub fn remerge<I>(businesses: I) -> MergeOutcome
    where
        I: IntoIterator<Item = MergedBusiness>,
    {
        let mut dedup = Self::new();
        for business in businesses {
            dedup.push_merged(business);
        }
        dedup.finish()
    }

    pub fn push(&mut self, record: BusinessRecord) {
        let key = NormalizedKey::for_record(&record);
        let from = record.source;
        self.absorb(key, MergedBusiness::from(record), from);
    }

    /// Adds a business that may already carry several sources. Its fields are
    /// attributed to its highest-priority source.
    pub fn push_merged(&mut self, business: MergedBusiness) {
        let key = NormalizedKey::for_merged(&business);
        let from = business.primary_source();
        self.absorb(key, business, from);
    }

    /// Distinct businesses so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn finish(self) -> MergeOutcome {
        let (businesses, group_sizes) = self
            .entries
            .into_iter()
            .map(|entry| (entry.business, entry.group_size))
            .unzip();
        MergeOutcome {
            businesses,
            group_sizes,
            input_records: self.input_records,
        }
    }

    fn absorb(&mut self, key: NormalizedKey, incoming: MergedBusiness, from: Source) {
        self.input_records += 1;

        let idx = match self.index.get(&key).copied() {
            Some(idx) => idx,
            None => {
                if key.is_name_only() {
                    tracing::debug!(key = %key, "no address or phone, keyed on name alone");
                }
                self.index.insert(key, self.entries.len());
                self.entries.push(Entry {
                    provenance: Provenance::uniform(&incoming, from),
                    business: incoming,
                    group_size: 1,
                });
                return;
            }
        };

        let entry = &mut self.entries[idx];
        entry.group_size += 1;
        let existing = &mut entry.business;
        let origin = &mut entry.provenance;

        if from < origin.name {
            existing.name = incoming.name;
            origin.name = from;
        }
        if from < origin.industry {
            existing.industry = incoming.industry;
            origin.industry = from;
        }
        merge_field(&mut existing.address, &mut origin.address, incoming.address, from);
        merge_field(&mut existing.phone, &mut origin.phone, incoming.phone, from);
        merge_field(&mut existing.email, &mut origin.email, incoming.email, from);
        merge_field(&mut existing.facebook, &mut origin.facebook, incoming.facebook, from);
        merge_field(&mut existing.instagram, &mut origin.instagram, incoming.instagram, from);
        merge_field(&mut existing.linkedin, &mut origin.linkedin, incoming.linkedin, from);
        merge_field(
            &mut existing.website_url,
            &mut origin.website_url,
            incoming.website_url,
            from,
        );

        existing.sources.extend(incoming.sources);
        existing.absorb_website_status(incoming.has_website);
    }
}

fn merge_field(
    slot: &mut Option<String>,
    origin: &mut Option<Source>,
    incoming: Option<String>,
    from: Source,
) {
    let Some(value) = incoming else {
        return;
    };
    let replace = match (slot.as_ref(), *origin) {
        (None, _) => true,
        (Some(current), Some(current_from)) => from < current_from && *current != value,
        (Some(_), None) => false,
    };
    if replace {
        *slot = Some(value);
        *origin = Some(from);
    }
}

#[cfg(test)]
#[path = "dedup_test.rs"]
mod tests;
