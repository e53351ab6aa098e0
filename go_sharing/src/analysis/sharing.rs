//! Cross-organism sharing of enriched GO terms.
//!
//! A term's *sharing count* within one amino-acid class is the number of
//! distinct organisms in which it came out enriched. A [`SharingHistogram`]
//! records, for every sharing count `k` in `1..=N` (N organisms), how many
//! terms reached it.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::error::{Result, SharingError};
use crate::models::{AminoAcid, GoTermRecord};

/// Counts indexed by sharing count `1..=max_sharing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingHistogram {
    buckets: Vec<u64>,
}

impl SharingHistogram {
    pub fn new(max_sharing: usize) -> Self {
        SharingHistogram {
            buckets: vec![0; max_sharing],
        }
    }

    #[cfg(test)]
    pub fn from_buckets(buckets: Vec<u64>) -> Self {
        SharingHistogram { buckets }
    }

    pub fn max_sharing(&self) -> usize {
        self.buckets.len()
    }

    #[cfg(test)]
    pub fn get(&self, k: usize) -> Option<u64> {
        k.checked_sub(1).and_then(|i| self.buckets.get(i)).copied()
    }

    pub fn add(&mut self, k: usize, n: u64) -> Result<()> {
        let max = self.max_sharing();
        let bucket = k
            .checked_sub(1)
            .and_then(|i| self.buckets.get_mut(i))
            .ok_or(SharingError::SharingOutOfRange { k, max })?;
        *bucket += n;
        Ok(())
    }

    /// Adds `values[k - 1]` to bucket `k` for every `k`.
    pub fn accumulate(&mut self, values: &[u64]) {
        debug_assert_eq!(self.buckets.len(), values.len());
        for (bucket, n) in self.buckets.iter_mut().zip(values) {
            *bucket += n;
        }
    }

    /// `(k, count)` pairs for `k = 1..=max_sharing`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.buckets.iter().enumerate().map(|(i, &n)| (i + 1, n))
    }

    pub fn buckets(&self) -> &[u64] {
        &self.buckets
    }

    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }

    pub fn merge(mut self, other: &SharingHistogram) -> Self {
        debug_assert_eq!(self.buckets.len(), other.buckets.len());
        for (mine, theirs) in self.buckets.iter_mut().zip(&other.buckets) {
            *mine += theirs;
        }
        self
    }
}

pub type ObservedSharing = BTreeMap<AminoAcid, SharingHistogram>;

/// Buckets every category's enriched GO terms (keyed by GO id) by the number
/// of distinct organisms that share them.
pub fn tabulate_observed(
    records: &[GoTermRecord],
    categories: &[AminoAcid],
    n_organisms: usize,
) -> Result<ObservedSharing> {
    let mut organisms_by_term: HashMap<AminoAcid, HashMap<&str, HashSet<&str>>> = HashMap::new();
    for record in records {
        organisms_by_term
            .entry(record.category)
            .or_default()
            .entry(record.go_id.as_str())
            .or_default()
            .insert(record.organism.as_str());
    }

    let mut observed = ObservedSharing::new();
    for &category in categories {
        let mut histogram = SharingHistogram::new(n_organisms);
        if let Some(terms) = organisms_by_term.get(&category) {
            for organisms in terms.values() {
                histogram.add(organisms.len(), 1)?;
            }
        }
        debug!("{} observed sharing {:?}", category, histogram.buckets());
        observed.insert(category, histogram);
    }
    Ok(observed)
}
