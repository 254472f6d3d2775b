//! Derived analytics.
//!
//! Everything here is a pure function of a [`CensusSnapshot`], recomputed on
//! every load. Ties in any ranking go to the value seen first while walking
//! residents in snapshot order (`created_at`, then `resident_id`).

pub mod business;
pub mod education;
pub mod employment;
pub mod students;

pub use business::{BusinessDirectory, BusinessEntry};
pub use education::{standardize_education_level, EducationAnalytics, Literacy};
pub use employment::{EmploymentStats, OccupationAnalytics, TrendPoint};
pub use students::StudentAnalytics;

use crate::config::AnalyticsConfig;
use crate::executor::StoreError;
use crate::store::{CensusSnapshot, EntityStore};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Integer percentage of `part` in `whole`, halves rounded up; 0 when
/// `whole` is 0.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let rounded = (200 * part + whole) / (2 * whole);
    u32::try_from(rounded).unwrap_or(u32::MAX)
}

/// A label and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Count {
    pub name: String,
    pub value: usize,
}

/// Frequency counter that remembers first-seen order.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    counts: Vec<Count>,
    positions: HashMap<String, usize>,
}

impl Tally {
    pub(crate) fn add(&mut self, name: &str) {
        match self.positions.get(name) {
            Some(&i) => self.counts[i].value += 1,
            None => {
                self.positions.insert(name.to_string(), self.counts.len());
                self.counts.push(Count {
                    name: name.to_string(),
                    value: 1,
                });
            }
        }
    }

    /// Labels in first-seen order.
    pub(crate) fn labels(&self) -> impl Iterator<Item = &str> {
        self.counts.iter().map(|c| c.name.as_str())
    }

    /// By count, descending; the stable sort keeps first-seen order among ties.
    pub(crate) fn ranked(mut self) -> Vec<Count> {
        self.counts.sort_by(|a, b| b.value.cmp(&a.value));
        self.counts
    }

    pub(crate) fn top(self, n: usize) -> Vec<Count> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }
}

/// The admin analytics page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyticsReport {
    pub occupation: OccupationAnalytics,
    pub education: EducationAnalytics,
    pub students: StudentAnalytics,
    pub businesses: BusinessDirectory,
}

impl AnalyticsReport {
    pub fn compute(snapshot: &CensusSnapshot, config: &AnalyticsConfig, as_of: NaiveDate) -> Self {
        Self {
            occupation: OccupationAnalytics::compute(snapshot, config, as_of),
            education: EducationAnalytics::compute(snapshot, config),
            students: StudentAnalytics::compute(snapshot),
            businesses: BusinessDirectory::compute(snapshot, config),
        }
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the snapshot cannot be read.
    pub fn load(
        store: &dyn EntityStore,
        config: &AnalyticsConfig,
        as_of: NaiveDate,
    ) -> Result<Self, StoreError> {
        let snapshot = CensusSnapshot::load(store)?;
        Ok(Self::compute(&snapshot, config, as_of))
    }

    /// Like [`load`](Self::load), but a store failure yields the empty
    /// report (every rate 0, every list empty) and a warning.
    pub fn load_or_default(
        store: &dyn EntityStore,
        config: &AnalyticsConfig,
        as_of: NaiveDate,
    ) -> Self {
        Self::load(store, config, as_of).unwrap_or_else(|e| {
            log::warn!("analytics unavailable, showing empty report: {e}");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(5, 5), 100);
    }

    #[test]
    fn tally_breaks_ties_by_first_seen() {
        let mut tally = Tally::default();
        for name in ["Teacher", "Engineer", "Engineer", "Teacher", "Doctor"] {
            tally.add(name);
        }
        let labels: Vec<&str> = tally.labels().collect();
        assert_eq!(labels, vec!["Teacher", "Engineer", "Doctor"]);

        let ranked = tally.top(2);
        assert_eq!(ranked[0].name, "Teacher");
        assert_eq!(ranked[1].name, "Engineer");
        assert_eq!(ranked.len(), 2);
    }
}
