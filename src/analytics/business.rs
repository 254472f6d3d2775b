use crate::config::AnalyticsConfig;
use crate::model::ResidentId;
use crate::store::CensusSnapshot;
use serde::Serialize;

/// An occupation row presented as a local business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusinessEntry {
    pub resident_id: ResidentId,
    /// The profession, or "Business".
    pub name: String,
    /// The occupation category, or "Unspecified".
    pub kind: String,
    /// The work location, or the configured default.
    pub location: String,
    pub owner: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusinessDirectory {
    pub entries: Vec<BusinessEntry>,
    /// Distinct locations in first-seen order.
    pub locations: Vec<String>,
    /// Distinct kinds in first-seen order.
    pub kinds: Vec<String>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn push_distinct(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

impl BusinessDirectory {
    /// One entry per occupation row whose resident is known, in resident order.
    pub fn compute(snapshot: &CensusSnapshot, config: &AnalyticsConfig) -> Self {
        let mut directory = Self::default();
        for occupation in snapshot.occupations_in_resident_order() {
            let Some(owner) = snapshot.resident(occupation.resident_id) else {
                continue;
            };
            let entry = BusinessEntry {
                resident_id: occupation.resident_id,
                name: non_blank(occupation.profession.as_deref())
                    .unwrap_or("Business")
                    .to_string(),
                kind: occupation
                    .occupation
                    .map_or("Unspecified", |k| k.as_str())
                    .to_string(),
                location: non_blank(occupation.work_location.as_deref())
                    .unwrap_or(config.default_business_location.as_str())
                    .to_string(),
                owner: owner.full_name(),
            };
            push_distinct(&mut directory.locations, &entry.location);
            push_distinct(&mut directory.kinds, &entry.kind);
            directory.entries.push(entry);
        }
        directory
    }

    /// Entries whose name or owner contains `search` (ignoring case),
    /// optionally restricted to one location and one kind.
    pub fn filter(
        &self,
        search: &str,
        location: Option<&str>,
        kind: Option<&str>,
    ) -> Vec<&BusinessEntry> {
        let needle = search.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                needle.is_empty()
                    || e.name.to_lowercase().contains(&needle)
                    || e.owner.to_lowercase().contains(&needle)
            })
            .filter(|e| location.map_or(true, |l| e.location == l))
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .collect()
    }
}
