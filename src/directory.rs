//! Administrator tables: every resident, every household.

use crate::executor::StoreError;
use crate::model::{HouseholdId, ResidentId, ResidentProfile};
use crate::store::{CensusSnapshot, EntityStore};
use serde::Serialize;

/// Placeholder for a value nobody recorded.
pub const MISSING: &str = "—";

fn or_missing(value: Option<impl ToString>) -> String {
    value
        .map(|v| v.to_string())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| MISSING.to_string())
}

fn yes_no(value: bool) -> String {
    let text = if value { "Yes" } else { "No" };
    text.to_string()
}

/// One resident flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResidentRow {
    pub resident_id: ResidentId,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub gender: String,
    pub relation: String,
    pub marital_status: String,
    pub date_of_birth: String,
    pub phone_number: String,
    pub email: String,
    pub lifemember: String,
    pub occupation: String,
    pub profession: String,
    pub work_location: String,
    pub highest_qualification: String,
    pub school_or_college_name: String,
    pub year_of_completion: String,
    pub blood_group: String,
    pub mediclaim: String,
    pub thalassemia: String,
    pub g6pd: String,
    /// Names of the groups the resident belongs to.
    pub groups: Vec<&'static str>,
}

impl ResidentRow {
    pub fn from_profile(profile: &ResidentProfile) -> Self {
        let r = &profile.resident;
        let occupation = profile.occupation.as_ref();
        let education = profile.education.as_ref();
        let health = profile.health.as_ref();

        let mut groups = Vec::new();
        if let Some(g) = &profile.groups {
            for (member, name) in [
                (g.shirva_setu, "Shirva Setu"),
                (g.dukhad_nidhan, "Dukhad Nidhan"),
                (g.sgnx, "SGNX"),
                (g.sgnx_parent, "SGNX Parent"),
            ] {
                if member {
                    groups.push(name);
                }
            }
        }

        Self {
            resident_id: r.resident_id,
            first_name: r.first_name.clone(),
            middle_name: or_missing(r.middle_name.as_ref()),
            last_name: r.last_name.clone(),
            gender: r.gender.to_string(),
            relation: r.relation.to_string(),
            marital_status: r.marital_status.to_string(),
            date_of_birth: r.date_of_birth.format("%Y-%m-%d").to_string(),
            phone_number: or_missing(r.phone_number.as_ref()),
            email: or_missing(r.email.as_ref()),
            lifemember: yes_no(r.lifemember),
            occupation: or_missing(occupation.and_then(|o| o.occupation)),
            profession: or_missing(occupation.and_then(|o| o.profession.as_ref())),
            work_location: or_missing(occupation.and_then(|o| o.work_location.as_ref())),
            highest_qualification: or_missing(education.and_then(|e| e.qualification())),
            school_or_college_name: or_missing(
                education.and_then(|e| e.school_or_college_name.as_ref()),
            ),
            year_of_completion: or_missing(education.and_then(|e| e.year_of_completion)),
            blood_group: or_missing(health.and_then(|h| h.blood_group)),
            mediclaim: or_missing(health.map(|h| h.mediclaim)),
            thalassemia: or_missing(health.and_then(|h| h.thalassemia)),
            g6pd: or_missing(health.map(|h| h.g6pd)),
            groups,
        }
    }

    fn text_fields(&self) -> [&str; 20] {
        [
            self.first_name.as_str(),
            self.middle_name.as_str(),
            self.last_name.as_str(),
            self.gender.as_str(),
            self.relation.as_str(),
            self.marital_status.as_str(),
            self.date_of_birth.as_str(),
            self.phone_number.as_str(),
            self.email.as_str(),
            self.lifemember.as_str(),
            self.occupation.as_str(),
            self.profession.as_str(),
            self.work_location.as_str(),
            self.highest_qualification.as_str(),
            self.school_or_college_name.as_str(),
            self.year_of_completion.as_str(),
            self.blood_group.as_str(),
            self.mediclaim.as_str(),
            self.thalassemia.as_str(),
            self.g6pd.as_str(),
        ]
    }

    /// Case-insensitive substring match against any displayed field.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        needle.is_empty()
            || self
                .text_fields()
                .iter()
                .chain(self.groups.iter())
                .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResidentsDirectory {
    pub rows: Vec<ResidentRow>,
}

impl ResidentsDirectory {
    /// # Errors
    ///
    /// Returns `StoreError` if any table cannot be read.
    pub fn load(store: &dyn EntityStore) -> Result<Self, StoreError> {
        Ok(Self::from_snapshot(&CensusSnapshot::load(store)?))
    }

    pub fn from_snapshot(snapshot: &CensusSnapshot) -> Self {
        Self {
            rows: snapshot.profiles().iter().map(ResidentRow::from_profile).collect(),
        }
    }

    pub fn search(&self, query: &str) -> Vec<&ResidentRow> {
        self.rows.iter().filter(|row| row.matches(query)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HouseholdRow {
    pub household_id: HouseholdId,
    /// Full name of the head, or the placeholder if the head is unknown.
    pub head_of_family: String,
    pub address: String,
    pub chapter: String,
    pub number_of_members: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HouseholdListing {
    pub rows: Vec<HouseholdRow>,
    /// Distinct non-empty chapters in first-seen order.
    pub chapters: Vec<String>,
}

impl HouseholdListing {
    /// # Errors
    ///
    /// Returns `StoreError` if households or residents cannot be read.
    pub fn load(store: &dyn EntityStore) -> Result<Self, StoreError> {
        let snapshot = CensusSnapshot {
            residents: store.list_residents()?,
            households: store.list_households()?,
            ..CensusSnapshot::default()
        };
        Ok(Self::from_snapshot(&snapshot))
    }

    pub fn from_snapshot(snapshot: &CensusSnapshot) -> Self {
        let rows: Vec<HouseholdRow> = snapshot
            .households
            .iter()
            .map(|h| HouseholdRow {
                household_id: h.household_id,
                head_of_family: or_missing(
                    snapshot.resident(h.head_of_family_id).map(|r| r.full_name()),
                ),
                address: h.address.clone(),
                chapter: h.chapter.clone(),
                number_of_members: h.number_of_members,
            })
            .collect();

        let mut chapters: Vec<String> = Vec::new();
        for row in &rows {
            let chapter = row.chapter.trim();
            if !chapter.is_empty() && !chapters.iter().any(|c| c == chapter) {
                chapters.push(chapter.to_string());
            }
        }

        Self { rows, chapters }
    }

    /// Rows whose head name, address or chapter contains `search`
    /// (ignoring case) and, when given, whose chapter equals `chapter`.
    pub fn filter(&self, search: &str, chapter: Option<&str>) -> Vec<&HouseholdRow> {
        let needle = search.trim().to_lowercase();
        self.rows
            .iter()
            .filter(|row| {
                needle.is_empty()
                    || row.head_of_family.to_lowercase().contains(&needle)
                    || row.address.to_lowercase().contains(&needle)
                    || row.chapter.to_lowercase().contains(&needle)
            })
            .filter(|row| chapter.map_or(true, |c| row.chapter == c))
            .collect()
    }
}
