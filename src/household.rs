//! Household assembly.
//!
//! A member whose relation is `Self` founds a new household and becomes its
//! head; every other member joins the household the caller's
//! [`HouseholdSession`] points at. The resident and household rows are
//! written in one unit of work. The four satellite rows follow in a second
//! step governed by [`SatelliteWrites`], so a failure there surfaces as
//! [`CensusError::PartialWrite`] with the resident already saved.

use crate::config::{HouseholdConfig, SatelliteWrites};
use crate::error::{CensusError, SatelliteFailure};
use crate::metrics;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
use crate::model::{
    BloodGroup, Education, Gender, GroupMembership, HealthRecord, Household, HouseholdId,
    MaritalStatus, Occupation, OccupationKind, Relation, Resident, ResidentId, Thalassemia, YesNo,
};
use crate::schema::CensusTable;
use crate::session::HouseholdSession;
use crate::store::{in_transaction, EntityStore};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationDetails {
    pub highest_qualification: Option<String>,
    pub school_or_college_name: Option<String>,
    pub year_of_completion: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupationDetails {
    pub occupation: Option<OccupationKind>,
    pub profession: Option<String>,
    pub work_location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthDetails {
    pub blood_group: Option<BloodGroup>,
    pub mediclaim: bool,
    pub thalassemia: Option<Thalassemia>,
    pub g6pd: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupFlags {
    pub shirva_setu: bool,
    pub dukhad_nidhan: bool,
    pub sgnx: bool,
    pub sgnx_parent: bool,
}

/// Everything the add-member and edit-member forms submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberForm {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub gender: Gender,
    pub relation: Relation,
    pub marital_status: MaritalStatus,
    pub date_of_birth: NaiveDate,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub lifemember: bool,
    #[serde(default)]
    pub education: EducationDetails,
    #[serde(default)]
    pub occupation: OccupationDetails,
    #[serde(default)]
    pub health: HealthDetails,
    #[serde(default)]
    pub groups: GroupFlags,
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(field: &'static str, value: &str) -> Result<String, CensusError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CensusError::validation(field, "is required"));
    }
    Ok(trimmed.to_string())
}

impl MemberForm {
    /// The resident row this form describes, validated and trimmed.
    fn to_resident(&self, resident_id: ResidentId) -> Result<Resident, CensusError> {
        let email = clean(&self.email);
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(CensusError::validation("email", "must contain '@'"));
            }
        }
        Ok(Resident {
            resident_id,
            first_name: required("first_name", &self.first_name)?,
            middle_name: clean(&self.middle_name),
            last_name: required("last_name", &self.last_name)?,
            gender: self.gender,
            relation: self.relation,
            marital_status: self.marital_status,
            date_of_birth: self.date_of_birth,
            phone_number: clean(&self.phone_number),
            email,
            lifemember: self.lifemember,
            household_id: None,
            created_at: Utc::now(),
        })
    }

    fn satellites(&self, resident_id: ResidentId) -> SatelliteRows {
        SatelliteRows {
            education: Education {
                resident_id,
                highest_qualification: clean(&self.education.highest_qualification),
                school_or_college_name: clean(&self.education.school_or_college_name),
                year_of_completion: self.education.year_of_completion,
            },
            occupation: Occupation {
                resident_id,
                occupation: self.occupation.occupation,
                profession: clean(&self.occupation.profession),
                work_location: clean(&self.occupation.work_location),
            },
            health: HealthRecord {
                resident_id,
                blood_group: self.health.blood_group,
                mediclaim: YesNo::from(self.health.mediclaim),
                thalassemia: self.health.thalassemia,
                g6pd: YesNo::from(self.health.g6pd),
            },
            groups: GroupMembership {
                resident_id,
                shirva_setu: self.groups.shirva_setu,
                dukhad_nidhan: self.groups.dukhad_nidhan,
                sgnx: self.groups.sgnx,
                sgnx_parent: self.groups.sgnx_parent,
            },
        }
    }
}

struct SatelliteRows {
    education: Education,
    occupation: Occupation,
    health: HealthRecord,
    groups: GroupMembership,
}

impl SatelliteRows {
    /// Upsert all four, returning the failures in table order.
    fn write(&self, store: &dyn EntityStore, stop_at_first: bool) -> Vec<SatelliteFailure> {
        let mut failures = Vec::new();
        for table in CensusTable::SATELLITES {
            let result = match table {
                CensusTable::Education => store.upsert_education(&self.education),
                CensusTable::Occupation => store.upsert_occupation(&self.occupation),
                CensusTable::HealthRecords => store.upsert_health(&self.health),
                _ => store.upsert_groups(&self.groups),
            };
            if let Err(e) = result {
                failures.push(SatelliteFailure {
                    table,
                    error: e.to_string(),
                });
                if stop_at_first {
                    break;
                }
            }
        }
        failures
    }
}

/// Insert a resident under the household rule.
///
/// Head: resident (no household) → household headed by it → link.
/// Other: joins `current_household`, whose member count goes up by one.
/// Meant to run inside a unit of work.
pub(crate) fn insert_member(
    tx: &dyn EntityStore,
    mut resident: Resident,
    current_household: Option<HouseholdId>,
) -> Result<Resident, CensusError> {
    if resident.is_head() {
        resident.household_id = None;
        tx.insert_resident(&resident)?;
        let household = Household::founded_by(resident.resident_id);
        tx.insert_household(&household)?;
        tx.set_resident_household(resident.resident_id, household.household_id)?;
        resident.household_id = Some(household.household_id);
        log::info!(
            "household {} founded by {}",
            household.household_id,
            resident.resident_id
        );
        return Ok(resident);
    }

    let household_id = current_household.ok_or(CensusError::MissingHousehold)?;
    if tx.find_household(household_id)?.is_none() {
        log::warn!("session points at missing household {household_id}");
        return Err(CensusError::MissingHousehold);
    }
    resident.household_id = Some(household_id);
    tx.insert_resident(&resident)?;
    tx.increment_members(household_id)?;
    Ok(resident)
}

/// A household member with the derived values the dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyMember {
    pub resident: Resident,
    pub age: i32,
    pub occupation: Option<OccupationKind>,
}

/// The signed-in user's household at a glance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyOverview {
    pub household: Household,
    pub members: Vec<FamilyMember>,
    /// Under 18.
    pub children: usize,
    /// 18 to 59.
    pub adults: usize,
    /// 60 and over.
    pub elders: usize,
}

impl FamilyOverview {
    /// Members whose name, relation or occupation contains `query`,
    /// ignoring case. An empty query matches everyone.
    pub fn search(&self, query: &str) -> Vec<&FamilyMember> {
        let needle = query.trim().to_lowercase();
        self.members
            .iter()
            .filter(|m| {
                needle.is_empty()
                    || m.resident.full_name().to_lowercase().contains(&needle)
                    || m.resident.relation.as_str().to_lowercase().contains(&needle)
                    || m.occupation
                        .map(|o| o.as_str().to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .collect()
    }
}

/// Member registration and editing over an [`EntityStore`].
pub struct HouseholdService<'a> {
    store: &'a dyn EntityStore,
    satellite_writes: SatelliteWrites,
}

impl<'a> HouseholdService<'a> {
    pub fn new(store: &'a dyn EntityStore, config: &HouseholdConfig) -> Self {
        Self {
            store,
            satellite_writes: config.satellite_writes,
        }
    }

    /// Add a family member (the add-member form).
    ///
    /// On success a head leaves `session` pointing at its new household.
    /// A session founds at most one household: once it has one, a second
    /// head is refused and the pointer is kept. Call
    /// [`HouseholdSession::reset`] to start another family.
    ///
    /// # Errors
    ///
    /// * `Validation` for blank names or a malformed email, or for a head
    ///   when `session` already has a household; nothing is written.
    /// * `MissingHousehold` for a non-head with no household in `session`;
    ///   nothing is written.
    /// * `Persistence` if the resident/household step fails; nothing is written.
    /// * `PartialWrite` if the resident was saved but satellites were not.
    pub fn register_member(
        &self,
        session: &mut HouseholdSession,
        form: &MemberForm,
    ) -> Result<Resident, CensusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::workflow_span("household.register_member").entered();

        let resident = form.to_resident(Uuid::new_v4())?;
        let current = session.current_household();
        if let (true, Some(household_id)) = (resident.is_head(), current) {
            log::warn!("second head refused; session already has household {household_id}");
            return Err(CensusError::validation(
                "relation",
                "this session already has a head of family; reset it to register another household",
            ));
        }
        let resident = in_transaction(self.store, |tx| insert_member(tx, resident, current))?;

        if resident.is_head() {
            if let Some(household_id) = resident.household_id {
                session.set_current_household(household_id);
            }
        }
        metrics::record_event("members_registered");
        log::info!(
            "registered {} ({}) in household {:?}",
            resident.resident_id,
            resident.relation,
            resident.household_id
        );

        self.write_satellites(resident.resident_id, &form.satellites(resident.resident_id))?;
        Ok(resident)
    }

    /// Edit a member's own fields and upsert its satellites.
    ///
    /// The household link and creation time never change here. Turning a
    /// member into a head (or a head into a member) is rejected.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, `Persistence` or `PartialWrite`.
    pub fn update_member(
        &self,
        resident_id: ResidentId,
        form: &MemberForm,
    ) -> Result<Resident, CensusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::workflow_span("household.update_member").entered();

        let existing = self
            .store
            .find_resident(resident_id)?
            .ok_or_else(|| CensusError::not_found("resident", resident_id))?;
        if existing.is_head() != form.relation.is_head() {
            return Err(CensusError::validation(
                "relation",
                "cannot change to or from Self; the household would lose or gain a head",
            ));
        }

        let mut updated = form.to_resident(resident_id)?;
        updated.household_id = existing.household_id;
        updated.created_at = existing.created_at;
        self.store.update_resident(&updated)?;

        self.write_satellites(resident_id, &form.satellites(resident_id))?;
        Ok(updated)
    }

    /// Update address and chapter of the session's household.
    ///
    /// # Errors
    ///
    /// `MissingHousehold` without a household in the session, `NotFound` if
    /// it no longer exists, `Persistence` on store failure.
    pub fn update_household_details(
        &self,
        session: &HouseholdSession,
        address: &str,
        chapter: &str,
    ) -> Result<Household, CensusError> {
        let household_id = session
            .current_household()
            .ok_or(CensusError::MissingHousehold)?;
        let mut household = self
            .store
            .find_household(household_id)?
            .ok_or_else(|| CensusError::not_found("household", household_id))?;
        household.address = address.trim().to_string();
        household.chapter = chapter.trim().to_string();
        self.store.update_household(&household)?;
        Ok(household)
    }

    /// The session's household with member ages and age-band counts on `as_of`.
    ///
    /// # Errors
    ///
    /// `MissingHousehold`, `NotFound` or `Persistence`.
    pub fn family_overview(
        &self,
        session: &HouseholdSession,
        as_of: NaiveDate,
    ) -> Result<FamilyOverview, CensusError> {
        let household_id = session
            .current_household()
            .ok_or(CensusError::MissingHousehold)?;
        let household = self
            .store
            .find_household(household_id)?
            .ok_or_else(|| CensusError::not_found("household", household_id))?;

        let mut members = Vec::new();
        for resident in self.store.residents_in_household(household_id)? {
            let occupation = self
                .store
                .find_occupation(resident.resident_id)?
                .and_then(|o| o.occupation);
            members.push(FamilyMember {
                age: resident.age_on(as_of),
                resident,
                occupation,
            });
        }

        let children = members.iter().filter(|m| m.age < 18).count();
        let elders = members.iter().filter(|m| m.age >= 60).count();
        let adults = members.len() - children - elders;

        Ok(FamilyOverview {
            household,
            members,
            children,
            adults,
            elders,
        })
    }

    fn write_satellites(
        &self,
        resident_id: ResidentId,
        rows: &SatelliteRows,
    ) -> Result<(), CensusError> {
        let failures = match self.satellite_writes {
            SatelliteWrites::BestEffort => rows.write(self.store, false),
            SatelliteWrites::Transactional => {
                let outcome = self.store.atomically(&mut |tx| {
                    let failures = rows.write(tx, true);
                    if failures.is_empty() {
                        Ok(())
                    } else {
                        Err(CensusError::PartialWrite {
                            resident_id,
                            failures,
                        })
                    }
                });
                match outcome {
                    Ok(()) => Vec::new(),
                    Err(CensusError::PartialWrite { failures, .. }) => failures,
                    Err(other) => CensusTable::SATELLITES
                        .iter()
                        .map(|table| SatelliteFailure {
                            table: *table,
                            error: other.to_string(),
                        })
                        .collect(),
                }
            }
        };

        if failures.is_empty() {
            return Ok(());
        }
        metrics::record_event("partial_writes");
        log::warn!(
            "resident {resident_id} saved with {} satellite failure(s)",
            failures.len()
        );
        Err(CensusError::PartialWrite {
            resident_id,
            failures,
        })
    }
}
