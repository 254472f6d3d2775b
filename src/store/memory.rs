use super::EntityStore;
use crate::error::CensusError;
use crate::executor::StoreError;
use crate::model::{
    CredentialId, Education, GroupMembership, HealthRecord, Household, HouseholdId, Occupation,
    PendingRegistration, Resident, ResidentId, UserAccount,
};
use crate::schema::CensusTable;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    pending: Vec<PendingRegistration>,
    residents: Vec<Resident>,
    households: Vec<Household>,
    education: Vec<Education>,
    occupation: Vec<Occupation>,
    health: Vec<HealthRecord>,
    groups: Vec<GroupMembership>,
    accounts: Vec<UserAccount>,
}

impl Tables {
    fn resident_exists(&self, id: ResidentId) -> bool {
        self.residents.iter().any(|r| r.resident_id == id)
    }

    fn household_exists(&self, id: HouseholdId) -> bool {
        self.households.iter().any(|h| h.household_id == id)
    }

    fn require_resident(&self, table: CensusTable, id: ResidentId) -> Result<(), StoreError> {
        if self.resident_exists(id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!(
                "{table}.resident_id {id} references no resident"
            )))
        }
    }
}

/// In-process entity store.
///
/// Applies the same primary keys, unique head-of-family rule and foreign
/// keys as the SQL schema. [`EntityStore::atomically`] runs the unit of work
/// against a staged copy and swaps it in on success, holding the table lock
/// throughout so units of work are serialized.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<HashSet<CensusTable>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Other("memory store lock poisoned".to_string())
}

fn upsert_by_resident<T: Clone>(rows: &mut Vec<T>, row: &T, key: impl Fn(&T) -> ResidentId) {
    let id = key(row);
    match rows.iter_mut().find(|r| key(r) == id) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

fn find_by_resident<T: Clone>(rows: &[T], id: ResidentId, key: impl Fn(&T) -> ResidentId) -> Option<T> {
    rows.iter().find(|r| key(r) == id).cloned()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write to `table` fail until [`clear_faults`](Self::clear_faults).
    pub fn fail_writes_to(&self, table: CensusTable) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(table);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables.lock().map_err(poisoned)
    }

    /// Lock the tables for a write to `table`, failing if a fault is injected.
    fn write(&self, table: CensusTable) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.faults.lock().map_err(poisoned)?.contains(&table) {
            return Err(StoreError::Other(format!("injected failure writing to {table}")));
        }
        self.tables()
    }

    fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> Result<R, StoreError> {
        Ok(f(&self.tables()?))
    }
}

impl EntityStore for MemoryStore {
    fn insert_pending(&self, pending: &PendingRegistration) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::PendingRegistrations)?;
        if t.pending.iter().any(|p| p.id == pending.id) {
            return Err(StoreError::Constraint(format!(
                "pending registration {} already exists",
                pending.id
            )));
        }
        t.pending.push(pending.clone());
        Ok(())
    }

    fn find_pending(&self, id: CredentialId) -> Result<Option<PendingRegistration>, StoreError> {
        self.read(|t| t.pending.iter().find(|p| p.id == id).cloned())
    }

    fn list_pending(&self) -> Result<Vec<PendingRegistration>, StoreError> {
        self.read(|t| {
            let mut rows = t.pending.clone();
            rows.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));
            rows
        })
    }

    fn delete_pending(&self, id: CredentialId) -> Result<u64, StoreError> {
        let mut t = self.write(CensusTable::PendingRegistrations)?;
        let before = t.pending.len();
        t.pending.retain(|p| p.id != id);
        Ok((before - t.pending.len()) as u64)
    }

    fn insert_resident(&self, resident: &Resident) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::Residents)?;
        if t.resident_exists(resident.resident_id) {
            return Err(StoreError::Constraint(format!(
                "resident {} already exists",
                resident.resident_id
            )));
        }
        if let Some(household_id) = resident.household_id {
            if !t.household_exists(household_id) {
                return Err(StoreError::Constraint(format!(
                    "residents.household_id {household_id} references no household"
                )));
            }
        }
        t.residents.push(resident.clone());
        Ok(())
    }

    fn update_resident(&self, resident: &Resident) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::Residents)?;
        let existing = t
            .residents
            .iter_mut()
            .find(|r| r.resident_id == resident.resident_id)
            .ok_or_else(|| StoreError::NotFound {
                table: "residents",
                key: resident.resident_id.to_string(),
            })?;
        let household_id = existing.household_id;
        let created_at = existing.created_at;
        *existing = resident.clone();
        existing.household_id = household_id;
        existing.created_at = created_at;
        Ok(())
    }

    fn set_resident_household(
        &self,
        resident_id: ResidentId,
        household_id: HouseholdId,
    ) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::Residents)?;
        if !t.household_exists(household_id) {
            return Err(StoreError::Constraint(format!(
                "residents.household_id {household_id} references no household"
            )));
        }
        let resident = t
            .residents
            .iter_mut()
            .find(|r| r.resident_id == resident_id)
            .ok_or_else(|| StoreError::NotFound {
                table: "residents",
                key: resident_id.to_string(),
            })?;
        resident.household_id = Some(household_id);
        Ok(())
    }

    fn find_resident(&self, id: ResidentId) -> Result<Option<Resident>, StoreError> {
        self.read(|t| t.residents.iter().find(|r| r.resident_id == id).cloned())
    }

    fn list_residents(&self) -> Result<Vec<Resident>, StoreError> {
        self.read(|t| {
            let mut rows = t.residents.clone();
            rows.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.resident_id.cmp(&b.resident_id))
            });
            rows
        })
    }

    fn residents_in_household(&self, household_id: HouseholdId) -> Result<Vec<Resident>, StoreError> {
        Ok(self
            .list_residents()?
            .into_iter()
            .filter(|r| r.household_id == Some(household_id))
            .collect())
    }

    fn insert_household(&self, household: &Household) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::Households)?;
        if t.household_exists(household.household_id) {
            return Err(StoreError::Constraint(format!(
                "household {} already exists",
                household.household_id
            )));
        }
        if t
            .households
            .iter()
            .any(|h| h.head_of_family_id == household.head_of_family_id)
        {
            return Err(StoreError::Constraint(format!(
                "resident {} already heads a household",
                household.head_of_family_id
            )));
        }
        if !t.resident_exists(household.head_of_family_id) {
            return Err(StoreError::Constraint(format!(
                "households.head_of_family_id {} references no resident",
                household.head_of_family_id
            )));
        }
        t.households.push(household.clone());
        Ok(())
    }

    fn update_household(&self, household: &Household) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::Households)?;
        let existing = t
            .households
            .iter_mut()
            .find(|h| h.household_id == household.household_id)
            .ok_or_else(|| StoreError::NotFound {
                table: "households",
                key: household.household_id.to_string(),
            })?;
        existing.address = household.address.clone();
        existing.chapter = household.chapter.clone();
        Ok(())
    }

    fn increment_members(&self, id: HouseholdId) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::Households)?;
        let household = t
            .households
            .iter_mut()
            .find(|h| h.household_id == id)
            .ok_or_else(|| StoreError::NotFound {
                table: "households",
                key: id.to_string(),
            })?;
        household.number_of_members += 1;
        Ok(())
    }

    fn find_household(&self, id: HouseholdId) -> Result<Option<Household>, StoreError> {
        self.read(|t| t.households.iter().find(|h| h.household_id == id).cloned())
    }

    fn list_households(&self) -> Result<Vec<Household>, StoreError> {
        self.read(|t| t.households.clone())
    }

    fn upsert_education(&self, row: &Education) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::Education)?;
        t.require_resident(CensusTable::Education, row.resident_id)?;
        upsert_by_resident(&mut t.education, row, |r| r.resident_id);
        Ok(())
    }

    fn upsert_occupation(&self, row: &Occupation) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::Occupation)?;
        t.require_resident(CensusTable::Occupation, row.resident_id)?;
        upsert_by_resident(&mut t.occupation, row, |r| r.resident_id);
        Ok(())
    }

    fn upsert_health(&self, row: &HealthRecord) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::HealthRecords)?;
        t.require_resident(CensusTable::HealthRecords, row.resident_id)?;
        upsert_by_resident(&mut t.health, row, |r| r.resident_id);
        Ok(())
    }

    fn upsert_groups(&self, row: &GroupMembership) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::GroupMemberships)?;
        t.require_resident(CensusTable::GroupMemberships, row.resident_id)?;
        upsert_by_resident(&mut t.groups, row, |r| r.resident_id);
        Ok(())
    }

    fn find_education(&self, id: ResidentId) -> Result<Option<Education>, StoreError> {
        self.read(|t| find_by_resident(&t.education, id, |r| r.resident_id))
    }

    fn find_occupation(&self, id: ResidentId) -> Result<Option<Occupation>, StoreError> {
        self.read(|t| find_by_resident(&t.occupation, id, |r| r.resident_id))
    }

    fn find_health(&self, id: ResidentId) -> Result<Option<HealthRecord>, StoreError> {
        self.read(|t| find_by_resident(&t.health, id, |r| r.resident_id))
    }

    fn find_groups(&self, id: ResidentId) -> Result<Option<GroupMembership>, StoreError> {
        self.read(|t| find_by_resident(&t.groups, id, |r| r.resident_id))
    }

    fn list_education(&self) -> Result<Vec<Education>, StoreError> {
        self.read(|t| t.education.clone())
    }

    fn list_occupation(&self) -> Result<Vec<Occupation>, StoreError> {
        self.read(|t| t.occupation.clone())
    }

    fn list_health(&self) -> Result<Vec<HealthRecord>, StoreError> {
        self.read(|t| t.health.clone())
    }

    fn list_groups(&self) -> Result<Vec<GroupMembership>, StoreError> {
        self.read(|t| t.groups.clone())
    }

    fn insert_account(&self, account: &UserAccount) -> Result<(), StoreError> {
        let mut t = self.write(CensusTable::UserAccounts)?;
        if t.accounts.iter().any(|a| a.user_id == account.user_id) {
            return Err(StoreError::Constraint(format!(
                "user account {} already exists",
                account.user_id
            )));
        }
        if let Some(resident_id) = account.resident_id {
            t.require_resident(CensusTable::UserAccounts, resident_id)?;
        }
        t.accounts.push(account.clone());
        Ok(())
    }

    fn find_account(&self, user_id: CredentialId) -> Result<Option<UserAccount>, StoreError> {
        self.read(|t| t.accounts.iter().find(|a| a.user_id == user_id).cloned())
    }

    fn list_accounts(&self) -> Result<Vec<UserAccount>, StoreError> {
        self.read(|t| {
            let mut rows = t.accounts.clone();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            rows
        })
    }

    fn count_households(&self) -> Result<u64, StoreError> {
        self.read(|t| t.households.len() as u64)
    }

    fn count_residents(&self) -> Result<u64, StoreError> {
        self.read(|t| t.residents.len() as u64)
    }

    fn count_pending(&self) -> Result<u64, StoreError> {
        self.read(|t| t.pending.len() as u64)
    }

    fn count_lifemembers(&self) -> Result<u64, StoreError> {
        self.read(|t| t.residents.iter().filter(|r| r.lifemember).count() as u64)
    }

    fn atomically(
        &self,
        work: &mut dyn FnMut(&dyn EntityStore) -> Result<(), CensusError>,
    ) -> Result<(), CensusError> {
        let mut tables = self.tables()?;
        let staging = MemoryStore {
            tables: Mutex::new(tables.clone()),
            faults: Mutex::new(self.faults.lock().map_err(poisoned)?.clone()),
        };

        work(&staging)?;

        *tables = staging.tables.into_inner().map_err(poisoned)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gender, MaritalStatus, Relation, YesNo};
    use crate::store::in_transaction;
    use chrono::{Duration, NaiveDate, Utc};
    use uuid::Uuid;

    fn resident(relation: Relation, household_id: Option<HouseholdId>) -> Resident {
        Resident {
            resident_id: Uuid::new_v4(),
            first_name: "Asha".into(),
            middle_name: None,
            last_name: "Rao".into(),
            gender: Gender::Female,
            relation,
            marital_status: MaritalStatus::Married,
            date_of_birth: NaiveDate::from_ymd_opt(1985, 3, 2).unwrap(),
            phone_number: None,
            email: None,
            lifemember: false,
            household_id,
            created_at: Utc::now(),
        }
    }

    fn pending(minutes_ago: i64) -> PendingRegistration {
        PendingRegistration {
            id: Uuid::new_v4(),
            first_name: "P".into(),
            last_name: "R".into(),
            email: format!("{minutes_ago}@example.com"),
            phone_number: "123".into(),
            registered_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn pending_is_listed_most_recent_first() {
        let store = MemoryStore::new();
        let old = pending(30);
        let new = pending(1);
        store.insert_pending(&old).unwrap();
        store.insert_pending(&new).unwrap();

        let listed = store.list_pending().unwrap();
        assert_eq!(listed[0].id, new.id);
        assert_eq!(listed[1].id, old.id);

        assert_eq!(store.delete_pending(old.id).unwrap(), 1);
        assert_eq!(store.delete_pending(old.id).unwrap(), 0);
    }

    #[test]
    fn resident_household_must_exist() {
        let store = MemoryStore::new();
        let orphan = resident(Relation::Son, Some(Uuid::new_v4()));
        let err = store.insert_resident(&orphan).unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
        assert_eq!(store.count_residents().unwrap(), 0);
    }

    #[test]
    fn one_household_per_head() {
        let store = MemoryStore::new();
        let head = resident(Relation::Head, None);
        store.insert_resident(&head).unwrap();
        store.insert_household(&Household::founded_by(head.resident_id)).unwrap();

        let err = store
            .insert_household(&Household::founded_by(head.resident_id))
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(ref m) if m.contains("already heads")));
    }

    #[test]
    fn member_count_moves_only_through_increment() {
        let store = MemoryStore::new();
        let head = resident(Relation::Head, None);
        store.insert_resident(&head).unwrap();
        let household = Household::founded_by(head.resident_id);
        store.insert_household(&household).unwrap();

        store.increment_members(household.household_id).unwrap();
        store.increment_members(household.household_id).unwrap();

        // A stale copy carrying the founding count must not undo the increments.
        let mut stale = household.clone();
        stale.address = "4 Car Street".into();
        store.update_household(&stale).unwrap();

        let stored = store.find_household(household.household_id).unwrap().unwrap();
        assert_eq!(stored.number_of_members, 3);
        assert_eq!(stored.address, "4 Car Street");

        let err = store.increment_members(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { table: "households", .. }));
    }

    #[test]
    fn satellite_upserts_never_duplicate() {
        let store = MemoryStore::new();
        let r = resident(Relation::Head, None);
        store.insert_resident(&r).unwrap();

        let mut health = HealthRecord {
            resident_id: r.resident_id,
            blood_group: None,
            mediclaim: YesNo::No,
            thalassemia: None,
            g6pd: YesNo::No,
        };
        store.upsert_health(&health).unwrap();
        health.mediclaim = YesNo::Yes;
        store.upsert_health(&health).unwrap();

        let rows = store.list_health().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mediclaim, YesNo::Yes);
    }

    #[test]
    fn satellites_require_a_resident() {
        let store = MemoryStore::new();
        let err = store
            .upsert_groups(&GroupMembership {
                resident_id: Uuid::new_v4(),
                ..GroupMembership::default()
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[test]
    fn update_resident_keeps_household_and_creation_time() {
        let store = MemoryStore::new();
        let head = resident(Relation::Head, None);
        store.insert_resident(&head).unwrap();
        let household = Household::founded_by(head.resident_id);
        store.insert_household(&household).unwrap();
        store
            .set_resident_household(head.resident_id, household.household_id)
            .unwrap();

        let mut edited = head.clone();
        edited.first_name = "Usha".into();
        edited.household_id = None;
        store.update_resident(&edited).unwrap();

        let stored = store.find_resident(head.resident_id).unwrap().unwrap();
        assert_eq!(stored.first_name, "Usha");
        assert_eq!(stored.household_id, Some(household.household_id));
        assert_eq!(stored.created_at, head.created_at);
    }

    #[test]
    fn failed_unit_of_work_leaves_no_trace() {
        let store = MemoryStore::new();
        let r = resident(Relation::Head, None);

        let result = store.atomically(&mut |tx| {
            tx.insert_resident(&r)?;
            Err(CensusError::MissingHousehold)
        });
        assert!(matches!(result, Err(CensusError::MissingHousehold)));
        assert_eq!(store.count_residents().unwrap(), 0);
    }

    #[test]
    fn successful_unit_of_work_commits_everything() {
        let store = MemoryStore::new();
        let head = resident(Relation::Head, None);

        let household_id = in_transaction(&store, |tx| {
            tx.insert_resident(&head)?;
            let household = Household::founded_by(head.resident_id);
            tx.insert_household(&household)?;
            tx.set_resident_household(head.resident_id, household.household_id)?;
            Ok(household.household_id)
        })
        .unwrap();

        let stored = store.find_resident(head.resident_id).unwrap().unwrap();
        assert_eq!(stored.household_id, Some(household_id));
        assert_eq!(store.count_households().unwrap(), 1);
    }

    #[test]
    fn injected_faults_fail_only_their_table() {
        let store = MemoryStore::new();
        store.fail_writes_to(CensusTable::Education);
        let r = resident(Relation::Head, None);
        store.insert_resident(&r).unwrap();

        let err = store
            .upsert_education(&Education {
                resident_id: r.resident_id,
                highest_qualification: Some("B.Com".into()),
                school_or_college_name: None,
                year_of_completion: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("education"));

        store.clear_faults();
        assert!(store
            .upsert_education(&Education {
                resident_id: r.resident_id,
                highest_qualification: None,
                school_or_college_name: None,
                year_of_completion: None,
            })
            .is_ok());
    }
}
