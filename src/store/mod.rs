//! Entity store boundary.
//!
//! [`EntityStore`] is the only way census workflows touch rows. Reads are
//! exact-match lookups; satellite writes are upserts keyed by `resident_id`.
//! [`MemoryStore`] and [`PgStore`] enforce the same keys and links.

mod memory;
mod postgres;
pub(crate) mod rows;
mod snapshot;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use snapshot::CensusSnapshot;

use crate::error::CensusError;
use crate::executor::StoreError;
use crate::model::{
    CredentialId, Education, GroupMembership, HealthRecord, Household, HouseholdId, Occupation,
    PendingRegistration, Resident, ResidentId, UserAccount,
};

pub trait EntityStore {
    fn insert_pending(&self, pending: &PendingRegistration) -> Result<(), StoreError>;
    fn find_pending(&self, id: CredentialId) -> Result<Option<PendingRegistration>, StoreError>;
    /// Every pending registration, most recent first.
    fn list_pending(&self) -> Result<Vec<PendingRegistration>, StoreError>;
    /// Returns the number of rows removed (0 or 1).
    fn delete_pending(&self, id: CredentialId) -> Result<u64, StoreError>;

    fn insert_resident(&self, resident: &Resident) -> Result<(), StoreError>;
    /// Rewrites every column except `resident_id`, `household_id` and `created_at`.
    fn update_resident(&self, resident: &Resident) -> Result<(), StoreError>;
    fn set_resident_household(
        &self,
        resident_id: ResidentId,
        household_id: HouseholdId,
    ) -> Result<(), StoreError>;
    fn find_resident(&self, id: ResidentId) -> Result<Option<Resident>, StoreError>;
    /// Ordered by `created_at`, then `resident_id`.
    fn list_residents(&self) -> Result<Vec<Resident>, StoreError>;
    fn residents_in_household(&self, household_id: HouseholdId) -> Result<Vec<Resident>, StoreError>;

    fn insert_household(&self, household: &Household) -> Result<(), StoreError>;
    /// Updates address and chapter. The member count is left alone.
    fn update_household(&self, household: &Household) -> Result<(), StoreError>;
    /// Adds one to `number_of_members` in place, without a read-modify-write.
    fn increment_members(&self, household_id: HouseholdId) -> Result<(), StoreError>;
    fn find_household(&self, id: HouseholdId) -> Result<Option<Household>, StoreError>;
    fn list_households(&self) -> Result<Vec<Household>, StoreError>;

    fn upsert_education(&self, row: &Education) -> Result<(), StoreError>;
    fn upsert_occupation(&self, row: &Occupation) -> Result<(), StoreError>;
    fn upsert_health(&self, row: &HealthRecord) -> Result<(), StoreError>;
    fn upsert_groups(&self, row: &GroupMembership) -> Result<(), StoreError>;
    fn find_education(&self, id: ResidentId) -> Result<Option<Education>, StoreError>;
    fn find_occupation(&self, id: ResidentId) -> Result<Option<Occupation>, StoreError>;
    fn find_health(&self, id: ResidentId) -> Result<Option<HealthRecord>, StoreError>;
    fn find_groups(&self, id: ResidentId) -> Result<Option<GroupMembership>, StoreError>;
    fn list_education(&self) -> Result<Vec<Education>, StoreError>;
    fn list_occupation(&self) -> Result<Vec<Occupation>, StoreError>;
    fn list_health(&self) -> Result<Vec<HealthRecord>, StoreError>;
    fn list_groups(&self) -> Result<Vec<GroupMembership>, StoreError>;

    fn insert_account(&self, account: &UserAccount) -> Result<(), StoreError>;
    fn find_account(&self, user_id: CredentialId) -> Result<Option<UserAccount>, StoreError>;
    /// Most recent first.
    fn list_accounts(&self) -> Result<Vec<UserAccount>, StoreError>;

    fn count_households(&self) -> Result<u64, StoreError>;
    fn count_residents(&self) -> Result<u64, StoreError>;
    fn count_pending(&self) -> Result<u64, StoreError>;
    fn count_lifemembers(&self) -> Result<u64, StoreError>;

    /// Run `work` all-or-nothing: every write it makes is committed when it
    /// returns `Ok`, and none are when it returns `Err`.
    fn atomically(
        &self,
        work: &mut dyn FnMut(&dyn EntityStore) -> Result<(), CensusError>,
    ) -> Result<(), CensusError>;
}

/// [`EntityStore::atomically`] for closures that produce a value.
pub fn in_transaction<S, R, F>(store: &S, work: F) -> Result<R, CensusError>
where
    S: EntityStore + ?Sized,
    F: FnOnce(&dyn EntityStore) -> Result<R, CensusError>,
{
    let mut work = Some(work);
    let mut output = None;
    store.atomically(&mut |tx| {
        let work = work
            .take()
            .ok_or_else(|| CensusError::Persistence(StoreError::Other("unit of work ran twice".into())))?;
        output = Some(work(tx)?);
        Ok(())
    })?;
    output.ok_or_else(|| {
        CensusError::Persistence(StoreError::Other("unit of work produced no result".into()))
    })
}
