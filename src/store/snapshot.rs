//! The full joined census dataset, read once per page load.

use super::EntityStore;
use crate::executor::StoreError;
use crate::model::{
    Education, GroupMembership, HealthRecord, Household, HouseholdId, Occupation, Resident,
    ResidentId, ResidentProfile,
};
use may::coroutine::JoinHandle;
use std::collections::HashMap;
use std::sync::Arc;

/// Every resident (in `created_at`, `resident_id` order), every household
/// and every satellite row.
#[derive(Debug, Clone, Default)]
pub struct CensusSnapshot {
    pub residents: Vec<Resident>,
    pub households: Vec<Household>,
    pub education: Vec<Education>,
    pub occupation: Vec<Occupation>,
    pub health: Vec<HealthRecord>,
    pub groups: Vec<GroupMembership>,
}

fn spawn_read<S, T, F>(store: &Arc<S>, read: F) -> JoinHandle<Result<T, StoreError>>
where
    S: EntityStore + Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    may::go!(move || read(&store))
}

fn join<T>(handle: JoinHandle<Result<T, StoreError>>, table: &str) -> Result<T, StoreError> {
    match handle.join() {
        Ok(result) => result,
        Err(e) => Err(StoreError::Other(format!("reading {table} panicked: {e:?}"))),
    }
}

impl CensusSnapshot {
    /// Read every table one after another.
    ///
    /// # Errors
    ///
    /// Returns the first `StoreError` any read produces.
    pub fn load(store: &dyn EntityStore) -> Result<Self, StoreError> {
        Ok(Self {
            residents: store.list_residents()?,
            households: store.list_households()?,
            education: store.list_education()?,
            occupation: store.list_occupation()?,
            health: store.list_health()?,
            groups: store.list_groups()?,
        })
    }

    /// Read every table in its own coroutine and wait for all of them.
    ///
    /// # Errors
    ///
    /// Returns the first `StoreError` in table order, after every read finished.
    pub fn load_concurrent<S>(store: Arc<S>) -> Result<Self, StoreError>
    where
        S: EntityStore + Send + Sync + 'static,
    {
        let residents = spawn_read(&store, |s| s.list_residents());
        let households = spawn_read(&store, |s| s.list_households());
        let education = spawn_read(&store, |s| s.list_education());
        let occupation = spawn_read(&store, |s| s.list_occupation());
        let health = spawn_read(&store, |s| s.list_health());
        let groups = spawn_read(&store, |s| s.list_groups());

        let residents = join(residents, "residents");
        let households = join(households, "households");
        let education = join(education, "education");
        let occupation = join(occupation, "occupation");
        let health = join(health, "health_records");
        let groups = join(groups, "group_memberships");

        Ok(Self {
            residents: residents?,
            households: households?,
            education: education?,
            occupation: occupation?,
            health: health?,
            groups: groups?,
        })
    }

    pub fn household(&self, id: HouseholdId) -> Option<&Household> {
        self.households.iter().find(|h| h.household_id == id)
    }

    pub fn resident(&self, id: ResidentId) -> Option<&Resident> {
        self.residents.iter().find(|r| r.resident_id == id)
    }

    /// Occupation rows in resident order; rows for unknown residents last.
    pub fn occupations_in_resident_order(&self) -> Vec<&Occupation> {
        ordered_by_resident(&self.residents, &self.occupation, |o| o.resident_id)
    }

    /// Education rows in resident order; rows for unknown residents last.
    pub fn education_in_resident_order(&self) -> Vec<&Education> {
        ordered_by_resident(&self.residents, &self.education, |e| e.resident_id)
    }

    /// One profile per resident, in resident order.
    pub fn profiles(&self) -> Vec<ResidentProfile> {
        let households: HashMap<HouseholdId, &Household> =
            self.households.iter().map(|h| (h.household_id, h)).collect();
        let education = index(&self.education, |e| e.resident_id);
        let occupation = index(&self.occupation, |o| o.resident_id);
        let health = index(&self.health, |h| h.resident_id);
        let groups = index(&self.groups, |g| g.resident_id);

        self.residents
            .iter()
            .map(|r| {
                let id = r.resident_id;
                ResidentProfile {
                    resident: r.clone(),
                    household: r
                        .household_id
                        .and_then(|h| households.get(&h))
                        .map(|h| (*h).clone()),
                    education: education.get(&id).map(|e| (*e).clone()),
                    occupation: occupation.get(&id).map(|o| (*o).clone()),
                    health: health.get(&id).map(|h| (*h).clone()),
                    groups: groups.get(&id).map(|g| (*g).clone()),
                }
            })
            .collect()
    }
}

fn index<T>(rows: &[T], key: impl Fn(&T) -> ResidentId) -> HashMap<ResidentId, &T> {
    rows.iter().map(|row| (key(row), row)).collect()
}

fn ordered_by_resident<'a, T>(
    residents: &[Resident],
    rows: &'a [T],
    key: impl Fn(&T) -> ResidentId,
) -> Vec<&'a T> {
    let position: HashMap<ResidentId, usize> = residents
        .iter()
        .enumerate()
        .map(|(i, r)| (r.resident_id, i))
        .collect();
    let mut ordered: Vec<&T> = rows.iter().collect();
    ordered.sort_by_key(|row| position.get(&key(row)).copied().unwrap_or(usize::MAX));
    ordered
}
