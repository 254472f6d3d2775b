use crate::support::{member, with_job, with_qualification};
use census::analytics::AnalyticsReport;
use census::config::{AnalyticsConfig, HouseholdConfig};
use census::model::{
    CredentialId, Education, GroupMembership, HealthRecord, Household, HouseholdId, Occupation,
    OccupationKind, PendingRegistration, Relation, Resident, ResidentId, UserAccount,
};
use census::{
    CensusError, Dashboard, EntityStore, HouseholdListing, HouseholdService, HouseholdSession,
    MemoryStore, ResidentsDirectory, StoreError,
};
use chrono::{NaiveDate, Utc};

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, 15).unwrap()
}

fn populated_store() -> MemoryStore {
    let store = MemoryStore::new();
    let households = HouseholdService::new(&store, &HouseholdConfig::default());
    let mut session = HouseholdSession::default();

    let head = with_job(member(Relation::Head, 1970), OccupationKind::BusinessOwner, "Grocer");
    households
        .register_member(&mut session, &with_qualification(head, "b.tech", 1992))
        .unwrap();
    let spouse = with_job(member(Relation::Spouse, 1972), OccupationKind::Homemaker, "N/A");
    households
        .register_member(&mut session, &with_qualification(spouse, "10th", 1988))
        .unwrap();
    let son = with_job(member(Relation::Son, 2001), OccupationKind::Employed, "Engineer");
    households
        .register_member(&mut session, &with_qualification(son, "random text", 2023))
        .unwrap();
    households
        .register_member(&mut session, &member(Relation::Daughter, 2015))
        .unwrap();

    households
        .update_household_details(&session, "Temple Road", "Shirva")
        .unwrap();
    store
}

#[test]
fn report_over_a_registered_family() {
    let store = populated_store();
    let report = AnalyticsReport::load(&store, &AnalyticsConfig::default(), as_of()).unwrap();

    let stats = report.occupation.stats;
    assert_eq!((stats.employed, stats.unemployed), (2, 1));
    assert_eq!(stats.rate, 67);
    assert_eq!(report.occupation.top_profession.as_deref(), Some("Grocer"));
    assert_eq!(report.occupation.trend.len(), 5);
    assert_eq!(report.occupation.trend.last().unwrap().year, 2024);

    let levels: Vec<&str> = report
        .education
        .levels
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(levels, vec!["B.Tech", "Secondary", "Random Text"]);
    // Three of four residents have a qualification.
    assert_eq!(report.education.literacy.overall, 75);

    assert_eq!(report.students.total, 4);
    assert_eq!(report.businesses.entries.len(), 4);
}

#[test]
fn admin_views_read_the_same_data() {
    let store = populated_store();

    let directory = ResidentsDirectory::load(&store).unwrap();
    assert_eq!(directory.rows.len(), 4);
    assert_eq!(directory.search("grocer").len(), 1);

    let listing = HouseholdListing::load(&store).unwrap();
    assert_eq!(listing.chapters, vec!["Shirva"]);
    assert_eq!(listing.filter("temple", Some("Shirva")).len(), 1);

    let dashboard = Dashboard::load(&store, Utc::now()).unwrap();
    assert_eq!(dashboard.counts.total_households, 1);
    assert_eq!(dashboard.counts.total_residents, 4);
    assert_eq!(dashboard.recent_activity.len(), 1);
}

/// Every read fails, as when the database is unreachable.
struct UnreachableStore;

fn down<T>() -> Result<T, StoreError> {
    Err(StoreError::Other("connection refused".into()))
}

impl EntityStore for UnreachableStore {
    fn insert_pending(&self, _: &PendingRegistration) -> Result<(), StoreError> {
        down()
    }
    fn find_pending(&self, _: CredentialId) -> Result<Option<PendingRegistration>, StoreError> {
        down()
    }
    fn list_pending(&self) -> Result<Vec<PendingRegistration>, StoreError> {
        down()
    }
    fn delete_pending(&self, _: CredentialId) -> Result<u64, StoreError> {
        down()
    }
    fn insert_resident(&self, _: &Resident) -> Result<(), StoreError> {
        down()
    }
    fn update_resident(&self, _: &Resident) -> Result<(), StoreError> {
        down()
    }
    fn set_resident_household(&self, _: ResidentId, _: HouseholdId) -> Result<(), StoreError> {
        down()
    }
    fn find_resident(&self, _: ResidentId) -> Result<Option<Resident>, StoreError> {
        down()
    }
    fn list_residents(&self) -> Result<Vec<Resident>, StoreError> {
        down()
    }
    fn residents_in_household(&self, _: HouseholdId) -> Result<Vec<Resident>, StoreError> {
        down()
    }
    fn insert_household(&self, _: &Household) -> Result<(), StoreError> {
        down()
    }
    fn update_household(&self, _: &Household) -> Result<(), StoreError> {
        down()
    }
    fn increment_members(&self, _: HouseholdId) -> Result<(), StoreError> {
        down()
    }
    fn find_household(&self, _: HouseholdId) -> Result<Option<Household>, StoreError> {
        down()
    }
    fn list_households(&self) -> Result<Vec<Household>, StoreError> {
        down()
    }
    fn upsert_education(&self, _: &Education) -> Result<(), StoreError> {
        down()
    }
    fn upsert_occupation(&self, _: &Occupation) -> Result<(), StoreError> {
        down()
    }
    fn upsert_health(&self, _: &HealthRecord) -> Result<(), StoreError> {
        down()
    }
    fn upsert_groups(&self, _: &GroupMembership) -> Result<(), StoreError> {
        down()
    }
    fn find_education(&self, _: ResidentId) -> Result<Option<Education>, StoreError> {
        down()
    }
    fn find_occupation(&self, _: ResidentId) -> Result<Option<Occupation>, StoreError> {
        down()
    }
    fn find_health(&self, _: ResidentId) -> Result<Option<HealthRecord>, StoreError> {
        down()
    }
    fn find_groups(&self, _: ResidentId) -> Result<Option<GroupMembership>, StoreError> {
        down()
    }
    fn list_education(&self) -> Result<Vec<Education>, StoreError> {
        down()
    }
    fn list_occupation(&self) -> Result<Vec<Occupation>, StoreError> {
        down()
    }
    fn list_health(&self) -> Result<Vec<HealthRecord>, StoreError> {
        down()
    }
    fn list_groups(&self) -> Result<Vec<GroupMembership>, StoreError> {
        down()
    }
    fn insert_account(&self, _: &UserAccount) -> Result<(), StoreError> {
        down()
    }
    fn find_account(&self, _: CredentialId) -> Result<Option<UserAccount>, StoreError> {
        down()
    }
    fn list_accounts(&self) -> Result<Vec<UserAccount>, StoreError> {
        down()
    }
    fn count_households(&self) -> Result<u64, StoreError> {
        down()
    }
    fn count_residents(&self) -> Result<u64, StoreError> {
        down()
    }
    fn count_pending(&self) -> Result<u64, StoreError> {
        down()
    }
    fn count_lifemembers(&self) -> Result<u64, StoreError> {
        down()
    }
    fn atomically(
        &self,
        _: &mut dyn FnMut(&dyn EntityStore) -> Result<(), CensusError>,
    ) -> Result<(), CensusError> {
        Err(CensusError::Persistence(StoreError::Other(
            "connection refused".into(),
        )))
    }
}

#[test]
fn unreachable_store_degrades_to_empty_report() {
    let report =
        AnalyticsReport::load_or_default(&UnreachableStore, &AnalyticsConfig::default(), as_of());
    assert_eq!(report.occupation.stats.rate, 0);
    assert!(report.occupation.professions.is_empty());
    assert!(report.occupation.trend.is_empty());
    assert!(report.education.levels.is_empty());
    assert_eq!(report.education.literacy.overall, 0);
    assert!(report.businesses.entries.is_empty());

    assert!(AnalyticsReport::load(&UnreachableStore, &AnalyticsConfig::default(), as_of()).is_err());
}
