//! Integration tests for the PostgreSQL store and credential provider.
//!
//! These tests need a live database. Point `TEST_DATABASE_URL` at a scratch
//! database; every test drops and recreates the census tables, so never
//! aim it at real data. Without the variable the tests are skipped.

use census::auth::password::MIN_COST;
use census::auth::CredentialProvider;
use census::config::{DatabaseConfig, HouseholdConfig, RegistrationConfig};
use census::household::{EducationDetails, GroupFlags, HealthDetails, OccupationDetails};
use census::model::{Gender, MaritalStatus, PendingRegistration, Relation, Role};
use census::schema::{create_schema, drop_schema};
use census::store::in_transaction;
use census::{
    ApprovalDetails, CensusError, EntityStore, HouseholdService, HouseholdSession,
    MayPostgresExecutor, MemberForm, PgCredentials, PgStore, RegistrationForm, Registrations,
    StoreError,
};
use chrono::{NaiveDate, Utc};
use std::env;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Tests share one database, so they run one at a time.
static DATABASE: Mutex<()> = Mutex::new(());

fn connect(url: &str) -> MayPostgresExecutor {
    let config = DatabaseConfig {
        url: url.to_string(),
        ..DatabaseConfig::default()
    };
    MayPostgresExecutor::connect_with(&config).expect("Failed to connect to test database")
}

/// A freshly created schema, or `None` when no database is configured.
fn fresh_database() -> Option<(MutexGuard<'static, ()>, String)> {
    let Ok(url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return None;
    };
    let guard = DATABASE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let executor = connect(&url);
    drop_schema(&executor).expect("Failed to drop schema");
    create_schema(&executor).expect("Failed to create schema");
    Some((guard, url))
}

fn member(first_name: &str, relation: Relation, born: i32) -> MemberForm {
    MemberForm {
        first_name: first_name.to_string(),
        middle_name: None,
        last_name: "Kamath".to_string(),
        gender: Gender::Female,
        relation,
        marital_status: MaritalStatus::Married,
        date_of_birth: NaiveDate::from_ymd_opt(born, 6, 1).unwrap(),
        phone_number: None,
        email: None,
        lifemember: true,
        education: EducationDetails {
            highest_qualification: Some("B.Com".to_string()),
            school_or_college_name: None,
            year_of_completion: Some(born + 21),
        },
        occupation: OccupationDetails::default(),
        health: HealthDetails::default(),
        groups: GroupFlags::default(),
    }
}

#[test]
fn create_schema_is_repeatable() {
    let Some((_guard, url)) = fresh_database() else {
        return;
    };
    let executor = connect(&url);
    create_schema(&executor).expect("second create_schema should be a no-op");

    let store = PgStore::new(executor);
    assert_eq!(store.count_households().unwrap(), 0);
    assert_eq!(store.count_residents().unwrap(), 0);
    assert_eq!(store.count_pending().unwrap(), 0);
}

#[test]
fn household_registration_round_trip() {
    let Some((_guard, url)) = fresh_database() else {
        return;
    };
    let store = PgStore::new(connect(&url));
    let households = HouseholdService::new(&store, &HouseholdConfig::default());
    let mut session = HouseholdSession::default();

    let orphan = households
        .register_member(&mut session, &member("Asha", Relation::Daughter, 2010))
        .unwrap_err();
    assert!(matches!(orphan, CensusError::MissingHousehold));
    assert_eq!(store.count_residents().unwrap(), 0);

    let head = households
        .register_member(&mut session, &member("Alice", Relation::Head, 1975))
        .unwrap();
    let spouse = households
        .register_member(&mut session, &member("Bob", Relation::Spouse, 1973))
        .unwrap();
    let household_id = head.household_id.unwrap();
    assert_eq!(spouse.household_id, Some(household_id));

    let household = store.find_household(household_id).unwrap().unwrap();
    assert_eq!(household.head_of_family_id, head.resident_id);
    assert_eq!(household.number_of_members, 2);
    assert_eq!(store.count_lifemembers().unwrap(), 2);

    let education = store.find_education(spouse.resident_id).unwrap().unwrap();
    assert_eq!(education.year_of_completion, Some(1994));

    households
        .update_household_details(&session, " 12 Temple Road ", "Shirva")
        .unwrap();
    let household = store.find_household(household_id).unwrap().unwrap();
    assert_eq!(household.address, "12 Temple Road");
}

#[test]
fn concurrent_members_are_all_counted() {
    let Some((_guard, url)) = fresh_database() else {
        return;
    };
    let store = PgStore::new(connect(&url));
    let households = HouseholdService::new(&store, &HouseholdConfig::default());
    let mut session = HouseholdSession::default();
    let head = households
        .register_member(&mut session, &member("Alice", Relation::Head, 1975))
        .unwrap();
    let household_id = head.household_id.unwrap();

    // Each coroutine has its own connection, so the inserts really overlap.
    let handles: Vec<_> = ["Bob", "Chitra"]
        .into_iter()
        .map(|first_name| {
            let url = url.clone();
            may::go!(move || {
                let store = PgStore::new(connect(&url));
                let households = HouseholdService::new(&store, &HouseholdConfig::default());
                let mut session = HouseholdSession::default();
                session.set_current_household(household_id);
                for born in 2000..2004 {
                    households
                        .register_member(&mut session, &member(first_name, Relation::Son, born))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let household = store.find_household(household_id).unwrap().unwrap();
    assert_eq!(household.number_of_members, 9);
    assert_eq!(store.residents_in_household(household_id).unwrap().len(), 9);
}

#[test]
fn failed_unit_of_work_leaves_no_rows() {
    let Some((_guard, url)) = fresh_database() else {
        return;
    };
    let store = PgStore::new(connect(&url));

    let result: Result<(), CensusError> = in_transaction(&store, |tx| {
        tx.insert_pending(&PendingRegistration {
            id: Uuid::new_v4(),
            first_name: "Ravi".into(),
            last_name: "Nayak".into(),
            email: "ravi@example.com".into(),
            phone_number: "9845000000".into(),
            registered_at: Utc::now(),
        })?;
        Err(CensusError::Persistence(StoreError::Other("abort".into())))
    });

    assert!(result.is_err());
    assert_eq!(store.count_pending().unwrap(), 0);
}

#[test]
fn approval_creates_account_and_household() {
    let Some((_guard, url)) = fresh_database() else {
        return;
    };
    let store = PgStore::new(connect(&url));
    let credentials = PgCredentials::with_cost(connect(&url), MIN_COST);
    let registrations = Registrations::new(&store, &credentials, &RegistrationConfig::default());

    let form = RegistrationForm {
        first_name: "Sunita".into(),
        last_name: "Bhat".into(),
        email: "Sunita@Example.com".into(),
        password: "mangalore".into(),
        phone_number: "9845011111".into(),
    };
    let pending = registrations.submit(&form).unwrap();
    assert_eq!(pending.email, "sunita@example.com");
    assert_eq!(registrations.list_pending().unwrap().len(), 1);

    let details = ApprovalDetails {
        gender: Some(Gender::Female),
        date_of_birth: NaiveDate::from_ymd_opt(1980, 3, 14),
        ..ApprovalDetails::default()
    };
    let approval = registrations.approve(pending.id, &details).unwrap();
    assert_eq!(approval.account.role, Role::User);
    assert_eq!(store.count_pending().unwrap(), 0);
    assert_eq!(store.count_households().unwrap(), 1);

    let signed_in = credentials.sign_in("sunita@example.com", "mangalore").unwrap();
    let user = credentials.current_user(&signed_in.token).unwrap();
    assert_eq!(user, Some(pending.id));

    let session = HouseholdSession::resume(&store, pending.id).unwrap();
    assert_eq!(session.current_household(), approval.resident.household_id);
}
