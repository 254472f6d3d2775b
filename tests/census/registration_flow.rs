use crate::support::{assert_one_head_per_household, named};
use census::auth::password::MIN_COST;
use census::auth::CredentialProvider;
use census::config::{HouseholdConfig, RegistrationConfig};
use census::model::{Gender, PendingRegistration, Relation, Role};
use census::{
    ApprovalDetails, CensusError, EntityStore, HouseholdService, HouseholdSession,
    MemoryCredentials, MemoryStore, RegistrationForm, Registrations,
};
use chrono::{Duration, NaiveDate, Utc};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use uuid::Uuid;

fn form() -> RegistrationForm {
    RegistrationForm {
        first_name: FirstName().fake(),
        last_name: LastName().fake(),
        email: SafeEmail().fake(),
        password: "correct horse".into(),
        phone_number: "9845012345".into(),
    }
}

fn head_details() -> ApprovalDetails {
    ApprovalDetails {
        gender: Some(Gender::Male),
        date_of_birth: NaiveDate::from_ymd_opt(1968, 11, 30),
        ..ApprovalDetails::default()
    }
}

#[test]
fn approved_user_signs_in_and_adds_family() {
    let store = MemoryStore::new();
    let auth = MemoryCredentials::with_cost(MIN_COST);
    let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());

    let submitted = form();
    let pending = registrations.submit(&submitted).unwrap();
    assert_eq!(registrations.list_pending().unwrap(), vec![pending.clone()]);

    let approval = registrations.approve(pending.id, &head_details()).unwrap();
    assert!(registrations.list_pending().unwrap().is_empty());
    assert_eq!(approval.account.role, Role::User);

    // The approved user signs in and picks up their household.
    let signed_in = auth.sign_in(&submitted.email, &submitted.password).unwrap();
    let credential = auth.current_user(&signed_in.token).unwrap().unwrap();
    let mut session = HouseholdSession::resume(&store, credential).unwrap();
    assert_eq!(session.current_household(), approval.resident.household_id);

    let households = HouseholdService::new(&store, &HouseholdConfig::default());
    let spouse = households
        .register_member(&mut session, &named("Meera", Relation::Spouse))
        .unwrap();
    assert_eq!(spouse.household_id, approval.resident.household_id);
    assert_one_head_per_household(&store);
}

#[test]
fn pending_list_is_most_recent_first() {
    let store = MemoryStore::new();
    let auth = MemoryCredentials::with_cost(MIN_COST);
    let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());

    let now = Utc::now();
    let queued = |minutes_ago: i64| PendingRegistration {
        id: Uuid::new_v4(),
        first_name: FirstName().fake(),
        last_name: LastName().fake(),
        email: SafeEmail().fake(),
        phone_number: "9845000000".to_string(),
        registered_at: now - Duration::minutes(minutes_ago),
    };
    let middle = queued(10);
    let oldest = queued(45);
    let newest = queued(1);
    for pending in [&middle, &oldest, &newest] {
        store.insert_pending(pending).unwrap();
    }

    let listed: Vec<_> = registrations
        .list_pending()
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, vec![newest.id, middle.id, oldest.id]);
}

#[test]
fn reject_is_idempotent() {
    let store = MemoryStore::new();
    let auth = MemoryCredentials::with_cost(MIN_COST);
    let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());
    let pending = registrations.submit(&form()).unwrap();

    registrations.reject(pending.id).unwrap();
    assert!(registrations.list_pending().unwrap().is_empty());

    registrations.reject(pending.id).unwrap();
    assert!(registrations.list_pending().unwrap().is_empty());
    assert_eq!(store.count_residents().unwrap(), 0);

    let err = registrations.approve(pending.id, &head_details()).unwrap_err();
    assert!(matches!(err, CensusError::NotFound { .. }));
}

#[test]
fn duplicate_email_is_refused_before_anything_is_queued() {
    let store = MemoryStore::new();
    let auth = MemoryCredentials::with_cost(MIN_COST);
    let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());

    let original = form();
    registrations.submit(&original).unwrap();

    let again = RegistrationForm {
        email: original.email.to_uppercase(),
        ..form()
    };
    let err = registrations.submit(&again).unwrap_err();
    assert_eq!(err.kind(), "duplicate_email");
    assert_eq!(store.count_pending().unwrap(), 1);
}
