use crate::support::{assert_one_head_per_household, member, named};
use census::config::{HouseholdConfig, SatelliteWrites};
use census::model::Relation;
use census::schema::CensusTable;
use census::{CensusConfig, CensusError, EntityStore, HouseholdService, HouseholdSession, MemoryStore};
use std::sync::Arc;

#[test]
fn alice_founds_a_household_and_bob_joins_it() {
    let store = MemoryStore::new();
    let households = HouseholdService::new(&store, &HouseholdConfig::default());
    let mut session = HouseholdSession::default();

    let alice = households
        .register_member(&mut session, &named("Alice", Relation::Head))
        .unwrap();
    let household_x = alice.household_id.unwrap();
    assert_eq!(session.current_household(), Some(household_x));

    let bob = households
        .register_member(&mut session, &named("Bob", Relation::Spouse))
        .unwrap();
    assert_eq!(bob.household_id, Some(household_x));

    assert_eq!(store.count_households().unwrap(), 1);
    assert_eq!(store.count_residents().unwrap(), 2);
    // Direct add-member never goes through the pending queue.
    assert!(store.list_pending().unwrap().is_empty());
    assert_eq!(
        store.find_household(household_x).unwrap().unwrap().number_of_members,
        2
    );
    assert_one_head_per_household(&store);
}

#[test]
fn member_before_any_head_is_refused() {
    let store = MemoryStore::new();
    let households = HouseholdService::new(&store, &HouseholdConfig::default());
    let mut session = HouseholdSession::default();

    let err = households
        .register_member(&mut session, &member(Relation::Daughter, 2010))
        .unwrap_err();
    assert!(matches!(err, CensusError::MissingHousehold));
    assert_eq!(err.to_string(), "Head of family must register first");
    assert_eq!(store.count_residents().unwrap(), 0);
    assert_eq!(store.count_households().unwrap(), 0);
}

#[test]
fn reset_session_needs_a_new_head() {
    let store = MemoryStore::new();
    let households = HouseholdService::new(&store, &HouseholdConfig::default());
    let mut session = HouseholdSession::default();
    households
        .register_member(&mut session, &member(Relation::Head, 1970))
        .unwrap();

    session.reset();
    let err = households
        .register_member(&mut session, &member(Relation::Son, 2001))
        .unwrap_err();
    assert!(matches!(err, CensusError::MissingHousehold));
}

#[test]
fn second_head_in_one_session_is_refused() {
    let store = MemoryStore::new();
    let households = HouseholdService::new(&store, &HouseholdConfig::default());
    let mut session = HouseholdSession::default();
    let alice = households
        .register_member(&mut session, &named("Alice", Relation::Head))
        .unwrap();
    let household_x = alice.household_id.unwrap();

    let err = households
        .register_member(&mut session, &named("Carol", Relation::Head))
        .unwrap_err();
    assert!(matches!(err, CensusError::Validation { field: "relation", .. }));
    assert_eq!(session.current_household(), Some(household_x));
    assert_eq!(store.count_households().unwrap(), 1);
    assert_eq!(store.count_residents().unwrap(), 1);

    // Later members still land in the first household.
    let bob = households
        .register_member(&mut session, &named("Bob", Relation::Spouse))
        .unwrap();
    assert_eq!(bob.household_id, Some(household_x));

    session.reset();
    let carol = households
        .register_member(&mut session, &named("Carol", Relation::Head))
        .unwrap();
    assert_ne!(carol.household_id, Some(household_x));
    assert_eq!(store.count_households().unwrap(), 2);
    assert_one_head_per_household(&store);
}

#[test]
fn concurrent_heads_get_their_own_households() {
    let store = Arc::new(MemoryStore::new());
    let config = HouseholdConfig::default();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let config = config.clone();
            may::go!(move || {
                let households = HouseholdService::new(store.as_ref(), &config);
                let mut session = HouseholdSession::default();
                let head = households
                    .register_member(&mut session, &member(Relation::Head, 1975))
                    .unwrap();
                let child = households
                    .register_member(&mut session, &member(Relation::Son, 2005))
                    .unwrap();
                (head.household_id, child.household_id, session.current_household())
            })
        })
        .collect();

    let mut seen = Vec::new();
    for handle in handles {
        let (head_household, child_household, session_household) = handle.join().unwrap();
        assert_eq!(head_household, child_household);
        assert_eq!(head_household, session_household);
        assert!(!seen.contains(&head_household));
        seen.push(head_household);
    }

    assert_eq!(store.count_households().unwrap(), 8);
    assert_eq!(store.count_residents().unwrap(), 16);
    for household in store.list_households().unwrap() {
        assert_eq!(household.number_of_members, 2);
    }
    assert_one_head_per_household(store.as_ref());
}

#[test]
fn best_effort_policy_from_config_keeps_partial_profiles() {
    let config = CensusConfig::from_toml_str(
        r#"
        [household]
        satellite_writes = "best_effort"
        "#,
    )
    .unwrap();
    assert_eq!(config.household.satellite_writes, SatelliteWrites::BestEffort);

    let store = MemoryStore::new();
    store.fail_writes_to(CensusTable::HealthRecords);
    let households = HouseholdService::new(&store, &config.household);
    let mut session = HouseholdSession::default();

    let err = households
        .register_member(&mut session, &member(Relation::Head, 1980))
        .unwrap_err();
    let CensusError::PartialWrite {
        resident_id,
        failures,
    } = err
    else {
        panic!("expected a partial write");
    };
    assert_eq!(failures.len(), 1);
    assert!(store.find_resident(resident_id).unwrap().is_some());
    assert!(store.find_education(resident_id).unwrap().is_some());
    assert!(store.find_health(resident_id).unwrap().is_none());

    // The household was committed, so later members can still join.
    store.clear_faults();
    households
        .register_member(&mut session, &member(Relation::Daughter, 2012))
        .unwrap();
    assert_one_head_per_household(&store);
}

#[test]
fn transactional_policy_writes_no_satellite_on_failure() {
    let store = MemoryStore::new();
    store.fail_writes_to(CensusTable::GroupMemberships);
    let households = HouseholdService::new(
        &store,
        &HouseholdConfig {
            satellite_writes: SatelliteWrites::Transactional,
        },
    );
    let mut session = HouseholdSession::default();

    let err = households
        .register_member(&mut session, &member(Relation::Head, 1980))
        .unwrap_err();
    assert_eq!(err.kind(), "partial_write");
    assert!(store.list_education().unwrap().is_empty());
    assert!(store.list_occupation().unwrap().is_empty());
    assert!(store.list_health().unwrap().is_empty());
    assert_eq!(store.count_households().unwrap(), 1);
}

#[cfg(feature = "metrics")]
#[test]
fn registrations_are_counted_in_default_metrics() {
    let store = MemoryStore::new();
    let households = HouseholdService::new(&store, &HouseholdConfig::default());
    let mut session = HouseholdSession::default();
    households
        .register_member(&mut session, &member(Relation::Head, 1968))
        .unwrap();

    let text = census::metrics::gather_text();
    assert!(text.contains("census_events_total"));
    assert!(text.contains("members_registered"));
}
