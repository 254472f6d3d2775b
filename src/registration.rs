//! Two-stage onboarding: self-registration, then administrator review.
//!
//! [`Registrations::submit`] creates a credential and a pending row keyed by
//! it. [`Registrations::approve`] promotes the pending row into a resident
//! and a user account in one unit of work; [`Registrations::reject`] drops it.

use crate::auth::{normalize_email, CredentialProvider};
use crate::config::RegistrationConfig;
use crate::error::CensusError;
use crate::household::insert_member;
use crate::metrics;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
use crate::model::{
    CredentialId, Gender, HouseholdId, MaritalStatus, PendingRegistration, Relation, Resident,
    Role, UserAccount,
};
use crate::store::{in_transaction, EntityStore};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The self-registration form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: String,
}

/// Resident data the administrator supplies when approving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDetails {
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    /// Defaults to `Single`.
    pub marital_status: Option<MaritalStatus>,
    /// Defaults to `Self`, which founds a new household.
    pub relation: Option<Relation>,
    pub middle_name: Option<String>,
    /// Required unless the relation is `Self`.
    pub household_id: Option<HouseholdId>,
}

/// What an approval created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Approval {
    pub resident: Resident,
    pub account: UserAccount,
}

fn required<'f>(field: &'static str, value: &'f str) -> Result<&'f str, CensusError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CensusError::validation(field, "is required"))
    } else {
        Ok(trimmed)
    }
}

pub struct Registrations<'a> {
    store: &'a dyn EntityStore,
    credentials: &'a dyn CredentialProvider,
    min_password_length: usize,
}

impl<'a> Registrations<'a> {
    pub fn new(
        store: &'a dyn EntityStore,
        credentials: &'a dyn CredentialProvider,
        config: &RegistrationConfig,
    ) -> Self {
        Self {
            store,
            credentials,
            min_password_length: config.min_password_length,
        }
    }

    /// Create a credential and queue the registration for review.
    ///
    /// # Errors
    ///
    /// * `Validation` naming the first missing or malformed field.
    /// * `DuplicateEmail` if the email already has a credential.
    /// * `Persistence` if the pending row could not be written; the new
    ///   credential is revoked first.
    pub fn submit(&self, form: &RegistrationForm) -> Result<PendingRegistration, CensusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::workflow_span("registration.submit").entered();

        let first_name = required("first_name", &form.first_name)?;
        let last_name = required("last_name", &form.last_name)?;
        let email = normalize_email(required("email", &form.email)?);
        if !email.contains('@') {
            return Err(CensusError::validation("email", "must contain '@'"));
        }
        // Whitespace is part of the password; only an all-blank one is refused.
        let password = form.password.as_str();
        required("password", password)?;
        if password.chars().count() < self.min_password_length {
            return Err(CensusError::validation(
                "password",
                format!("must be at least {} characters", self.min_password_length),
            ));
        }
        let phone_number = required("phone_number", &form.phone_number)?;

        let id = self.credentials.sign_up(&email, password)?;
        let pending = PendingRegistration {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email,
            phone_number: phone_number.to_string(),
            registered_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_pending(&pending) {
            log::warn!("pending registration for {id} not saved, revoking credential: {e}");
            if let Err(revoke) = self.credentials.revoke(id) {
                log::warn!("could not revoke credential {id}: {revoke}");
            }
            return Err(CensusError::Persistence(e));
        }

        metrics::record_event("registrations_submitted");
        log::info!("registration {id} submitted for {}", pending.email);
        Ok(pending)
    }

    /// Every pending registration, most recent first.
    ///
    /// # Errors
    ///
    /// `Persistence` on store failure.
    pub fn list_pending(&self) -> Result<Vec<PendingRegistration>, CensusError> {
        Ok(self.store.list_pending()?)
    }

    /// Promote a pending registration.
    ///
    /// The resident (with its household when the relation is `Self`), the
    /// account (role `user`, keyed by the pending id) and the pending row's
    /// deletion commit together; on any failure the pending row stays.
    ///
    /// # Errors
    ///
    /// * `NotFound` for an unknown pending id.
    /// * `IncompleteApproval` when gender or date of birth is missing, or a
    ///   non-head relation comes without a household.
    /// * `MissingHousehold` if that household does not exist.
    /// * `Persistence` on store failure.
    pub fn approve(
        &self,
        pending_id: CredentialId,
        details: &ApprovalDetails,
    ) -> Result<Approval, CensusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::workflow_span("registration.approve").entered();

        let pending = self
            .store
            .find_pending(pending_id)?
            .ok_or_else(|| CensusError::not_found("pending registration", pending_id))?;

        let gender = details
            .gender
            .ok_or_else(|| CensusError::IncompleteApproval("gender is required".into()))?;
        let date_of_birth = details
            .date_of_birth
            .ok_or_else(|| CensusError::IncompleteApproval("date of birth is required".into()))?;
        let relation = details.relation.unwrap_or(Relation::Head);
        if !relation.is_head() && details.household_id.is_none() {
            return Err(CensusError::IncompleteApproval(format!(
                "relation {relation} needs an existing household"
            )));
        }

        let now = Utc::now();
        let resident = Resident {
            resident_id: Uuid::new_v4(),
            first_name: pending.first_name.clone(),
            middle_name: details
                .middle_name
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            last_name: pending.last_name.clone(),
            gender,
            relation,
            marital_status: details.marital_status.unwrap_or(MaritalStatus::Single),
            date_of_birth,
            phone_number: Some(pending.phone_number.clone()),
            email: Some(pending.email.clone()),
            lifemember: false,
            household_id: None,
            created_at: now,
        };
        let household_id = details.household_id;

        let approval = in_transaction(self.store, |tx| {
            let resident = insert_member(tx, resident, household_id)?;
            let account = UserAccount {
                user_id: pending.id,
                resident_id: Some(resident.resident_id),
                role: Role::User,
                created_at: now,
            };
            tx.insert_account(&account)?;
            tx.delete_pending(pending.id)?;
            Ok(Approval { resident, account })
        })
        .map_err(|e| {
            log::warn!("approval of {pending_id} rolled back: {e}");
            e
        })?;

        metrics::record_event("registrations_approved");
        log::info!(
            "registration {pending_id} approved as resident {}",
            approval.resident.resident_id
        );
        Ok(approval)
    }

    /// Drop a pending registration. Unknown ids succeed without change.
    /// The credential is left in place.
    ///
    /// # Errors
    ///
    /// `Persistence` on store failure.
    pub fn reject(&self, pending_id: CredentialId) -> Result<(), CensusError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::workflow_span("registration.reject").entered();

        let removed = self.store.delete_pending(pending_id)?;
        if removed > 0 {
            metrics::record_event("registrations_rejected");
            log::info!("registration {pending_id} rejected");
        } else {
            log::debug!("reject of unknown registration {pending_id} ignored");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::MIN_COST;
    use crate::auth::{AuthError, MemoryCredentials};
    use crate::schema::CensusTable;
    use crate::store::MemoryStore;

    fn form(email: &str) -> RegistrationForm {
        RegistrationForm {
            first_name: " Asha ".into(),
            last_name: "Prabhu".into(),
            email: email.into(),
            password: "secret1".into(),
            phone_number: "9820012345".into(),
        }
    }

    fn details() -> ApprovalDetails {
        ApprovalDetails {
            gender: Some(Gender::Female),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 2, 14),
            ..ApprovalDetails::default()
        }
    }

    #[test]
    fn submit_validates_each_field() {
        let store = MemoryStore::new();
        let auth = MemoryCredentials::with_cost(MIN_COST);
        let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());

        let mut blank = form("asha@example.com");
        blank.phone_number = "   ".into();
        let err = registrations.submit(&blank).unwrap_err();
        assert!(matches!(err, CensusError::Validation { field: "phone_number", .. }));

        let err = registrations.submit(&form("not-an-email")).unwrap_err();
        assert!(matches!(err, CensusError::Validation { field: "email", .. }));

        let mut short = form("asha@example.com");
        short.password = "abc".into();
        let err = registrations.submit(&short).unwrap_err();
        assert!(matches!(err, CensusError::Validation { field: "password", .. }));

        assert_eq!(auth.credential_count(), 0);
    }

    #[test]
    fn password_is_kept_exactly_as_entered() {
        let store = MemoryStore::new();
        let auth = MemoryCredentials::with_cost(MIN_COST);
        let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());

        let mut padded = form("asha@example.com");
        padded.password = "  abc  ".into();
        registrations.submit(&padded).unwrap();

        assert!(auth.sign_in("asha@example.com", "  abc  ").is_ok());
        assert!(matches!(
            auth.sign_in("asha@example.com", "abc"),
            Err(AuthError::InvalidCredentials)
        ));

        let mut blank = form("ravi@example.com");
        blank.password = "         ".into();
        let err = registrations.submit(&blank).unwrap_err();
        assert!(matches!(err, CensusError::Validation { field: "password", .. }));
    }

    #[test]
    fn submit_queues_and_rejects_duplicate_email() {
        let store = MemoryStore::new();
        let auth = MemoryCredentials::with_cost(MIN_COST);
        let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());

        let pending = registrations.submit(&form("Asha@Example.com")).unwrap();
        assert_eq!(pending.first_name, "Asha");
        assert_eq!(pending.email, "asha@example.com");

        let err = registrations.submit(&form("asha@example.com")).unwrap_err();
        assert!(matches!(err, CensusError::DuplicateEmail(_)));
        assert_eq!(registrations.list_pending().unwrap().len(), 1);
    }

    #[test]
    fn failed_pending_insert_revokes_the_credential() {
        let store = MemoryStore::new();
        store.fail_writes_to(CensusTable::PendingRegistrations);
        let auth = MemoryCredentials::with_cost(MIN_COST);
        let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());

        let err = registrations.submit(&form("asha@example.com")).unwrap_err();
        assert!(matches!(err, CensusError::Persistence(_)));
        assert_eq!(auth.credential_count(), 0);
    }

    #[test]
    fn approve_creates_resident_household_and_account() {
        let store = MemoryStore::new();
        let auth = MemoryCredentials::with_cost(MIN_COST);
        let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());
        let pending = registrations.submit(&form("asha@example.com")).unwrap();

        let approval = registrations.approve(pending.id, &details()).unwrap();

        assert!(approval.resident.is_head());
        assert_eq!(approval.account.user_id, pending.id);
        assert_eq!(approval.account.role, Role::User);
        assert_eq!(approval.account.resident_id, Some(approval.resident.resident_id));
        let household = store
            .find_household(approval.resident.household_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(household.head_of_family_id, approval.resident.resident_id);
        assert!(registrations.list_pending().unwrap().is_empty());
    }

    #[test]
    fn incomplete_approval_keeps_the_pending_row() {
        let store = MemoryStore::new();
        let auth = MemoryCredentials::with_cost(MIN_COST);
        let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());
        let pending = registrations.submit(&form("asha@example.com")).unwrap();

        let err = registrations
            .approve(pending.id, &ApprovalDetails::default())
            .unwrap_err();
        assert!(matches!(err, CensusError::IncompleteApproval(_)));

        let spouse = ApprovalDetails {
            relation: Some(Relation::Spouse),
            ..details()
        };
        let err = registrations.approve(pending.id, &spouse).unwrap_err();
        assert!(matches!(err, CensusError::IncompleteApproval(_)));

        assert_eq!(registrations.list_pending().unwrap().len(), 1);
        assert_eq!(store.count_residents().unwrap(), 0);
    }

    #[test]
    fn failed_account_insert_rolls_back_the_resident() {
        let store = MemoryStore::new();
        let auth = MemoryCredentials::with_cost(MIN_COST);
        let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());
        let pending = registrations.submit(&form("asha@example.com")).unwrap();
        store.fail_writes_to(CensusTable::UserAccounts);

        let err = registrations.approve(pending.id, &details()).unwrap_err();
        assert!(matches!(err, CensusError::Persistence(_)));
        assert_eq!(store.count_residents().unwrap(), 0);
        assert_eq!(store.count_households().unwrap(), 0);
        assert_eq!(registrations.list_pending().unwrap().len(), 1);
    }

    #[test]
    fn approving_into_an_existing_household_counts_the_member() {
        let store = MemoryStore::new();
        let auth = MemoryCredentials::with_cost(MIN_COST);
        let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());
        let head = registrations.submit(&form("asha@example.com")).unwrap();
        let head = registrations.approve(head.id, &details()).unwrap();
        let household_id = head.resident.household_id.unwrap();

        let son = registrations.submit(&form("kiran@example.com")).unwrap();
        let son = registrations
            .approve(
                son.id,
                &ApprovalDetails {
                    gender: Some(Gender::Male),
                    relation: Some(Relation::Son),
                    household_id: Some(household_id),
                    ..details()
                },
            )
            .unwrap();

        assert_eq!(son.resident.household_id, Some(household_id));
        let household = store.find_household(household_id).unwrap().unwrap();
        assert_eq!(household.number_of_members, 2);
    }

    #[test]
    fn unknown_ids_and_repeat_rejects() {
        let store = MemoryStore::new();
        let auth = MemoryCredentials::with_cost(MIN_COST);
        let registrations = Registrations::new(&store, &auth, &RegistrationConfig::default());
        let pending = registrations.submit(&form("asha@example.com")).unwrap();

        let err = registrations.approve(Uuid::new_v4(), &details()).unwrap_err();
        assert!(matches!(err, CensusError::NotFound { .. }));

        registrations.reject(pending.id).unwrap();
        registrations.reject(pending.id).unwrap();
        assert!(registrations.list_pending().unwrap().is_empty());
        assert_eq!(auth.credential_count(), 1);
    }
}
