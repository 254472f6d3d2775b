//! Workflow-level errors.
//!
//! Store, transaction and credential failures are converted into one of
//! these kinds at the workflow boundary so callers can render a specific
//! message for each.

use crate::auth::AuthError;
use crate::executor::StoreError;
use crate::model::ResidentId;
use crate::schema::CensusTable;
use std::fmt;

/// One satellite upsert that did not land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatelliteFailure {
    pub table: CensusTable,
    pub error: String,
}

impl fmt::Display for SatelliteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.table, self.error)
    }
}

#[derive(Debug)]
pub enum CensusError {
    /// A required field is missing or malformed.
    Validation { field: &'static str, message: String },
    /// The email already has a credential.
    DuplicateEmail(String),
    /// A non-head member was added with no household in the session.
    MissingHousehold,
    /// Any failure from the entity store.
    Persistence(StoreError),
    /// The resident exists but some satellite rows were not written.
    PartialWrite {
        resident_id: ResidentId,
        failures: Vec<SatelliteFailure>,
    },
    /// Approval lacks the resident data needed to create the resident.
    IncompleteApproval(String),
    NotFound { entity: &'static str, id: String },
    /// Credential provider failure other than a duplicate email.
    Auth(AuthError),
}

impl CensusError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CensusError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        CensusError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short machine-readable kind, used for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            CensusError::Validation { .. } => "validation",
            CensusError::DuplicateEmail(_) => "duplicate_email",
            CensusError::MissingHousehold => "missing_household",
            CensusError::Persistence(_) => "persistence",
            CensusError::PartialWrite { .. } => "partial_write",
            CensusError::IncompleteApproval(_) => "incomplete_approval",
            CensusError::NotFound { .. } => "not_found",
            CensusError::Auth(_) => "auth",
        }
    }
}

impl fmt::Display for CensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CensusError::Validation { field, message } => {
                write!(f, "Invalid {field}: {message}")
            }
            CensusError::DuplicateEmail(email) => {
                write!(f, "An account already exists for {email}")
            }
            CensusError::MissingHousehold => {
                write!(f, "Head of family must register first")
            }
            CensusError::Persistence(e) => write!(f, "Failed to save or load data: {e}"),
            CensusError::PartialWrite {
                resident_id,
                failures,
            } => {
                let tables: Vec<String> = failures.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "Resident {resident_id} was saved but its profile is incomplete ({})",
                    tables.join("; ")
                )
            }
            CensusError::IncompleteApproval(reason) => {
                write!(f, "Cannot approve registration: {reason}")
            }
            CensusError::NotFound { entity, id } => write!(f, "{entity} {id} not found"),
            CensusError::Auth(e) => write!(f, "Authentication error: {e}"),
        }
    }
}

impl std::error::Error for CensusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CensusError::Persistence(e) => Some(e),
            CensusError::Auth(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CensusError {
    fn from(err: StoreError) -> Self {
        CensusError::Persistence(err)
    }
}

impl From<AuthError> for CensusError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::DuplicateEmail(email) => CensusError::DuplicateEmail(email),
            AuthError::Store(e) => CensusError::Persistence(e),
            other => CensusError::Auth(other),
        }
    }
}
