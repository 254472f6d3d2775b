//! # Census
//!
//! Community census records on PostgreSQL with the `may` coroutine runtime.
//!
//! Residents self-register and wait for administrator approval; families are
//! assembled around a head of family who founds the household; education,
//! occupation, health and group-membership rows hang off each resident; and
//! the admin pages read the whole dataset back as directories, counts and
//! analytics.
//!
//! Workflows take an [`EntityStore`](store::EntityStore): [`PgStore`] over
//! any [`StoreExecutor`](executor::StoreExecutor), or [`MemoryStore`] for
//! tests and embedding.
//!
//! ```no_run
//! use census::{CensusConfig, HouseholdService, HouseholdSession, MemoryStore};
//!
//! let config = CensusConfig::default();
//! let store = MemoryStore::new();
//! let households = HouseholdService::new(&store, &config.household);
//! let mut session = HouseholdSession::default();
//! # let _ = (&households, &mut session);
//! ```

pub mod analytics;
pub mod auth;
pub mod config;
pub mod connection;
pub mod dashboard;
pub mod directory;
pub mod error;
pub mod executor;
pub mod household;
pub mod metrics;
pub mod model;
pub mod query;
pub mod registration;
pub mod schema;
pub mod session;
pub mod store;
pub mod transaction;

pub use analytics::AnalyticsReport;
pub use auth::{CredentialProvider, MemoryCredentials, PgCredentials};
pub use config::CensusConfig;
pub use dashboard::Dashboard;
pub use directory::{HouseholdListing, ResidentsDirectory};
pub use error::CensusError;
pub use executor::{MayPostgresExecutor, StoreError, StoreExecutor};
pub use household::{HouseholdService, MemberForm};
pub use registration::{ApprovalDetails, RegistrationForm, Registrations};
pub use session::HouseholdSession;
pub use store::{CensusSnapshot, EntityStore, MemoryStore, PgStore};
pub use transaction::{IsolationLevel, Transaction, TransactionError};
