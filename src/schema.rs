//! Census schema contract.
//!
//! One canonical set of table and column names. [`create_schema`] is
//! idempotent and can run on every start-up.
//!
//! Households and residents reference each other: `residents.household_id`
//! points at a household (nullable until the head is linked) and
//! `households.head_of_family_id` points back at the head. The second key is
//! added with `ALTER TABLE` once both tables exist.

use crate::executor::{StoreError, StoreExecutor};
use sea_query::{
    ColumnDef, Expr, ForeignKey, ForeignKeyAction, PostgresQueryBuilder, Table,
    TableCreateStatement,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every table the census crate owns, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CensusTable {
    PendingRegistrations,
    Households,
    Residents,
    Education,
    Occupation,
    HealthRecords,
    GroupMemberships,
    UserAccounts,
    AuthCredentials,
    AuthSessions,
}

impl CensusTable {
    pub const ALL: [CensusTable; 10] = [
        CensusTable::PendingRegistrations,
        CensusTable::Households,
        CensusTable::Residents,
        CensusTable::Education,
        CensusTable::Occupation,
        CensusTable::HealthRecords,
        CensusTable::GroupMemberships,
        CensusTable::UserAccounts,
        CensusTable::AuthCredentials,
        CensusTable::AuthSessions,
    ];

    /// The four one-to-one tables keyed by `resident_id`.
    pub const SATELLITES: [CensusTable; 4] = [
        CensusTable::Education,
        CensusTable::Occupation,
        CensusTable::HealthRecords,
        CensusTable::GroupMemberships,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CensusTable::PendingRegistrations => "pending_registrations",
            CensusTable::Households => "households",
            CensusTable::Residents => "residents",
            CensusTable::Education => "education",
            CensusTable::Occupation => "occupation",
            CensusTable::HealthRecords => "health_records",
            CensusTable::GroupMemberships => "group_memberships",
            CensusTable::UserAccounts => "user_accounts",
            CensusTable::AuthCredentials => "auth_credentials",
            CensusTable::AuthSessions => "auth_sessions",
        }
    }
}

impl fmt::Display for CensusTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const HEAD_OF_FAMILY_FK: &str = "fk_households_head_of_family";

fn pending_registrations() -> TableCreateStatement {
    Table::create()
        .table(CensusTable::PendingRegistrations.name())
        .if_not_exists()
        .col(ColumnDef::new("id").uuid().not_null().primary_key())
        .col(ColumnDef::new("first_name").text().not_null())
        .col(ColumnDef::new("last_name").text().not_null())
        .col(ColumnDef::new("email").text().not_null())
        .col(ColumnDef::new("phone_number").text().not_null())
        .col(ColumnDef::new("registered_at").timestamp_with_time_zone().not_null())
        .to_owned()
}

fn households() -> TableCreateStatement {
    Table::create()
        .table(CensusTable::Households.name())
        .if_not_exists()
        .col(ColumnDef::new("household_id").uuid().not_null().primary_key())
        .col(ColumnDef::new("head_of_family_id").uuid().not_null().unique_key())
        .col(ColumnDef::new("address").text().not_null().default(""))
        .col(ColumnDef::new("chapter").text().not_null().default(""))
        .col(ColumnDef::new("number_of_members").integer().not_null().default(1))
        .to_owned()
}

fn residents() -> TableCreateStatement {
    Table::create()
        .table(CensusTable::Residents.name())
        .if_not_exists()
        .col(ColumnDef::new("resident_id").uuid().not_null().primary_key())
        .col(ColumnDef::new("first_name").text().not_null())
        .col(ColumnDef::new("middle_name").text().null())
        .col(ColumnDef::new("last_name").text().not_null())
        .col(ColumnDef::new("gender").text().not_null())
        .col(ColumnDef::new("relation").text().not_null())
        .col(ColumnDef::new("marital_status").text().not_null())
        .col(ColumnDef::new("date_of_birth").date().not_null())
        .col(ColumnDef::new("phone_number").text().null())
        .col(ColumnDef::new("email").text().null())
        .col(ColumnDef::new("lifemember").boolean().not_null().default(false))
        .col(ColumnDef::new("household_id").uuid().null())
        .col(ColumnDef::new("created_at").timestamp_with_time_zone().not_null())
        .foreign_key(
            ForeignKey::create()
                .name("fk_residents_household")
                .from(CensusTable::Residents.name(), "household_id")
                .to(CensusTable::Households.name(), "household_id")
                .on_delete(ForeignKeyAction::SetNull),
        )
        .to_owned()
}

/// Satellite table skeleton: `resident_id` is both primary key (upsert target)
/// and foreign key.
fn satellite(table: CensusTable) -> TableCreateStatement {
    Table::create()
        .table(table.name())
        .if_not_exists()
        .col(ColumnDef::new("resident_id").uuid().not_null().primary_key())
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{}_resident", table.name()))
                .from(table.name(), "resident_id")
                .to(CensusTable::Residents.name(), "resident_id")
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

fn education() -> TableCreateStatement {
    satellite(CensusTable::Education)
        .col(ColumnDef::new("highest_qualification").text().null())
        .col(ColumnDef::new("school_or_college_name").text().null())
        .col(ColumnDef::new("year_of_completion").integer().null())
        .to_owned()
}

fn occupation() -> TableCreateStatement {
    satellite(CensusTable::Occupation)
        .col(ColumnDef::new("occupation").text().null())
        .col(ColumnDef::new("profession").text().null())
        .col(ColumnDef::new("work_location").text().null())
        .to_owned()
}

fn health_records() -> TableCreateStatement {
    satellite(CensusTable::HealthRecords)
        .col(ColumnDef::new("blood_group").text().null())
        .col(ColumnDef::new("mediclaim").text().not_null().default("no"))
        .col(ColumnDef::new("thalassemia").text().null())
        .col(ColumnDef::new("g6pd").text().not_null().default("no"))
        .to_owned()
}

fn group_memberships() -> TableCreateStatement {
    satellite(CensusTable::GroupMemberships)
        .col(ColumnDef::new("shirva_setu").boolean().not_null().default(false))
        .col(ColumnDef::new("dukhad_nidhan").boolean().not_null().default(false))
        .col(ColumnDef::new("sgnx").boolean().not_null().default(false))
        .col(ColumnDef::new("sgnx_parent").boolean().not_null().default(false))
        .to_owned()
}

fn user_accounts() -> TableCreateStatement {
    Table::create()
        .table(CensusTable::UserAccounts.name())
        .if_not_exists()
        .col(ColumnDef::new("user_id").uuid().not_null().primary_key())
        .col(ColumnDef::new("resident_id").uuid().null())
        .col(ColumnDef::new("role").text().not_null())
        .col(ColumnDef::new("created_at").timestamp_with_time_zone().not_null())
        .foreign_key(
            ForeignKey::create()
                .name("fk_user_accounts_resident")
                .from(CensusTable::UserAccounts.name(), "resident_id")
                .to(CensusTable::Residents.name(), "resident_id")
                .on_delete(ForeignKeyAction::SetNull),
        )
        .to_owned()
}

fn auth_credentials() -> TableCreateStatement {
    Table::create()
        .table(CensusTable::AuthCredentials.name())
        .if_not_exists()
        .col(ColumnDef::new("credential_id").uuid().not_null().primary_key())
        .col(ColumnDef::new("email").text().not_null().unique_key())
        .col(ColumnDef::new("password_hash").text().not_null())
        .col(ColumnDef::new("created_at").timestamp_with_time_zone().not_null())
        .to_owned()
}

fn auth_sessions() -> TableCreateStatement {
    Table::create()
        .table(CensusTable::AuthSessions.name())
        .if_not_exists()
        .col(ColumnDef::new("token").text().not_null().primary_key())
        .col(ColumnDef::new("credential_id").uuid().not_null())
        .col(ColumnDef::new("created_at").timestamp_with_time_zone().not_null())
        .foreign_key(
            ForeignKey::create()
                .name("fk_auth_sessions_credential")
                .from(CensusTable::AuthSessions.name(), "credential_id")
                .to(CensusTable::AuthCredentials.name(), "credential_id")
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
}

/// `CREATE TABLE IF NOT EXISTS` statements in dependency order.
pub fn create_table_statements() -> Vec<String> {
    [
        pending_registrations(),
        households(),
        residents(),
        education(),
        occupation(),
        health_records(),
        group_memberships(),
        user_accounts(),
        auth_credentials(),
        auth_sessions(),
    ]
    .iter()
    .map(|stmt| stmt.build(PostgresQueryBuilder))
    .collect()
}

fn head_of_family_foreign_key() -> String {
    ForeignKey::create()
        .name(HEAD_OF_FAMILY_FK)
        .from(CensusTable::Households.name(), "head_of_family_id")
        .to(CensusTable::Residents.name(), "resident_id")
        .on_delete(ForeignKeyAction::Restrict)
        .to_owned()
        .build(PostgresQueryBuilder)
}

/// Create every census table. Safe to call repeatedly.
///
/// # Errors
///
/// Returns `StoreError` if any DDL statement fails.
pub fn create_schema(executor: &dyn StoreExecutor) -> Result<(), StoreError> {
    for sql in create_table_statements() {
        executor.execute(&sql, &[])?;
    }

    let existing = executor.query_opt(
        "SELECT 1 FROM pg_constraint WHERE conname = $1",
        &[&HEAD_OF_FAMILY_FK],
    )?;
    if existing.is_none() {
        executor.execute(&head_of_family_foreign_key(), &[])?;
    }

    log::info!("census schema ready ({} tables)", CensusTable::ALL.len());
    Ok(())
}

/// Drop every census table. Used by integration tests to start clean.
///
/// # Errors
///
/// Returns `StoreError` if a drop fails.
pub fn drop_schema(executor: &dyn StoreExecutor) -> Result<(), StoreError> {
    for table in CensusTable::ALL.iter().rev() {
        let sql = Table::drop()
            .table(table.name())
            .if_exists()
            .cascade()
            .to_owned()
            .build(PostgresQueryBuilder);
        executor.execute(&sql, &[])?;
    }
    Ok(())
}

/// `SELECT COUNT(*)` for one table.
pub(crate) fn count_statement(table: CensusTable) -> String {
    sea_query::Query::select()
        .expr(Expr::cust("COUNT(*)"))
        .from(table.name())
        .to_owned()
        .to_string(PostgresQueryBuilder)
}
