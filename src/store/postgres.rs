use super::{rows, EntityStore};
use crate::error::CensusError;
use crate::executor::{StoreError, StoreExecutor};
use crate::model::{
    CredentialId, Education, GroupMembership, HealthRecord, Household, HouseholdId, Occupation,
    PendingRegistration, Resident, ResidentId, UserAccount,
};
use crate::query::value_conversion::with_converted_params;
use crate::schema::{count_statement, CensusTable};
use crate::transaction::TransactionSource;
use may_postgres::Row;
use sea_query::{Asterisk, Expr, ExprTrait, OnConflict, Order, PostgresQueryBuilder, Query};
use std::fmt::Display;

type Statement = (String, sea_query::Values);

fn text<T: Display>(value: Option<T>) -> Expr {
    Expr::val(value.map(|v| v.to_string()))
}

fn build_error(e: impl Display) -> StoreError {
    StoreError::QueryError(e.to_string())
}

/// [`EntityStore`] over PostgreSQL.
///
/// Generic over the executor so the same code runs on a connection and,
/// inside [`EntityStore::atomically`], on an open [`Transaction`](crate::transaction::Transaction).
pub struct PgStore<E> {
    executor: E,
}

impl<E: StoreExecutor> PgStore<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    fn run(&self, (sql, values): Statement) -> Result<u64, StoreError> {
        with_converted_params(&values, |params| self.executor.execute(&sql, params))
    }

    fn fetch_all(&self, (sql, values): Statement) -> Result<Vec<Row>, StoreError> {
        with_converted_params(&values, |params| self.executor.query_all(&sql, params))
    }

    fn fetch_opt(&self, (sql, values): Statement) -> Result<Option<Row>, StoreError> {
        with_converted_params(&values, |params| self.executor.query_opt(&sql, params))
    }

    fn select_all<T>(
        &self,
        table: CensusTable,
        order: &[(&'static str, Order)],
        decode: fn(&Row) -> Result<T, StoreError>,
    ) -> Result<Vec<T>, StoreError> {
        let mut query = Query::select();
        query.column(Asterisk).from(table.name());
        for (col, direction) in order {
            query.order_by(*col, direction.clone());
        }
        self.fetch_all(query.build(PostgresQueryBuilder))?
            .iter()
            .map(decode)
            .collect()
    }

    fn select_one<T>(
        &self,
        table: CensusTable,
        key_column: &'static str,
        key: uuid::Uuid,
        decode: fn(&Row) -> Result<T, StoreError>,
    ) -> Result<Option<T>, StoreError> {
        let statement = Query::select()
            .column(Asterisk)
            .from(table.name())
            .and_where(Expr::col(key_column).eq(key))
            .build(PostgresQueryBuilder);
        self.fetch_opt(statement)?.as_ref().map(decode).transpose()
    }

    fn count(&self, sql: &str) -> Result<u64, StoreError> {
        let row = self.executor.query_one(sql, &[])?;
        let count: i64 = rows::column(&row, "count")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Insert into a satellite table, replacing the row for the same resident.
    fn upsert(
        &self,
        table: CensusTable,
        columns: &[&'static str],
        values: Vec<Expr>,
    ) -> Result<(), StoreError> {
        let update_columns: Vec<&'static str> = columns
            .iter()
            .copied()
            .filter(|c| *c != "resident_id")
            .collect();
        let statement = Query::insert()
            .into_table(table.name())
            .columns(columns.iter().copied())
            .values(values)
            .map_err(build_error)?
            .on_conflict(
                OnConflict::column("resident_id")
                    .update_columns(update_columns)
                    .to_owned(),
            )
            .build(PostgresQueryBuilder);
        self.run(statement)?;
        Ok(())
    }

    fn expect_one(affected: u64, table: &'static str, key: impl Display) -> Result<(), StoreError> {
        if affected == 0 {
            return Err(StoreError::NotFound {
                table,
                key: key.to_string(),
            });
        }
        Ok(())
    }
}

impl<E> EntityStore for PgStore<E>
where
    E: StoreExecutor + TransactionSource,
{
    fn insert_pending(&self, pending: &PendingRegistration) -> Result<(), StoreError> {
        let statement = Query::insert()
            .into_table(CensusTable::PendingRegistrations.name())
            .columns(["id", "first_name", "last_name", "email", "phone_number", "registered_at"])
            .values([
                Expr::val(pending.id),
                Expr::val(pending.first_name.clone()),
                Expr::val(pending.last_name.clone()),
                Expr::val(pending.email.clone()),
                Expr::val(pending.phone_number.clone()),
                Expr::val(pending.registered_at),
            ])
            .map_err(build_error)?
            .build(PostgresQueryBuilder);
        self.run(statement)?;
        Ok(())
    }

    fn find_pending(&self, id: CredentialId) -> Result<Option<PendingRegistration>, StoreError> {
        self.select_one(CensusTable::PendingRegistrations, "id", id, rows::pending)
    }

    fn list_pending(&self) -> Result<Vec<PendingRegistration>, StoreError> {
        self.select_all(
            CensusTable::PendingRegistrations,
            &[("registered_at", Order::Desc)],
            rows::pending,
        )
    }

    fn delete_pending(&self, id: CredentialId) -> Result<u64, StoreError> {
        let statement = Query::delete()
            .from_table(CensusTable::PendingRegistrations.name())
            .and_where(Expr::col("id").eq(id))
            .build(PostgresQueryBuilder);
        self.run(statement)
    }

    fn insert_resident(&self, r: &Resident) -> Result<(), StoreError> {
        let statement = Query::insert()
            .into_table(CensusTable::Residents.name())
            .columns([
                "resident_id",
                "first_name",
                "middle_name",
                "last_name",
                "gender",
                "relation",
                "marital_status",
                "date_of_birth",
                "phone_number",
                "email",
                "lifemember",
                "household_id",
                "created_at",
            ])
            .values([
                Expr::val(r.resident_id),
                Expr::val(r.first_name.clone()),
                Expr::val(r.middle_name.clone()),
                Expr::val(r.last_name.clone()),
                Expr::val(r.gender.as_str()),
                Expr::val(r.relation.as_str()),
                Expr::val(r.marital_status.as_str()),
                Expr::val(r.date_of_birth),
                Expr::val(r.phone_number.clone()),
                Expr::val(r.email.clone()),
                Expr::val(r.lifemember),
                Expr::val(r.household_id),
                Expr::val(r.created_at),
            ])
            .map_err(build_error)?
            .build(PostgresQueryBuilder);
        self.run(statement)?;
        Ok(())
    }

    fn update_resident(&self, r: &Resident) -> Result<(), StoreError> {
        let statement = Query::update()
            .table(CensusTable::Residents.name())
            .value("first_name", r.first_name.clone())
            .value("middle_name", r.middle_name.clone())
            .value("last_name", r.last_name.clone())
            .value("gender", r.gender.as_str())
            .value("relation", r.relation.as_str())
            .value("marital_status", r.marital_status.as_str())
            .value("date_of_birth", r.date_of_birth)
            .value("phone_number", r.phone_number.clone())
            .value("email", r.email.clone())
            .value("lifemember", r.lifemember)
            .and_where(Expr::col("resident_id").eq(r.resident_id))
            .build(PostgresQueryBuilder);
        let affected = self.run(statement)?;
        Self::expect_one(affected, "residents", r.resident_id)
    }

    fn set_resident_household(
        &self,
        resident_id: ResidentId,
        household_id: HouseholdId,
    ) -> Result<(), StoreError> {
        let statement = Query::update()
            .table(CensusTable::Residents.name())
            .value("household_id", household_id)
            .and_where(Expr::col("resident_id").eq(resident_id))
            .build(PostgresQueryBuilder);
        let affected = self.run(statement)?;
        Self::expect_one(affected, "residents", resident_id)
    }

    fn find_resident(&self, id: ResidentId) -> Result<Option<Resident>, StoreError> {
        self.select_one(CensusTable::Residents, "resident_id", id, rows::resident)
    }

    fn list_residents(&self) -> Result<Vec<Resident>, StoreError> {
        self.select_all(
            CensusTable::Residents,
            &[("created_at", Order::Asc), ("resident_id", Order::Asc)],
            rows::resident,
        )
    }

    fn residents_in_household(&self, household_id: HouseholdId) -> Result<Vec<Resident>, StoreError> {
        let statement = Query::select()
            .column(Asterisk)
            .from(CensusTable::Residents.name())
            .and_where(Expr::col("household_id").eq(household_id))
            .order_by("created_at", Order::Asc)
            .order_by("resident_id", Order::Asc)
            .build(PostgresQueryBuilder);
        self.fetch_all(statement)?.iter().map(rows::resident).collect()
    }

    fn insert_household(&self, h: &Household) -> Result<(), StoreError> {
        let statement = Query::insert()
            .into_table(CensusTable::Households.name())
            .columns([
                "household_id",
                "head_of_family_id",
                "address",
                "chapter",
                "number_of_members",
            ])
            .values([
                Expr::val(h.household_id),
                Expr::val(h.head_of_family_id),
                Expr::val(h.address.clone()),
                Expr::val(h.chapter.clone()),
                Expr::val(h.number_of_members),
            ])
            .map_err(build_error)?
            .build(PostgresQueryBuilder);
        self.run(statement)?;
        Ok(())
    }

    fn update_household(&self, h: &Household) -> Result<(), StoreError> {
        let statement = Query::update()
            .table(CensusTable::Households.name())
            .value("address", h.address.clone())
            .value("chapter", h.chapter.clone())
            .and_where(Expr::col("household_id").eq(h.household_id))
            .build(PostgresQueryBuilder);
        let affected = self.run(statement)?;
        Self::expect_one(affected, "households", h.household_id)
    }

    fn increment_members(&self, id: HouseholdId) -> Result<(), StoreError> {
        let statement = Query::update()
            .table(CensusTable::Households.name())
            .value("number_of_members", Expr::col("number_of_members").add(1))
            .and_where(Expr::col("household_id").eq(id))
            .build(PostgresQueryBuilder);
        let affected = self.run(statement)?;
        Self::expect_one(affected, "households", id)
    }

    fn find_household(&self, id: HouseholdId) -> Result<Option<Household>, StoreError> {
        self.select_one(CensusTable::Households, "household_id", id, rows::household)
    }

    fn list_households(&self) -> Result<Vec<Household>, StoreError> {
        self.select_all(
            CensusTable::Households,
            &[("household_id", Order::Asc)],
            rows::household,
        )
    }

    fn upsert_education(&self, row: &Education) -> Result<(), StoreError> {
        self.upsert(
            CensusTable::Education,
            &[
                "resident_id",
                "highest_qualification",
                "school_or_college_name",
                "year_of_completion",
            ],
            vec![
                Expr::val(row.resident_id),
                Expr::val(row.highest_qualification.clone()),
                Expr::val(row.school_or_college_name.clone()),
                Expr::val(row.year_of_completion),
            ],
        )
    }

    fn upsert_occupation(&self, row: &Occupation) -> Result<(), StoreError> {
        self.upsert(
            CensusTable::Occupation,
            &["resident_id", "occupation", "profession", "work_location"],
            vec![
                Expr::val(row.resident_id),
                text(row.occupation),
                Expr::val(row.profession.clone()),
                Expr::val(row.work_location.clone()),
            ],
        )
    }

    fn upsert_health(&self, row: &HealthRecord) -> Result<(), StoreError> {
        self.upsert(
            CensusTable::HealthRecords,
            &["resident_id", "blood_group", "mediclaim", "thalassemia", "g6pd"],
            vec![
                Expr::val(row.resident_id),
                text(row.blood_group),
                Expr::val(row.mediclaim.as_str()),
                text(row.thalassemia),
                Expr::val(row.g6pd.as_str()),
            ],
        )
    }

    fn upsert_groups(&self, row: &GroupMembership) -> Result<(), StoreError> {
        self.upsert(
            CensusTable::GroupMemberships,
            &["resident_id", "shirva_setu", "dukhad_nidhan", "sgnx", "sgnx_parent"],
            vec![
                Expr::val(row.resident_id),
                Expr::val(row.shirva_setu),
                Expr::val(row.dukhad_nidhan),
                Expr::val(row.sgnx),
                Expr::val(row.sgnx_parent),
            ],
        )
    }

    fn find_education(&self, id: ResidentId) -> Result<Option<Education>, StoreError> {
        self.select_one(CensusTable::Education, "resident_id", id, rows::education)
    }

    fn find_occupation(&self, id: ResidentId) -> Result<Option<Occupation>, StoreError> {
        self.select_one(CensusTable::Occupation, "resident_id", id, rows::occupation)
    }

    fn find_health(&self, id: ResidentId) -> Result<Option<HealthRecord>, StoreError> {
        self.select_one(CensusTable::HealthRecords, "resident_id", id, rows::health)
    }

    fn find_groups(&self, id: ResidentId) -> Result<Option<GroupMembership>, StoreError> {
        self.select_one(CensusTable::GroupMemberships, "resident_id", id, rows::groups)
    }

    fn list_education(&self) -> Result<Vec<Education>, StoreError> {
        self.select_all(CensusTable::Education, &[("resident_id", Order::Asc)], rows::education)
    }

    fn list_occupation(&self) -> Result<Vec<Occupation>, StoreError> {
        self.select_all(CensusTable::Occupation, &[("resident_id", Order::Asc)], rows::occupation)
    }

    fn list_health(&self) -> Result<Vec<HealthRecord>, StoreError> {
        self.select_all(CensusTable::HealthRecords, &[("resident_id", Order::Asc)], rows::health)
    }

    fn list_groups(&self) -> Result<Vec<GroupMembership>, StoreError> {
        self.select_all(CensusTable::GroupMemberships, &[("resident_id", Order::Asc)], rows::groups)
    }

    fn insert_account(&self, account: &UserAccount) -> Result<(), StoreError> {
        let statement = Query::insert()
            .into_table(CensusTable::UserAccounts.name())
            .columns(["user_id", "resident_id", "role", "created_at"])
            .values([
                Expr::val(account.user_id),
                Expr::val(account.resident_id),
                Expr::val(account.role.as_str()),
                Expr::val(account.created_at),
            ])
            .map_err(build_error)?
            .build(PostgresQueryBuilder);
        self.run(statement)?;
        Ok(())
    }

    fn find_account(&self, user_id: CredentialId) -> Result<Option<UserAccount>, StoreError> {
        self.select_one(CensusTable::UserAccounts, "user_id", user_id, rows::account)
    }

    fn list_accounts(&self) -> Result<Vec<UserAccount>, StoreError> {
        self.select_all(
            CensusTable::UserAccounts,
            &[("created_at", Order::Desc)],
            rows::account,
        )
    }

    fn count_households(&self) -> Result<u64, StoreError> {
        self.count(&count_statement(CensusTable::Households))
    }

    fn count_residents(&self) -> Result<u64, StoreError> {
        self.count(&count_statement(CensusTable::Residents))
    }

    fn count_pending(&self) -> Result<u64, StoreError> {
        self.count(&count_statement(CensusTable::PendingRegistrations))
    }

    fn count_lifemembers(&self) -> Result<u64, StoreError> {
        self.count("SELECT COUNT(*) FROM \"residents\" WHERE \"lifemember\" = TRUE")
    }

    fn atomically(
        &self,
        work: &mut dyn FnMut(&dyn EntityStore) -> Result<(), CensusError>,
    ) -> Result<(), CensusError> {
        let transaction = self
            .executor
            .begin_transaction()
            .map_err(StoreError::from)?;
        let scoped = PgStore::new(transaction);

        match work(&scoped) {
            Ok(()) => {
                scoped.into_executor().commit().map_err(StoreError::from)?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = scoped.into_executor().rollback() {
                    log::warn!("rollback after failed unit of work also failed: {rollback_err}");
                }
                Err(e)
            }
        }
    }
}
