use super::password::{generate_token, hash_password, verify_password, DEFAULT_COST};
use super::{normalize_email, AuthError, AuthSession, CredentialProvider};
use crate::executor::{StoreError, StoreExecutor};
use crate::model::CredentialId;
use crate::query::value_conversion::with_converted_params;
use crate::schema::CensusTable;
use crate::store::rows::column;
use chrono::Utc;
use sea_query::{Expr, ExprTrait, OnConflict, PostgresQueryBuilder, Query};
use uuid::Uuid;

/// Credential provider over the `auth_credentials` / `auth_sessions` tables.
pub struct PgCredentials<E: StoreExecutor> {
    executor: E,
    cost: u32,
}

impl<E: StoreExecutor> PgCredentials<E> {
    pub fn new(executor: E) -> Self {
        Self::with_cost(executor, DEFAULT_COST)
    }

    /// Hash new passwords with bcrypt work factor `cost`.
    pub fn with_cost(executor: E, cost: u32) -> Self {
        Self { executor, cost }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn run(&self, (sql, values): (String, sea_query::Values)) -> Result<u64, StoreError> {
        with_converted_params(&values, |params| self.executor.execute(&sql, params))
    }

    /// (credential_id, bcrypt hash) for one credential.
    fn stored_secret(
        &self,
        filter_column: &'static str,
        value: Expr,
    ) -> Result<Option<(CredentialId, String)>, AuthError> {
        let (sql, values) = Query::select()
            .columns(["credential_id", "password_hash"])
            .from(CensusTable::AuthCredentials.name())
            .and_where(Expr::col(filter_column).eq(value))
            .build(PostgresQueryBuilder);
        let row = with_converted_params(&values, |params| self.executor.query_opt(&sql, params))?;
        row.map(|row| -> Result<_, StoreError> {
            Ok((
                column(&row, "credential_id")?,
                column(&row, "password_hash")?,
            ))
        })
        .transpose()
        .map_err(AuthError::from)
    }
}

impl<E: StoreExecutor> CredentialProvider for PgCredentials<E> {
    fn sign_up(&self, email: &str, password: &str) -> Result<CredentialId, AuthError> {
        let email = normalize_email(email);
        let id = Uuid::new_v4();
        let hash = hash_password(password, self.cost)?;

        let statement = Query::insert()
            .into_table(CensusTable::AuthCredentials.name())
            .columns([
                "credential_id",
                "email",
                "password_hash",
                "created_at",
            ])
            .values([
                Expr::val(id),
                Expr::val(email.clone()),
                Expr::val(hash),
                Expr::val(Utc::now()),
            ])
            .map_err(|e| AuthError::Other(e.to_string()))?
            .on_conflict(OnConflict::column("email").do_nothing().to_owned())
            .build(PostgresQueryBuilder);

        if self.run(statement)? == 0 {
            return Err(AuthError::DuplicateEmail(email));
        }
        log::debug!("credential {id} created");
        Ok(id)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        let (id, hash) = self
            .stored_secret("email", Expr::val(email))?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let session = AuthSession {
            token: generate_token(),
            credential_id: id,
            created_at: Utc::now(),
        };
        let statement = Query::insert()
            .into_table(CensusTable::AuthSessions.name())
            .columns(["token", "credential_id", "created_at"])
            .values([
                Expr::val(session.token.clone()),
                Expr::val(session.credential_id),
                Expr::val(session.created_at),
            ])
            .map_err(|e| AuthError::Other(e.to_string()))?
            .build(PostgresQueryBuilder);
        self.run(statement)?;
        Ok(session)
    }

    fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let statement = Query::delete()
            .from_table(CensusTable::AuthSessions.name())
            .and_where(Expr::col("token").eq(token))
            .build(PostgresQueryBuilder);
        self.run(statement)?;
        Ok(())
    }

    fn current_user(&self, token: &str) -> Result<Option<CredentialId>, AuthError> {
        let (sql, values) = Query::select()
            .column("credential_id")
            .from(CensusTable::AuthSessions.name())
            .and_where(Expr::col("token").eq(token))
            .build(PostgresQueryBuilder);
        let row = with_converted_params(&values, |params| self.executor.query_opt(&sql, params))?;
        Ok(row
            .map(|row| column::<CredentialId>(&row, "credential_id"))
            .transpose()?)
    }

    fn change_password(
        &self,
        id: CredentialId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let (_, hash) = self
            .stored_secret("credential_id", Expr::val(id))?
            .ok_or(AuthError::UnknownCredential(id))?;
        if !verify_password(current_password, &hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = hash_password(new_password, self.cost)?;
        let statement = Query::update()
            .table(CensusTable::AuthCredentials.name())
            .value("password_hash", new_hash)
            .and_where(Expr::col("credential_id").eq(id))
            .build(PostgresQueryBuilder);
        self.run(statement)?;
        Ok(())
    }

    fn revoke(&self, id: CredentialId) -> Result<(), AuthError> {
        // auth_sessions cascades
        let statement = Query::delete()
            .from_table(CensusTable::AuthCredentials.name())
            .and_where(Expr::col("credential_id").eq(id))
            .build(PostgresQueryBuilder);
        self.run(statement)?;
        log::info!("credential {id} revoked");
        Ok(())
    }
}
