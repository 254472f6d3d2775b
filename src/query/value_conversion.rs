//! Value conversion from sea-query to `may_postgres`.
//!
//! sea-query renders statements with `$n` placeholders and hands back the
//! bound values as [`sea_query::Values`]. [`with_converted_params`] turns them
//! into `ToSql` parameters and runs a closure with them.
//!
//! NULLs keep their column type: a `Value::Uuid(None)` is bound as
//! `Option<Uuid>`, so PostgreSQL sees a `uuid` NULL rather than an `int4` one.

use crate::executor::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use may_postgres::types::ToSql;
use sea_query::Value;
use uuid::Uuid;

/// Convert sea-query values to `ToSql` parameters and run `f` with them.
///
/// # Errors
///
/// Returns `StoreError::QueryError` for value kinds the census schema never
/// binds (floats, bytes, decimals, ...), or whatever `f` returns.
pub fn with_converted_params<F, R>(values: &sea_query::Values, f: F) -> Result<R, StoreError>
where
    F: FnOnce(&[&dyn ToSql]) -> Result<R, StoreError>,
{
    let owned = values
        .iter()
        .map(convert_value)
        .collect::<Result<Vec<_>, _>>()?;
    let params: Vec<&dyn ToSql> = owned.iter().map(|p| p.as_ref() as &dyn ToSql).collect();
    f(&params)
}

fn convert_value(value: &Value) -> Result<Box<dyn ToSql>, StoreError> {
    let param: Box<dyn ToSql> = match value {
        Value::Bool(b) => Box::new(*b),
        Value::SmallInt(i) => Box::new(*i),
        Value::Int(i) => Box::new(*i),
        Value::BigInt(i) => Box::new(*i),
        Value::String(Some(s)) => {
            let s: &str = s;
            Box::new(s.to_owned())
        }
        Value::String(None) => Box::new(None::<String>),
        Value::Uuid(Some(u)) => {
            let u: &Uuid = u;
            Box::new(*u)
        }
        Value::Uuid(None) => Box::new(None::<Uuid>),
        Value::ChronoDate(Some(d)) => {
            let d: &NaiveDate = d;
            Box::new(*d)
        }
        Value::ChronoDate(None) => Box::new(None::<NaiveDate>),
        Value::ChronoDateTimeUtc(Some(ts)) => {
            let ts: &DateTime<Utc> = ts;
            Box::new(*ts)
        }
        Value::ChronoDateTimeUtc(None) => Box::new(None::<DateTime<Utc>>),
        other => {
            return Err(StoreError::QueryError(format!(
                "Unsupported value type in query: {other:?}"
            )))
        }
    };
    Ok(param)
}
