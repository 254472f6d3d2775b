//! Row decoding for the PostgreSQL implementations.

use crate::executor::StoreError;
use crate::model::{
    Education, GroupMembership, HealthRecord, Household, Occupation, PendingRegistration,
    Resident, UserAccount,
};
use may_postgres::types::FromSql;
use may_postgres::Row;
use std::str::FromStr;

pub(crate) fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T, StoreError> {
    row.try_get::<&str, T>(name)
        .map_err(|e| StoreError::ParseError(format!("column {name}: {e}")))
}

/// A text column holding an enumeration's canonical spelling.
pub(crate) fn text_enum<T>(row: &Row, name: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = column(row, name)?;
    raw.parse::<T>()
        .map_err(|e| StoreError::ParseError(format!("column {name}: {e}")))
}

pub(crate) fn optional_text_enum<T>(row: &Row, name: &str) -> Result<Option<T>, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: Option<String> = column(row, name)?;
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| StoreError::ParseError(format!("column {name}: {e}")))
        })
        .transpose()
}

pub(crate) fn pending(row: &Row) -> Result<PendingRegistration, StoreError> {
    Ok(PendingRegistration {
        id: column(row, "id")?,
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        email: column(row, "email")?,
        phone_number: column(row, "phone_number")?,
        registered_at: column(row, "registered_at")?,
    })
}

pub(crate) fn resident(row: &Row) -> Result<Resident, StoreError> {
    Ok(Resident {
        resident_id: column(row, "resident_id")?,
        first_name: column(row, "first_name")?,
        middle_name: column(row, "middle_name")?,
        last_name: column(row, "last_name")?,
        gender: text_enum(row, "gender")?,
        relation: text_enum(row, "relation")?,
        marital_status: text_enum(row, "marital_status")?,
        date_of_birth: column(row, "date_of_birth")?,
        phone_number: column(row, "phone_number")?,
        email: column(row, "email")?,
        lifemember: column(row, "lifemember")?,
        household_id: column(row, "household_id")?,
        created_at: column(row, "created_at")?,
    })
}

pub(crate) fn household(row: &Row) -> Result<Household, StoreError> {
    Ok(Household {
        household_id: column(row, "household_id")?,
        head_of_family_id: column(row, "head_of_family_id")?,
        address: column(row, "address")?,
        chapter: column(row, "chapter")?,
        number_of_members: column(row, "number_of_members")?,
    })
}

pub(crate) fn education(row: &Row) -> Result<Education, StoreError> {
    Ok(Education {
        resident_id: column(row, "resident_id")?,
        highest_qualification: column(row, "highest_qualification")?,
        school_or_college_name: column(row, "school_or_college_name")?,
        year_of_completion: column(row, "year_of_completion")?,
    })
}

pub(crate) fn occupation(row: &Row) -> Result<Occupation, StoreError> {
    Ok(Occupation {
        resident_id: column(row, "resident_id")?,
        occupation: optional_text_enum(row, "occupation")?,
        profession: column(row, "profession")?,
        work_location: column(row, "work_location")?,
    })
}

pub(crate) fn health(row: &Row) -> Result<HealthRecord, StoreError> {
    Ok(HealthRecord {
        resident_id: column(row, "resident_id")?,
        blood_group: optional_text_enum(row, "blood_group")?,
        mediclaim: text_enum(row, "mediclaim")?,
        thalassemia: optional_text_enum(row, "thalassemia")?,
        g6pd: text_enum(row, "g6pd")?,
    })
}

pub(crate) fn groups(row: &Row) -> Result<GroupMembership, StoreError> {
    Ok(GroupMembership {
        resident_id: column(row, "resident_id")?,
        shirva_setu: column(row, "shirva_setu")?,
        dukhad_nidhan: column(row, "dukhad_nidhan")?,
        sgnx: column(row, "sgnx")?,
        sgnx_parent: column(row, "sgnx_parent")?,
    })
}

pub(crate) fn account(row: &Row) -> Result<UserAccount, StoreError> {
    Ok(UserAccount {
        user_id: column(row, "user_id")?,
        resident_id: column(row, "resident_id")?,
        role: text_enum(row, "role")?,
        created_at: column(row, "created_at")?,
    })
}
