//! Bridging sea-query statements to `may_postgres` parameters.

pub mod value_conversion;
