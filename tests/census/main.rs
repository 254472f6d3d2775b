//! End-to-end census scenarios over the in-memory store.

mod analytics_report;
mod household_flow;
mod registration_flow;
mod support;
