//! Observability hooks.
//!
//! With the `metrics` feature, [`METRICS`] holds OpenTelemetry instruments
//! exported through a Prometheus registry; [`gather_text`] renders them in the
//! text exposition format for whatever HTTP layer embeds this crate.
//!
//! With the `tracing` feature, [`tracing_helpers`] builds the spans wrapped
//! around queries, transactions and census workflows.

#[cfg(feature = "metrics")]
pub use self::prometheus_metrics::{gather_text, CensusMetrics, METRICS};

/// Count a workflow event (`registrations`, `approvals`, ...).
///
/// A no-op unless the `metrics` feature is enabled.
pub fn record_event(event: &'static str) {
    #[cfg(feature = "metrics")]
    METRICS.record_event(event);
    #[cfg(not(feature = "metrics"))]
    let _ = event;
}

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<CensusMetrics> = Lazy::new(CensusMetrics::init);

    pub struct CensusMetrics {
        pub registry: Registry,
        _provider: SdkMeterProvider,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_wait_duration: Histogram<f64>,
        pub census_events_total: Counter<u64>,
    }

    impl CensusMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let provider = match opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
            {
                Ok(exporter) => SdkMeterProvider::builder().with_reader(exporter).build(),
                Err(e) => {
                    log::warn!("prometheus exporter unavailable, metrics will not be exported: {e}");
                    SdkMeterProvider::builder().build()
                }
            };
            let meter = provider.meter("census");

            let queries_total = meter
                .u64_counter("census_queries_total")
                .with_description("Total queries executed")
                .build();

            let query_errors_total = meter
                .u64_counter("census_query_errors_total")
                .with_description("Queries that returned an error")
                .build();

            let query_duration = meter
                .f64_histogram("census_query_duration_seconds")
                .with_description("Duration of queries")
                .build();

            let connection_wait_duration = meter
                .f64_histogram("census_connection_wait_seconds")
                .with_description("Time spent establishing database connections")
                .build();

            let census_events_total = meter
                .u64_counter("census_events_total")
                .with_description("Registrations, approvals, rejections, members and partial writes")
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                census_events_total,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_wait(&self, elapsed: Duration) {
            self.connection_wait_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_event(&self, event: &'static str) {
            self.census_events_total
                .add(1, &[KeyValue::new("event", event)]);
        }
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&METRICS.registry.gather(), &mut buffer) {
            log::warn!("failed to encode metrics: {e}");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    const MAX_STATEMENT_IN_SPAN: usize = 120;

    pub fn execute_query_span(query: &str) -> Span {
        let statement: String = query.chars().take(MAX_STATEMENT_IN_SPAN).collect();
        info_span!("census.query", db.system = "postgresql", db.statement = %statement)
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("census.connect", db.system = "postgresql")
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("census.transaction.begin")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("census.transaction.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("census.transaction.rollback")
    }

    /// Span around one census workflow step (`registration.submit`, ...).
    pub fn workflow_span(name: &'static str) -> Span {
        info_span!("census.workflow", workflow = name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_event_never_panics() {
        record_event("registrations");
        record_event("partial_writes");
    }

    #[cfg(feature = "tracing")]
    #[test]
    fn long_statements_are_truncated_in_spans() {
        let long = "SELECT ".repeat(100);
        let _span = tracing_helpers::execute_query_span(&long);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn gathered_text_includes_events() {
        METRICS.record_event("approvals");
        let text = gather_text();
        assert!(text.contains("census_events_total"));
    }
}
