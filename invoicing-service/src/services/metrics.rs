//! Prometheus metrics for invoicing-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Service operation counter by operation and outcome.
pub static OPERATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_operations_total",
        "Total number of invoicing operations",
        &["operation", "outcome"]
    )
    .expect("Failed to register operations_total")
});

/// Created invoices by initial status.
pub static INVOICES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoices_total",
        "Total number of invoices created by status",
        &["status"] // draft, unpaid, paid
    )
    .expect("Failed to register invoices_total")
});

/// Status changes by source and target status.
pub static STATUS_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_status_transitions_total",
        "Total number of invoice status changes",
        &["from", "to"]
    )
    .expect("Failed to register status_transitions_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_errors_total",
        "Total number of errors by kind",
        &["error_kind"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoicing_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Gross amount invoiced by currency.
pub static INVOICE_AMOUNT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoicing_invoice_amount_total",
        "Total gross amount of created invoices by currency",
        &["currency"]
    )
    .expect("Failed to register invoice_amount_total")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&OPERATIONS_TOTAL);
    Lazy::force(&INVOICES_TOTAL);
    Lazy::force(&STATUS_TRANSITIONS_TOTAL);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&INVOICE_AMOUNT_TOTAL);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}

/// Count the outcome of a service operation.
pub fn record_outcome<T>(operation: &str, result: &Result<T, crate::error::InvoicingError>) {
    match result {
        Ok(_) => OPERATIONS_TOTAL.with_label_values(&[operation, "ok"]).inc(),
        Err(e) => {
            let kind = e.kind().as_str();
            OPERATIONS_TOTAL.with_label_values(&[operation, kind]).inc();
            ERRORS_TOTAL.with_label_values(&[kind]).inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvoicingError;

    #[test]
    fn outcomes_are_exported() {
        init_metrics();
        record_outcome::<()>("metrics_test", &Ok(()));
        record_outcome::<()>("metrics_test", &Err(InvoicingError::NotFound("Invoice")));

        let text = get_metrics();
        assert!(text.contains("invoicing_operations_total"));
        assert!(text.contains("operation=\"metrics_test\""));
        assert!(text.contains("outcome=\"not_found\""));
    }
}
