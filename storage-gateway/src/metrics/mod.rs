use metrics::counter;
use metrics::histogram;
use metrics::SharedString;

#[derive(Clone, Copy, Debug, Default)]
pub struct Metrics {}

impl Metrics {
    pub fn new() -> Self {
        Self {}
    }

    pub fn increment_requests(
        &self,
        operation: &str,
    ) {
        let operation = SharedString::from(String::from(operation));
        counter!("simple_storage_gateway_requests_total", "operation" => operation).increment(1);
    }

    pub fn increment_failures(
        &self,
        operation: &str,
        error_kind: &str,
    ) {
        let operation = SharedString::from(String::from(operation));
        let error_kind = SharedString::from(String::from(error_kind));
        counter!(
            "simple_storage_gateway_failures_total",
            "operation" => operation,
            "error_kind" => error_kind
        )
        .increment(1);
    }

    pub fn observe_request_duration(
        &self,
        operation: &str,
        duration: f64,
    ) {
        let operation = SharedString::from(String::from(operation));
        histogram!("simple_storage_gateway_request_duration_seconds", "operation" => operation)
            .record(duration);
    }

    pub fn observe_events_returned(
        &self,
        count: usize,
    ) {
        histogram!("simple_storage_gateway_events_returned").record(count as f64);
    }

    pub fn increment_node_chain_checks(
        &self,
        outcome: &str,
    ) {
        let outcome = SharedString::from(String::from(outcome));
        counter!("simple_storage_gateway_chain_checks_total", "outcome" => outcome).increment(1);
    }
}
