//! Client-side metrics: reports by outcome and latency histograms

use genbench_core::ResultReport;
use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, IntCounterVec, TextEncoder};

const LATENCY_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 2400.0,
];

static REPORTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec!(
        "genbench_reports_total",
        "Result reports by outcome",
        &["outcome"]
    )
    .unwrap()
});
static ROUND_TRIP: Lazy<Histogram> = Lazy::new(|| {
    prometheus::register_histogram!(
        "genbench_round_trip_seconds",
        "Client-observed round-trip time",
        LATENCY_BUCKETS.to_vec()
    )
    .unwrap()
});
static SERVER_INFERENCE: Lazy<Histogram> = Lazy::new(|| {
    prometheus::register_histogram!(
        "genbench_server_inference_seconds",
        "Server-reported inference duration",
        LATENCY_BUCKETS.to_vec()
    )
    .unwrap()
});

pub fn init() {
    // Touch statics so series exist before the first report.
    let _ = &*REPORTS_TOTAL;
    let _ = &*ROUND_TRIP;
    let _ = &*SERVER_INFERENCE;
}

pub fn record(report: &ResultReport) {
    REPORTS_TOTAL.with_label_values(&[report.outcome.label()]).inc();
    if let Some(rtt) = report.round_trip() {
        ROUND_TRIP.observe(rtt);
    }
    if let Some(v) = report.server.and_then(|s| s.inference_duration) {
        SERVER_INFERENCE.observe(v);
    }
}

/// Prometheus text exposition of the default registry.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(target: "obs", "failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use genbench_core::{ClientTiming, Outcome, ServerTiming, TaskId};

    #[test]
    fn records_outcomes_and_latencies() {
        init();
        let report = ResultReport {
            task_id: TaskId(0),
            prompt: "p".into(),
            client: ClientTiming { send: 10.0, receive: Some(10.25) },
            server: Some(ServerTiming { inference_duration: Some(0.2), ..Default::default() }),
            outcome: Outcome::Succeeded { response: "ok".into() },
        };
        let before = REPORTS_TOTAL.with_label_values(&["succeeded"]).get();
        record(&report);
        assert_eq!(REPORTS_TOTAL.with_label_values(&["succeeded"]).get(), before + 1);
        assert!(ROUND_TRIP.get_sample_count() >= 1);
        assert!(SERVER_INFERENCE.get_sample_count() >= 1);

        let exposition = render();
        assert!(exposition.contains("genbench_reports_total"));
        assert!(exposition.contains("genbench_round_trip_seconds_bucket"));
    }

    #[test]
    fn exceptions_have_no_latency_sample() {
        init();
        let report = ResultReport {
            task_id: TaskId(1),
            prompt: "p".into(),
            client: ClientTiming { send: 10.0, receive: None },
            server: None,
            outcome: Outcome::Exception { error: "refused".into() },
        };
        let before = REPORTS_TOTAL.with_label_values(&["exception"]).get();
        record(&report);
        assert_eq!(REPORTS_TOTAL.with_label_values(&["exception"]).get(), before + 1);
    }
}
