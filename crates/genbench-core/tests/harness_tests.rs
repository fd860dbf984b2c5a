use std::collections::BTreeSet;
use std::time::Duration;

use axum::{http::StatusCode, routing::post, Router};
use genbench_core::{Dispatcher, Harness, Outcome, PromptTemplate, TaskId};
use genbench_mock::{app, Behavior, MockConfig};

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap(); });
    format!("http://{}:{}/generate", addr.ip(), addr.port())
}

/// Endpoint answering every request with the same status and body.
fn canned(status: u16, body: &'static str) -> Router {
    Router::new().route(
        "/generate",
        post(move || async move { (StatusCode::from_u16(status).unwrap(), body) }),
    )
}

fn dispatcher(url: &str, timeout: Duration) -> Dispatcher {
    Dispatcher::new(url, timeout, PromptTemplate::default()).unwrap()
}

#[tokio::test]
async fn success_carries_response_and_server_timing() {
    let body = r#"{"response": "hello", "timing": {"arrival": 1.0, "serving_start": 1.1, "inference_duration": 0.5, "total_latency": 0.6}}"#;
    let url = spawn(canned(200, body)).await;
    let report = dispatcher(&url, Duration::from_secs(5)).dispatch(TaskId(0)).await;

    assert_eq!(report.outcome, Outcome::Succeeded { response: "hello".into() });
    assert!(report.round_trip().unwrap() >= 0.0);
    let text = report.to_string();
    assert!(text.contains("Response: hello"));
    assert!(text.contains("Server arrival time:  1.000000"));
    assert!(text.contains("Server serve start:   1.100000"));
    assert!(text.contains("Server inference:     0.50 s"));
    assert!(text.contains("Server total latency: 0.60 s"));
}

#[tokio::test]
async fn http_500_is_a_status_failure() {
    let url = spawn(canned(500, r#"{"response": "should not be read"}"#)).await;
    let report = dispatcher(&url, Duration::from_secs(5)).dispatch(TaskId(1)).await;

    assert_eq!(report.outcome, Outcome::FailedStatus { status: 500 });
    assert_eq!(report.outcome.tag(), "FAILED (status)");
    assert!(report.response().is_none());
    assert!(report.client.receive.is_some());
    assert!(!report.to_string().contains("should not be read"));
}

#[tokio::test]
async fn non_json_body_is_a_decode_failure() {
    let url = spawn(canned(200, "not-json")).await;
    let report = dispatcher(&url, Duration::from_secs(5)).dispatch(TaskId(2)).await;

    assert_eq!(report.outcome.tag(), "FAILED (decode)");
    assert!(report.to_string().contains("not-json"));
}

#[tokio::test]
async fn json_without_response_is_a_missing_field() {
    let url = spawn(canned(200, r#"{"timing": {}}"#)).await;
    let report = dispatcher(&url, Duration::from_secs(5)).dispatch(TaskId(3)).await;

    assert!(matches!(report.outcome, Outcome::MissingField { ref field, .. } if field == "response"));
    assert!(report.round_trip().unwrap() >= 0.0);
}

#[tokio::test]
async fn silent_endpoint_times_out_as_exception() {
    let url = spawn(app(MockConfig::with_plan(vec![Behavior::Hang]))).await;
    let report = dispatcher(&url, Duration::from_secs_f64(0.01)).dispatch(TaskId(4)).await;

    assert!(matches!(report.outcome, Outcome::Exception { .. }));
    assert!(report.client.send > 0.0);
    assert_eq!(report.client.receive, None);
    let text = report.to_string();
    assert!(text.starts_with("[Request 4] EXCEPTION: "));
    assert!(!text.contains("receive time"));
}

#[tokio::test]
async fn refused_connection_is_an_exception() {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = format!("http://{}:{}/generate", addr.ip(), addr.port());
    let report = dispatcher(&url, Duration::from_secs(5)).dispatch(TaskId(5)).await;

    assert!(matches!(report.outcome, Outcome::Exception { .. }));
    assert_eq!(report.client.receive, None);
}

#[tokio::test]
async fn every_task_reports_exactly_once_under_mixed_failures() {
    let plan = vec![Behavior::Generate, Behavior::Status(500), Behavior::NotJson, Behavior::MissingResponse];
    let url = spawn(app(MockConfig::with_plan(plan))).await;
    let harness = Harness::new(dispatcher(&url, Duration::from_secs(5)), 3).unwrap();

    let mut seen = Vec::new();
    let outcome = harness.run(12, |r| seen.push(r.task_id)).await;

    assert_eq!(outcome.reports.len(), 12);
    assert_eq!(seen.len(), 12);
    let ids: BTreeSet<u64> = seen.iter().map(|t| t.0).collect();
    assert_eq!(ids, (0..12).collect());

    let s = &outcome.summary;
    assert_eq!(s.total_requests, 12);
    assert_eq!(s.workers, 3);
    assert_eq!((s.succeeded, s.failed_status, s.failed_decode, s.missing_field), (3, 3, 3, 3));
    assert_eq!(s.average_secs(), s.elapsed_secs / 12.0);
    for r in &outcome.reports {
        assert!(r.round_trip().unwrap() >= 0.0);
    }
}

#[tokio::test]
async fn hung_requests_do_not_block_siblings() {
    let url = spawn(app(MockConfig::with_plan(vec![Behavior::Generate, Behavior::Hang]))).await;
    let harness = Harness::new(dispatcher(&url, Duration::from_millis(300)), 4).unwrap();

    let outcome = harness.run(4, |_| {}).await;

    assert_eq!(outcome.summary.total_requests, 4);
    assert_eq!(outcome.summary.succeeded, 2);
    assert_eq!(outcome.summary.exceptions, 2);
    // successes arrive before the timeouts fire
    assert!(outcome.reports[0].outcome.is_success());
    assert!(outcome.reports[1].outcome.is_success());
    assert_eq!(harness.in_flight(), 0);
}

#[tokio::test]
async fn default_scenario_matches_worker_count() {
    let url = spawn(app(MockConfig { max_concurrency: 20, ..MockConfig::default() })).await;
    let harness = Harness::new(dispatcher(&url, Duration::from_secs(5)), 20).unwrap();

    let outcome = harness.run(20, |_| {}).await;

    assert_eq!(outcome.summary.total_requests, 20);
    assert_eq!(outcome.summary.succeeded, 20);
    assert_eq!(outcome.summary.average_secs(), outcome.summary.elapsed_secs / 20.0);
    let first = outcome.reports.iter().find(|r| r.task_id == TaskId(7)).unwrap();
    assert_eq!(first.prompt, "Request 7: Give me a short intro to large language models.");
    assert_eq!(
        first.response(),
        Some("echo: Request 7: Give me a short intro to large language models.")
    );
}

#[test]
fn zero_workers_is_rejected() {
    let d = dispatcher("http://127.0.0.1:1/generate", Duration::from_secs(1));
    assert!(Harness::new(d.clone(), 0).is_err());

    let harness = Harness::new(d, 3).unwrap();
    assert_eq!(harness.workers(), 3);
    assert_eq!(harness.in_flight(), 0);
}

#[test]
fn dispatcher_keeps_configured_timeout() {
    let d = dispatcher("http://127.0.0.1:1/generate", Duration::from_millis(250));
    assert_eq!(d.timeout(), Duration::from_millis(250));
}
