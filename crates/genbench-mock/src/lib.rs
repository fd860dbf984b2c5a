//! Stub generation server speaking the `/generate` wire contract

pub mod behavior;
pub mod generator;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use genbench_common::Result;
use once_cell::sync::Lazy;
use prometheus::{Encoder, Histogram, IntCounter, TextEncoder};
use tokio::sync::Semaphore;

pub use behavior::Behavior;
pub use generator::{EchoGenerator, TextGenerator};

static REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    prometheus::register_int_counter!(
        "genbench_mock_requests_total",
        "Total number of /generate requests"
    )
    .expect("counter")
});
static LATENCY_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    prometheus::register_histogram!(
        "genbench_mock_total_latency_seconds",
        "Server-side latency of generated replies"
    )
    .expect("histogram")
});

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// The n-th request to arrive is answered with `plan[n % plan.len()]`.
    pub plan: Vec<Behavior>,
    /// Simulated inference time for `Behavior::Generate`.
    pub latency: Duration,
    /// Requests served at once; the rest wait, which shows up as the gap
    /// between `arrival` and `serving_start`.
    pub max_concurrency: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self { plan: vec![Behavior::Generate], latency: Duration::ZERO, max_concurrency: 4 }
    }
}

impl MockConfig {
    pub fn with_plan(plan: Vec<Behavior>) -> Self {
        Self { plan, ..Self::default() }
    }
}

#[derive(Clone)]
struct AppState {
    generator: Arc<dyn TextGenerator>,
    plan: Arc<[Behavior]>,
    arrivals: Arc<AtomicUsize>,
    permits: Arc<Semaphore>,
    latency: Duration,
}

pub fn app(cfg: MockConfig) -> Router {
    app_with_generator(cfg, Arc::new(EchoGenerator::new()))
}

pub fn app_with_generator(cfg: MockConfig, generator: Arc<dyn TextGenerator>) -> Router {
    let plan: Arc<[Behavior]> = if cfg.plan.is_empty() {
        Arc::from(vec![Behavior::Generate])
    } else {
        Arc::from(cfg.plan)
    };
    let state = AppState {
        generator,
        plan,
        arrivals: Arc::new(AtomicUsize::new(0)),
        permits: Arc::new(Semaphore::new(cfg.max_concurrency.max(1))),
        latency: cfg.latency,
    };
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(metrics))
        .route("/generate", post(generate))
        .with_state(state)
}

/// Binds `addr` and serves until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, cfg: MockConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let plan = cfg.plan.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(target: "mock", plan = %plan, "listening on http://{}", local);
    axum::serve(listener, app(cfg)).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default()
}

async fn metrics() -> Response {
    let _ = &*REQUESTS_TOTAL;
    let _ = &*LATENCY_SECONDS;
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    ([("content-type", encoder.format_type().to_string())], buffer).into_response()
}

#[derive(serde::Deserialize)]
struct GenerateRequest {
    prompt: String,
}

#[derive(serde::Serialize)]
struct Timing {
    arrival: f64,
    serving_start: f64,
    inference_duration: f64,
    total_latency: f64,
}

#[derive(serde::Serialize)]
struct GenerateResponse {
    response: String,
    timing: Timing,
}

async fn generate(State(state): State<AppState>, Json(req): Json<GenerateRequest>) -> Response {
    let arrival = unix_now();
    REQUESTS_TOTAL.inc();
    let n = state.arrivals.fetch_add(1, Ordering::Relaxed);
    let behavior = state.plan[n % state.plan.len()];
    tracing::debug!(target: "mock", request = n, %behavior, "generate request");

    match behavior {
        Behavior::Status(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "injected failure").into_response()
        }
        Behavior::NotJson => (StatusCode::OK, "not-json").into_response(),
        Behavior::MissingResponse => {
            Json(serde_json::json!({ "detail": "no response produced" })).into_response()
        }
        Behavior::Hang => std::future::pending::<Response>().await,
        Behavior::Generate => {
            let Ok(_permit) = state.permits.acquire().await else {
                return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
            };
            let serving_start = unix_now();
            let started = Instant::now();
            if !state.latency.is_zero() {
                tokio::time::sleep(state.latency).await;
            }
            let text = match state.generator.generate(&req.prompt) {
                Ok(text) => text,
                Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
            };
            let inference_duration = started.elapsed().as_secs_f64();
            let total_latency = unix_now() - arrival;
            LATENCY_SECONDS.observe(total_latency);
            Json(GenerateResponse {
                response: text,
                timing: Timing { arrival, serving_start, inference_duration, total_latency },
            })
            .into_response()
        }
    }
}
