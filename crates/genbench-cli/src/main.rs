use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use genbench_common::config::BenchConfig;
use genbench_core::{Dispatcher, Harness, ResultReport, TaskId};
use genbench_mock::{Behavior, MockConfig};
use opentelemetry_otlp::WithExportConfig;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "genbench",
    version,
    about = "Concurrent load generator for LLM /generate endpoints"
)]
struct Cli {
    /// Defaults to `run` with the built-in scenario.
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fire a batch of concurrent requests and print a report per task
    Run(RunArgs),
    /// Send a single prompt
    Once(OnceArgs),
    /// Serve a stub /generate endpoint
    Serve(ServeArgs),
    Version,
}

#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// Generation endpoint URL
    #[arg(long)]
    url: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<f64>,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    target: TargetArgs,
    #[arg(short, long)]
    workers: Option<usize>,
    /// Number of requests (defaults to one per worker)
    #[arg(short = 'n', long)]
    tasks: Option<usize>,
    /// `{id}` is replaced with the task id
    #[arg(long)]
    prompt_template: Option<String>,
    /// One JSON object per line instead of text blocks
    #[arg(long)]
    json: bool,
    /// Dump prometheus metrics after the summary
    #[arg(long)]
    metrics: bool,
}

#[derive(Args, Debug)]
struct OnceArgs {
    #[arg(short, long)]
    prompt: String,
    #[command(flatten)]
    target: TargetArgs,
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    #[arg(short, long, default_value_t = 8000)]
    port: u16,
    /// Comma-separated behaviours applied in arrival order:
    /// ok, status:<code>, not-json, missing-response, hang
    #[arg(long, value_delimiter = ',', default_value = "ok")]
    plan: Vec<Behavior>,
    /// Simulated inference time per generated reply
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,
    #[arg(long, default_value_t = 4)]
    max_concurrency: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run(args).await,
        Commands::Once(args) => once(args).await,
        Commands::Serve(args) => serve(args).await,
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(target: &TargetArgs) -> anyhow::Result<BenchConfig> {
    let mut cfg = BenchConfig::load()?;
    if let Some(url) = &target.url { cfg.url = url.clone(); }
    if let Some(t) = target.timeout_secs { cfg.timeout_secs = t; }
    Ok(cfg)
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(&args.target)?;
    if let Some(w) = args.workers { cfg.workers = w; }
    if let Some(n) = args.tasks { cfg.tasks = Some(n); }
    if let Some(t) = args.prompt_template { cfg.prompt_template = t; }

    genbench_obs::init();
    let dispatcher = Dispatcher::from_config(&cfg)?;
    tracing::info!(target: "cli", timeout = ?dispatcher.timeout(), "request timeout");
    let harness = Harness::new(dispatcher, cfg.workers)?;
    tracing::info!(
        target: "cli",
        workers = harness.workers(),
        tasks = cfg.task_count(),
        "worker pool ready"
    );
    let outcome = harness
        .run(cfg.task_count(), |report| {
            genbench_obs::record(report);
            emit(report, args.json);
        })
        .await;

    let summary = &outcome.summary;
    if args.json {
        let average_secs = summary.average_secs();
        let line = serde_json::json!({ "summary": summary, "average_secs": average_secs });
        println!("{line}");
    } else {
        println!("{summary}");
    }
    if args.metrics {
        print!("{}", genbench_obs::render());
    }
    Ok(())
}

async fn once(args: OnceArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args.target)?;
    let dispatcher = Dispatcher::from_config(&cfg)?;
    let report = dispatcher.dispatch_prompt(TaskId(0), args.prompt).await;
    emit(&report, args.json);
    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let addr = SocketAddr::new(args.host, args.port);
    let cfg = MockConfig {
        plan: args.plan,
        latency: Duration::from_millis(args.latency_ms),
        max_concurrency: args.max_concurrency,
    };
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!(target: "cli", "shutdown signal received");
    };
    genbench_mock::serve(addr, cfg, shutdown).await?;
    Ok(())
}

fn emit(report: &ResultReport, json: bool) {
    if !json {
        println!("{report}");
        return;
    }
    match serde_json::to_string(report) {
        Ok(line) => println!("{line}"),
        Err(e) => {
            tracing::warn!(target: "cli", task = report.task_id.0, "failed to encode report: {e}")
        }
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    // stdout is reserved for reports
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
            .install_simple()
            .ok();
        if let Some(tracer) = tracer {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .with(OpenTelemetryLayer::new(tracer))
                .init();
            return;
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
