//! Per-task result reports and their text rendering.

use std::fmt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;

pub const SEPARATOR_WIDTH: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wall-clock stamps (seconds since the Unix epoch) taken around the call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClientTiming {
    pub send: f64,
    /// `None` when no reply was observed.
    pub receive: Option<f64>,
}

impl ClientTiming {
    pub fn round_trip(&self) -> Option<f64> {
        self.receive.map(|r| r - self.send)
    }
}

/// Captures the send stamp; `receive` is derived from a monotonic clock so the
/// round trip can never be negative.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    send: f64,
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self { send: unix_now(), started: Instant::now() }
    }

    pub fn stop(&self) -> ClientTiming {
        let receive = self.send + self.started.elapsed().as_secs_f64();
        ClientTiming { send: self.send, receive: Some(receive) }
    }

    pub fn abandon(&self) -> ClientTiming {
        ClientTiming { send: self.send, receive: None }
    }
}

pub fn unix_now() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or_default()
}

/// Timing the server chose to report. Any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ServerTiming {
    pub arrival: Option<f64>,
    pub serving_start: Option<f64>,
    pub inference_duration: Option<f64>,
    pub total_latency: Option<f64>,
}

impl ServerTiming {
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| obj.get(name).and_then(serde_json::Value::as_f64);
        Some(Self {
            arrival: field("arrival"),
            serving_start: field("serving_start"),
            inference_duration: field("inference_duration"),
            total_latency: field("total_latency"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded { response: String },
    FailedStatus { status: u16 },
    FailedDecode { status: u16, error: String, raw: String },
    MissingField { status: u16, field: String, raw: String },
    Exception { error: String },
}

impl Outcome {
    pub fn tag(&self) -> &'static str {
        match self {
            Outcome::Succeeded { .. } => "SUCCEEDED",
            Outcome::FailedStatus { .. } => "FAILED (status)",
            Outcome::FailedDecode { .. } => "FAILED (decode)",
            Outcome::MissingField { .. } => "FAILED (missing field)",
            Outcome::Exception { .. } => "EXCEPTION",
        }
    }

    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Succeeded { .. } => "succeeded",
            Outcome::FailedStatus { .. } => "failed_status",
            Outcome::FailedDecode { .. } => "failed_decode",
            Outcome::MissingField { .. } => "missing_field",
            Outcome::Exception { .. } => "exception",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultReport {
    pub task_id: TaskId,
    pub prompt: String,
    pub client: ClientTiming,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerTiming>,
    pub outcome: Outcome,
}

impl ResultReport {
    pub fn round_trip(&self) -> Option<f64> {
        self.client.round_trip()
    }

    pub fn response(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Succeeded { response } => Some(response),
            _ => None,
        }
    }
}

impl fmt::Display for ResultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.task_id;
        match &self.outcome {
            Outcome::Succeeded { response } => {
                writeln!(f, "[Request {id}]")?;
                self.write_client(f)?;
                self.write_server(f)?;
                writeln!(f, "Response: {response}")?;
            }
            Outcome::FailedStatus { status } => {
                writeln!(f, "[Request {id}] FAILED with status code {status}")?;
                self.write_client(f)?;
                writeln!(f, "Response: Request failed or timed out.")?;
            }
            Outcome::FailedDecode { status, error, raw } => {
                writeln!(f, "[Request {id}] FAILED: JSON decode error")?;
                writeln!(f, "Status: {status}")?;
                writeln!(f, "Error: {error}")?;
                self.write_client(f)?;
                writeln!(f, "Response Text: {raw}")?;
            }
            Outcome::MissingField { status, field, raw } => {
                writeln!(f, "[Request {id}] FAILED: missing field `{field}`")?;
                writeln!(f, "Status: {status}")?;
                self.write_client(f)?;
                self.write_server(f)?;
                writeln!(f, "Response Text: {raw}")?;
            }
            Outcome::Exception { error } => {
                writeln!(f, "[Request {id}] EXCEPTION: {error}")?;
                writeln!(f, "Client send time:     {:.6}", self.client.send)?;
            }
        }
        writeln!(f, "{}", "-".repeat(SEPARATOR_WIDTH))
    }
}

impl ResultReport {
    fn write_client(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Client send time:     {:.6}", self.client.send)?;
        if let Some(receive) = self.client.receive {
            writeln!(f, "Client receive time:  {receive:.6}")?;
            writeln!(f, "Round-trip time:      {:.2} s", receive - self.client.send)?;
        }
        Ok(())
    }

    fn write_server(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(server) = &self.server else { return Ok(()) };
        if let Some(v) = server.arrival { writeln!(f, "Server arrival time:  {v:.6}")?; }
        if let Some(v) = server.serving_start { writeln!(f, "Server serve start:   {v:.6}")?; }
        if let Some(v) = server.inference_duration { writeln!(f, "Server inference:     {v:.2} s")?; }
        if let Some(v) = server.total_latency { writeln!(f, "Server total latency: {v:.2} s")?; }
        Ok(())
    }
}
