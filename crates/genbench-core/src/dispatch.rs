//! One request lifecycle: build prompt, POST, stamp, classify.

use std::error::Error as _;
use std::time::Duration;

use genbench_common::config::BenchConfig;
use genbench_common::{BenchError, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::prompt::PromptTemplate;
use crate::report::{Outcome, ResultReport, ServerTiming, Stopwatch, TaskId};

pub const RESPONSE_FIELD: &str = "response";
pub const TIMING_FIELD: &str = "timing";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

/// Issues generation requests. Cheap to share behind an `Arc`; the inner
/// client pools connections.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    url: String,
    timeout: Duration,
    prompt: PromptTemplate,
}

impl Dispatcher {
    pub fn new(url: impl Into<String>, timeout: Duration, prompt: PromptTemplate) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BenchError::Message(format!("failed to build http client: {e}")))?;
        Ok(Self { client, url: url.into(), timeout, prompt })
    }

    pub fn from_config(cfg: &BenchConfig) -> Result<Self> {
        cfg.validate()?;
        let prompt = PromptTemplate::new(cfg.prompt_template.clone());
        Self::new(cfg.url.clone(), cfg.timeout()?, prompt)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn dispatch(&self, task_id: TaskId) -> ResultReport {
        let prompt = self.prompt.render(task_id);
        self.dispatch_prompt(task_id, prompt).await
    }

    /// Never fails: every failure mode is folded into the returned report.
    pub async fn dispatch_prompt(&self, task_id: TaskId, prompt: String) -> ResultReport {
        tracing::debug!(target: "dispatch", task = task_id.0, url = %self.url, "sending");
        let watch = Stopwatch::start();
        let reply = self.call(&prompt).await;
        let (client, server, outcome) = match reply {
            Ok((status, body)) => {
                let client = watch.stop();
                let (server, outcome) = classify(status.as_u16(), body);
                (client, server, outcome)
            }
            Err(err) => {
                let client = watch.abandon();
                (client, None, Outcome::Exception { error: self.describe(&err) })
            }
        };
        match &outcome {
            Outcome::Succeeded { .. } => {
                let rtt = client.round_trip();
                tracing::debug!(target: "dispatch", task = task_id.0, rtt, "completed")
            }
            other => {
                let outcome = other.tag();
                tracing::warn!(target: "dispatch", task = task_id.0, outcome, "request failed")
            }
        }
        ResultReport { task_id, prompt, client, server, outcome }
    }

    /// The measured call: request, headers and full body.
    async fn call(&self, prompt: &str) -> reqwest::Result<(StatusCode, String)> {
        let resp = self.client.post(&self.url).json(&GenerateRequest { prompt }).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        Ok((status, body))
    }

    fn describe(&self, err: &reqwest::Error) -> String {
        let mut text = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        if err.is_timeout() {
            format!("timed out after {:?}: {text}", self.timeout)
        } else {
            text
        }
    }
}

/// Turns a received reply into an outcome. Only status 200 is a success.
pub fn classify(status: u16, body: String) -> (Option<ServerTiming>, Outcome) {
    if status != StatusCode::OK.as_u16() {
        return (None, Outcome::FailedStatus { status });
    }
    let json: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => return (None, Outcome::FailedDecode { status, error: e.to_string(), raw: body }),
    };
    let server = json.get(TIMING_FIELD).and_then(ServerTiming::from_json);
    match json.get(RESPONSE_FIELD).and_then(serde_json::Value::as_str) {
        Some(text) => (server, Outcome::Succeeded { response: text.to_string() }),
        None => {
            let field = RESPONSE_FIELD.to_string();
            (server, Outcome::MissingField { status, field, raw: body })
        }
    }
}
