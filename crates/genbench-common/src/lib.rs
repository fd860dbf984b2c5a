pub type Result<T> = core::result::Result<T, BenchError>;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0}")]
    Message(String),
}

pub mod config {
    use serde::Deserialize;
    use std::env;
    use std::time::Duration;

    use crate::{BenchError, Result};

    pub const DEFAULT_URL: &str = "http://localhost:8000/generate";
    pub const DEFAULT_WORKERS: usize = 20;
    pub const DEFAULT_TIMEOUT_SECS: f64 = 2400.0;
    pub const DEFAULT_PROMPT_TEMPLATE: &str =
        "Request {id}: Give me a short intro to large language models.";

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(default)]
    pub struct BenchConfig {
        pub url: String,
        pub workers: usize,
        /// Number of tasks to dispatch; `None` means one per worker.
        pub tasks: Option<usize>,
        pub timeout_secs: f64,
        /// `{id}` is replaced by the task id.
        pub prompt_template: String,
    }

    impl Default for BenchConfig {
        fn default() -> Self {
            Self {
                url: DEFAULT_URL.to_string(),
                workers: DEFAULT_WORKERS,
                tasks: None,
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            }
        }
    }

    impl BenchConfig {
        /// Reads `GENBENCH_CONFIG` if set, then applies `GENBENCH_*` overrides.
        pub fn load() -> Result<Self> {
            let mut cfg = match env::var("GENBENCH_CONFIG") {
                Ok(path) => Self::from_yaml_str(&std::fs::read_to_string(path)?)?,
                Err(_) => Self::default(),
            };
            cfg.apply_overrides(|key| env::var(key).ok());
            Ok(cfg)
        }

        pub fn from_yaml_str(text: &str) -> Result<Self> {
            Ok(serde_yaml::from_str(text)?)
        }

        /// Unparseable numeric values are ignored, like missing ones.
        pub fn apply_overrides<F>(&mut self, lookup: F)
        where
            F: Fn(&str) -> Option<String>,
        {
            if let Some(v) = lookup("GENBENCH_URL") { self.url = v; }
            if let Some(v) = lookup("GENBENCH_WORKERS").and_then(|v| v.parse().ok()) { self.workers = v; }
            if let Some(v) = lookup("GENBENCH_TASKS").and_then(|v| v.parse().ok()) { self.tasks = Some(v); }
            if let Some(v) = lookup("GENBENCH_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
                self.timeout_secs = v;
            }
            if let Some(v) = lookup("GENBENCH_PROMPT_TEMPLATE") { self.prompt_template = v; }
        }

        pub fn validate(&self) -> Result<()> {
            if self.url.trim().is_empty() {
                return Err(BenchError::Config("url must not be empty".into()));
            }
            if self.workers == 0 {
                return Err(BenchError::Config("workers must be at least 1".into()));
            }
            if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
                return Err(BenchError::Config(format!(
                    "timeout_secs must be a positive number, got {}",
                    self.timeout_secs
                )));
            }
            self.timeout()?;
            Ok(())
        }

        pub fn task_count(&self) -> usize {
            self.tasks.unwrap_or(self.workers)
        }

        /// Fails for values a `Duration` cannot hold.
        pub fn timeout(&self) -> Result<Duration> {
            Duration::try_from_secs_f64(self.timeout_secs).map_err(|e| {
                BenchError::Config(format!("timeout_secs {} out of range: {e}", self.timeout_secs))
            })
        }
    }
}
