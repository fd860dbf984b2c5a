use std::fmt;

use serde::Serialize;

use crate::report::{Outcome, ResultReport, SEPARATOR_WIDTH};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_requests: usize,
    pub workers: usize,
    pub elapsed_secs: f64,
    pub succeeded: usize,
    pub failed_status: usize,
    pub failed_decode: usize,
    pub missing_field: usize,
    pub exceptions: usize,
}

impl Summary {
    pub fn new(workers: usize) -> Self {
        Self { workers, ..Self::default() }
    }

    pub fn record(&mut self, report: &ResultReport) {
        self.total_requests += 1;
        match report.outcome {
            Outcome::Succeeded { .. } => self.succeeded += 1,
            Outcome::FailedStatus { .. } => self.failed_status += 1,
            Outcome::FailedDecode { .. } => self.failed_decode += 1,
            Outcome::MissingField { .. } => self.missing_field += 1,
            Outcome::Exception { .. } => self.exceptions += 1,
        }
    }

    pub fn failed(&self) -> usize {
        self.total_requests - self.succeeded
    }

    pub fn average_secs(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.elapsed_secs / self.total_requests as f64
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.total_requests;
        writeln!(f, "{}", "-".repeat(SEPARATOR_WIDTH))?;
        writeln!(f, "Total requests sent: {n}")?;
        writeln!(f, "Total time for {n} requests: {:.2} s", self.elapsed_secs)?;
        writeln!(f, "Average time per request: {:.2} s", self.average_secs())?;
        write!(
            f,
            "Outcomes: {} succeeded, {} failed (status), {} failed (decode), \
             {} missing field, {} exceptions",
            self.succeeded,
            self.failed_status,
            self.failed_decode,
            self.missing_field,
            self.exceptions
        )
    }
}
