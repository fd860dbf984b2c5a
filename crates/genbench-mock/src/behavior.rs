use std::fmt;
use std::str::FromStr;

use genbench_common::BenchError;

/// How the stub answers one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// 200 with `response` and `timing`.
    Generate,
    Status(u16),
    /// 200 with a body that is not JSON.
    NotJson,
    /// 200 with JSON lacking `response`.
    MissingResponse,
    /// Never replies.
    Hang,
}

impl FromStr for Behavior {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ok" | "generate" => Ok(Behavior::Generate),
            "not-json" => Ok(Behavior::NotJson),
            "missing-response" => Ok(Behavior::MissingResponse),
            "hang" => Ok(Behavior::Hang),
            other => {
                let code = other
                    .strip_prefix("status:")
                    .and_then(|c| c.parse::<u16>().ok())
                    .filter(|c| (100..=999).contains(c))
                    .ok_or_else(|| BenchError::Config(format!("unknown behavior `{other}`")))?;
                Ok(Behavior::Status(code))
            }
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Behavior::Generate => f.write_str("ok"),
            Behavior::Status(code) => write!(f, "status:{code}"),
            Behavior::NotJson => f.write_str("not-json"),
            Behavior::MissingResponse => f.write_str("missing-response"),
            Behavior::Hang => f.write_str("hang"),
        }
    }
}
