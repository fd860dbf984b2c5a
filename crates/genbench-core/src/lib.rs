//! Load-generation harness: dispatcher, worker pool, reports and summary

pub mod dispatch;
pub mod pool;
pub mod prompt;
pub mod report;
pub mod summary;

pub use dispatch::Dispatcher;
pub use pool::{Harness, RunOutcome};
pub use prompt::PromptTemplate;
pub use report::{ClientTiming, Outcome, ResultReport, ServerTiming, TaskId};
pub use summary::Summary;
