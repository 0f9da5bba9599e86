pub mod multi_state;
pub mod types;

pub use multi_state::{MultiStateRunner, RunnerError};
pub use types::{Finding, PageRollup, PageState, PageStatus, PageTestOutcome, TestResult};
