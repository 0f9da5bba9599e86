pub mod executor;
pub mod types;

pub use executor::execute_with_session;
pub use types::{
    ExecutionOutcome, MissingEnvVar, PageSetupScript, ScriptScope, ScriptStep, Trigger,
    resolve_value,
};
