//thiserror-based error types for the harness edge (task outcomes are not errors)
use probe_types::{SpecError, TaskRole};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    /// More than one mode argument. Displays the exact diagnostic the CLI prints.
    #[error("Incorrect format.")]
    InvalidInvocation { args: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("scheduling: {0}")]
    Spec(#[from] SpecError),
    #[error("failed to spawn {role} task: {source}")]
    Spawn {
        role: TaskRole,
        #[source]
        source: std::io::Error,
    },
    #[error("{role} task panicked")]
    TaskPanicked { role: TaskRole },
}
