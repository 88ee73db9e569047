use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchLensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Component not found: {0}")]
    ComponentNotFound(String),

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("Unsatisfiable task dependencies (cycle or missing task) among: {}", pending.join(", "))]
    UnsatisfiableDependencies { pending: Vec<String> },

    #[error("Scheduling run exceeded its deadline of {0:?}")]
    RunTimedOut(std::time::Duration),

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl ArchLensError {
    /// True for errors that abort a whole scheduling run.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ArchLensError::DuplicateTask(_)
                | ArchLensError::UnknownDependency { .. }
                | ArchLensError::UnsatisfiableDependencies { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ArchLensError>;
