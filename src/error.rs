use thiserror::Error;

#[derive(Error, Debug)]
pub enum SafeUpdateError {
    #[error("Project validation failed: {0}")]
    ProjectValidation(String),

    #[error("Manifest parsing failed: {0}")]
    ManifestParsing(String),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("Registry request failed: {0}")]
    Registry(String),

    /// Raised by interactive collaborators when the operator aborts a prompt.
    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SafeUpdateError>;
