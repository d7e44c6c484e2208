use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmelterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Scan error: {0}")]
    Scan(#[from] smelter_annotate::ScanError),
    #[error("Content error: {0}")]
    Content(#[from] crate::content::ContentError),
    #[error("Workflow error: {0}")]
    Workflow(#[from] crate::workflow::WorkflowError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SmelterError>;
