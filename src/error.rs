use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to build worker command: {0}")]
    CommandBuild(String),

    #[error("Failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Node operation failed: {0}")]
    Ops(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
