//! Runtime-level errors: everything `btflow-core::BtflowError` doesn't already
//! cover because it only arises once a tokio executor, filesystem, or clock enters
//! the picture.

pub use btflow_core::BtflowError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] BtflowError),

    #[error("checkpoint I/O failed for thread '{thread_id}': {source}")]
    CheckpointIo {
        thread_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint for thread '{thread_id}' has no parseable record: {message}")]
    CheckpointCorrupt { thread_id: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("tool '{name}' not found in registry")]
    ToolNotFound { name: String },

    #[error("tool '{name}' failed after {attempts} attempt(s): {source}")]
    ToolFailed {
        name: String,
        attempts: u32,
        #[source]
        source: btflow_core::ToolError,
    },

    #[error("{0}")]
    Llm(#[from] btflow_core::LlmError),

    #[error("facade mode violation: {0}")]
    ModeViolation(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
