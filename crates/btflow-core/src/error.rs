//! Unified error taxonomy for the core crate.
//!
//! One enum per crate, `thiserror`-derived, mirrors the pattern in `aura-core`'s
//! `AuraError`: a flat set of named variants rather than a hierarchy of error types
//! per module, so callers match on a single `Result<T, BtflowError>`.

/// Error kinds raised by the state store, tree, and tool contracts (§7 error taxonomy).
#[derive(Debug, Clone, thiserror::Error)]
pub enum BtflowError {
    /// State `initialize`/`update` failed schema validation; the store is unchanged.
    #[error("schema error on field '{field}': {message}")]
    Schema { field: String, message: String },

    /// A reducer bound to a field raised while combining old/new values.
    #[error("reducer for field '{field}' failed: {message}")]
    Reducer { field: String, message: String },

    /// A node's `update`/`update_async` returned something other than a `Status`, or
    /// panicked. The node itself maps this to `Status::Failure`; this variant is for
    /// callers that need to observe the failure (e.g. trace events).
    #[error("node '{node}' failed: {message}")]
    NodeInternal { node: String, message: String },

    /// Checkpoint file read back a corrupt trailing record with no prior complete
    /// record to fall back to (§4.9 "Corrupted tail lines... fall back").
    #[error("checkpoint for thread '{thread_id}' is corrupt: {message}")]
    CheckpointCorrupt { thread_id: String, message: String },

    /// `step()` called while `run()` is active, or vice versa (§7 mode guard).
    #[error("concurrent mode violation: {message}")]
    ConcurrentModeViolation { message: String },

    /// Tool lookup, argument validation, or execution failed (§7 tool error kinds,
    /// collapsed into one variant since they are surfaced as observations, not
    /// propagated exceptions — see `btflow_core::tool::ToolError` for the finer code).
    #[error("tool error: {message}")]
    Tool { message: String },

    /// Catch-all for I/O and (de)serialization failures at crate boundaries.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl BtflowError {
    pub fn schema(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn reducer(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reducer {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn node_internal(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeInternal {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BtflowError>;
