//! # btflow-runtime — Layer 2: the executable agent
//!
//! **Purpose**: wires `btflow-core`'s types onto a tokio executor — the concrete
//! `AsyncLeaf` adapter, the reactive ticking scheduler, a two-mode agent facade,
//! file-backed checkpointing, tool-call dispatch with retries, and the async-local
//! trace bus.
//!
//! ## What lives here
//! - `async_leaf`: spawns an `AsyncLeaf` onto tokio and bridges completion back
//!   into `Behavior::update`'s synchronous polling model.
//! - `runner`: `ReactiveRunner`, the wake-driven tick loop.
//! - `facade`: `AgentFacade`, the `step`/`run`/`reset` entry point built on top.
//! - `checkpoint`: the `Checkpointer` trait plus a file-backed and an in-memory
//!   implementation.
//! - `tool_runtime`: a `ToolRegistry` and `execute_tool` dispatch (merge, retry,
//!   observation formatting).
//! - `trace`: async-local span/event tracing.
//! - `config`: `RunnerConfig`/`ToolRuntimeConfig` with a TOML+env loader.
//!
//! No concrete LLM provider, CLI, or distributed scheduling lives here — those are
//! downstream.

mod async_leaf;
pub mod checkpoint;
pub mod config;
mod error;
pub mod facade;
pub mod runner;
pub mod tool_runtime;
pub mod trace;

pub use async_leaf::AsyncLeafNode;
pub use error::{BtflowError, Result, RuntimeError};
pub use facade::{AgentFacade, RunRequest};
pub use runner::{ReactiveRunner, RunOptions};
