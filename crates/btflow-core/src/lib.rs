//! # btflow-core — Layer 1: behavior-tree execution types
//!
//! **Purpose**: the pure types and trait contracts a behavior-tree runtime is built
//! from — status, state store, tree/composite/decorator semantics, and the three
//! plug-in seams (`Behavior`/`AsyncLeaf`, `Tool`, `LlmProvider`).
//!
//! This crate has no dependency on `tokio`'s runtime machinery beyond the trait
//! signatures `async-trait` needs to stay dyn-safe — it defines *what* an async
//! leaf or provider looks like, not how one gets spawned or polled. The concrete
//! tokio-backed scheduler, checkpointer, and tool dispatcher live in
//! `btflow-runtime`.
//!
//! ## What lives here
//! - `status`: the four-value tick outcome.
//! - `state`: schema-checked field store with per-field reducers and subscribers.
//! - `behavior`: the node lifecycle contract every leaf/composite/decorator meets.
//! - `tree`: the arena, composites (`Sequence`/`Selector`/`Parallel`), decorators
//!   (`Inverter`/`LoopUntilSuccess`), and the tick algorithm.
//! - `tool` / `llm`: the plug-in contracts external tool and model integrations
//!   implement.
//! - `visitor`: read-only observers of a tick walk.
//!
//! ## What doesn't
//! No concrete async-leaf adapter (that needs a tokio executor — see
//! `btflow_runtime::async_leaf`), no checkpoint persistence, no tool runtime
//! dispatch, no LLM provider, no CLI. Those are all downstream.

#![forbid(unsafe_code)]

mod async_leaf;
mod behavior;
mod error;
mod llm;
mod status;
mod tool;
mod value;
mod visitor;

pub mod state;
pub mod tree;

pub use async_leaf::AsyncLeaf;
pub use behavior::{Behavior, WakeFn};
pub use error::{BtflowError, Result};
pub use llm::{LlmError, LlmMessage, LlmProvider, LlmRequest, MessageChunk, ToolCall};
pub use status::Status;
pub use tool::{BoxFuture, FunctionTool, Tool, ToolError, ToolResult, ToolRun, ToolSchema};
pub use value::Value;
pub use visitor::Visitor;
