//! # ironloop core
//!
//! Domain types, traits, and error definitions for the ironloop
//! tool-calling runtime. This crate has **zero framework dependencies**:
//! it defines the value model (the conversation [`Context`]) and the
//! seams (tools, model clients, events) every other crate builds on.
//!
//! ## Design Philosophy
//!
//! - The [`Context`] is a plain value: every operation consumes it and
//!   returns the next version, so a run's state can be cloned, diffed and
//!   serialized at any point.
//! - External collaborators (the model client, the tools) are traits here.
//!   Implementations live elsewhere.
//! - Call-scoped data (agent identity, actor, tenant) travels in an
//!   [`ExecutionFrame`], never on the Context.

pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod model;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use context::{
    CompactionMark, Context, ContextId, ContextOptions, Iteration, IterationMetadata, TokenUsage,
};
pub use error::{Error, ErrorKind, ModelError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role};
pub use model::{AnswerFormat, ModelClient, ModelRequest, ModelResponse};
pub use tool::{
    ExecutionFrame, OnError, Tool, ToolCall, ToolDefinition, ToolOutcome, ToolRegistry,
    ToolResult,
};
