//! Domain event system: observability without coupling.
//!
//! The loop and its extension points publish events as things happen.
//! Listeners subscribe to react; having no listener never changes control
//! flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A loop pass began
    IterationStarted {
        context_id: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// A loop pass folded its tool results back in
    IterationCompleted {
        context_id: String,
        iteration: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        halted: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Cumulative usage crossed the warn threshold
    BudgetWarning {
        cumulative_tokens: u64,
        limit: u64,
        threshold_pct: f64,
        timestamp: DateTime<Utc>,
    },

    /// A compactor ran over the context
    ContextCompacted {
        strategy: String,
        before: usize,
        after: usize,
        removed: usize,
        timestamp: DateTime<Utc>,
    },

    /// The run produced a final answer
    RunCompleted {
        context_id: String,
        iterations: u32,
        total_tokens: u64,
        timestamp: DateTime<Utc>,
    },

    /// The run terminated with an error
    RunFailed {
        context_id: String,
        kind: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
