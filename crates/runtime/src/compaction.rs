//! Context compaction: prune old iterations to keep the conversation
//! within resource limits.
//!
//! Both strategies keep at least one iteration. When the token target and
//! that floor disagree, the floor wins and the context may stay over
//! budget.

use ironloop_config::{CompactionConfig, CompactionStrategy};
use ironloop_core::context::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a single compaction pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionReport {
    pub strategy: String,
    pub before: usize,
    pub after: usize,
    pub removed: usize,
}

pub trait ContextCompactor: Send + Sync {
    fn name(&self) -> &str;

    /// Compact `ctx`, returning the pruned context and what happened.
    fn compact(&self, ctx: Context) -> (Context, CompactionReport);
}

/// Build the configured compactor, if any.
pub fn from_config(config: &CompactionConfig) -> Option<Box<dyn ContextCompactor>> {
    match config.strategy {
        CompactionStrategy::None => None,
        CompactionStrategy::SlidingWindow => Some(Box::new(SlidingWindow::new(config.window_size))),
        CompactionStrategy::TokenBased => config
            .token_budget
            .map(|budget| Box::new(TokenBased::new(budget).with_threshold(config.threshold)) as Box<dyn ContextCompactor>),
    }
}

fn finish(name: &str, ctx: Context, before: usize) -> (Context, CompactionReport) {
    let after = ctx.iterations.len();
    let removed = before - after;
    let ctx = if removed > 0 {
        ctx.mark_compacted(name, removed)
    } else {
        ctx
    };
    debug!(strategy = name, before, after, removed, "Context compacted");
    let report = CompactionReport {
        strategy: name.to_string(),
        before,
        after,
        removed,
    };
    (ctx, report)
}

// ── Sliding window ──────────────────────────────────────────────────

/// Keep the last `window_size` iterations, whatever their size.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window_size: usize,
}

impl SlidingWindow {
    pub fn new(window_size: usize) -> Self {
        Self { window_size }
    }
}

impl ContextCompactor for SlidingWindow {
    fn name(&self) -> &str {
        "sliding_window"
    }

    fn compact(&self, ctx: Context) -> (Context, CompactionReport) {
        let before = ctx.iterations.len();
        finish(self.name(), ctx.keep_last_iterations(self.window_size), before)
    }
}

// ── Token based ─────────────────────────────────────────────────────

/// Drop the oldest iteration while estimated utilization of `budget` is at
/// or above `threshold`.
#[derive(Debug, Clone)]
pub struct TokenBased {
    budget: usize,
    threshold: f64,
}

impl TokenBased {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            threshold: 1.0,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl ContextCompactor for TokenBased {
    fn name(&self) -> &str {
        "token_based"
    }

    fn compact(&self, mut ctx: Context) -> (Context, CompactionReport) {
        let before = ctx.iterations.len();
        while ctx.iterations.len() > 1 && ctx.budget_utilization(self.budget) >= self.threshold {
            let keep = ctx.iterations.len() - 1;
            ctx = ctx.keep_last_iterations(keep);
        }
        finish(self.name(), ctx, before)
    }
}
