//! Per-run usage summary.

use ironloop_core::context::{Context, TokenUsage};
use serde::{Deserialize, Serialize};

/// What a run consumed, derived from its final Context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Iterations the run went through
    pub iterations: u32,
    /// Iterations still present in the context after compaction
    pub retained_iterations: usize,
    pub tool_calls: usize,
    pub failed_tool_calls: usize,
    /// Sum of reported usage over retained iterations
    pub tokens: TokenUsage,
    /// Heuristic size of the retained conversation
    pub estimated_context_tokens: usize,
}

impl UsageReport {
    pub fn from_context(ctx: &Context) -> Self {
        let results = ctx.iterations.iter().flat_map(|it| it.tool_results.iter());
        let (tool_calls, failed_tool_calls) =
            results.fold((0, 0), |(all, failed), r| (all + 1, failed + usize::from(r.is_failure())));

        Self {
            iterations: ctx.current_iteration,
            retained_iterations: ctx.iterations.len(),
            tool_calls,
            failed_tool_calls,
            tokens: ctx.cumulative_tokens(),
            estimated_context_tokens: ctx.estimate_token_count(),
        }
    }
}
