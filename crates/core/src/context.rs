//! The conversation Context: one run's state, organized into iterations.
//!
//! A [`Context`] is a value. Every operation that changes it consumes the
//! old version and returns the next one, so the loop threads it through
//! each step and callers can keep (or diff) any intermediate snapshot.
//!
//! Iterations are append-only and kept in execution order. At most one
//! iteration is open (has no `completed_at`) at a time, and it is always
//! the last one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use uuid::Uuid;

use crate::message::Message;
use crate::tool::{ToolCall, ToolResult};

/// Unique identifier for a run's context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub String);

impl ContextId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token usage reported for one model call (or a sum of them).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Usage with `total_tokens` derived from input + output.
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Recorded on the first retained iteration after a compaction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionMark {
    pub strategy: String,
    pub removed: usize,
    pub at: DateTime<Utc>,
}

/// Per-iteration metadata.
///
/// The typed fields are the ones the runtime reads back; anything else a
/// hook wants to stash goes into `extra`, which serializes flat alongside
/// them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IterationMetadata {
    /// Usage reported by this iteration's model call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_usage: Option<TokenUsage>,

    /// Snapshot of the run total at the time usage was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_tokens: Option<TokenUsage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compaction: Option<CompactionMark>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One pass through the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    /// 1-based pass number
    pub number: u32,

    pub messages: Vec<Message>,

    /// Tool calls the model requested in this pass
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Results folded back in once tools ran
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,

    pub started_at: Option<DateTime<Utc>>,

    /// `None` while the iteration is open
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub metadata: IterationMetadata,
}

impl Iteration {
    /// A fresh, open iteration.
    pub fn open(number: u32) -> Self {
        Self {
            number,
            messages: Vec::new(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            started_at: Some(Utc::now()),
            completed_at: None,
            metadata: IterationMetadata::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }

    fn char_count(&self) -> usize {
        self.messages.iter().map(Message::char_count).sum()
    }
}

/// Options for [`Context::new`].
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Prepended to the first iteration when set
    pub system_prompt: Option<String>,
}

impl ContextOptions {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// The full state of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub id: ContextId,

    /// Execution order; never reordered
    pub iterations: Vec<Iteration>,

    /// Number of completed-or-in-progress iterations
    pub current_iteration: u32,

    pub created_at: DateTime<Utc>,
}

/// Approximate chars-per-token ratio for the estimate heuristic.
const CHARS_PER_TOKEN: usize = 4;

impl Context {
    /// Start a run: iteration 1 holds the optional system message and the
    /// user input.
    pub fn new(user_input: impl Into<String>, opts: ContextOptions) -> Self {
        let mut first = Iteration::open(1);
        if let Some(prompt) = opts.system_prompt {
            first.messages.push(Message::system(prompt));
        }
        first.messages.push(Message::user(user_input));

        Self {
            id: ContextId::new(),
            iterations: vec![first],
            current_iteration: 1,
            created_at: Utc::now(),
        }
    }

    /// The currently-open iteration, if any.
    pub fn open_iteration(&self) -> Option<&Iteration> {
        self.iterations.last().filter(|it| it.is_open())
    }

    /// Returns the open iteration, opening one if the context has none
    /// (e.g. after deserializing a finished run).
    fn open_iteration_mut(&mut self) -> &mut Iteration {
        let needs_open = self.iterations.last().is_none_or(|it| !it.is_open());
        if needs_open {
            self.current_iteration = self.current_iteration.max(1);
            if self.iterations.last().is_some() {
                self.current_iteration += 1;
            }
            self.iterations.push(Iteration::open(self.current_iteration));
        }
        let last = self.iterations.len() - 1;
        &mut self.iterations[last]
    }

    // ── Conversation updates ──────────────────────────────────────────

    /// Append the model's reply (and any tool calls it requested) to the
    /// open iteration.
    pub fn add_assistant_message(mut self, content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let iteration = self.open_iteration_mut();
        iteration.tool_calls.extend(tool_calls.iter().cloned());
        iteration
            .messages
            .push(Message::assistant_with_tools(content, tool_calls));
        self
    }

    /// Fold tool results into the open iteration, complete it, and open the
    /// next one. The only operation that advances `current_iteration`.
    pub fn add_tool_results(mut self, results: Vec<ToolResult>) -> Self {
        let iteration = self.open_iteration_mut();
        iteration.messages.push(Message::tool_results(&results));
        iteration.tool_results.extend(results);
        iteration.completed_at = Some(Utc::now());

        self.current_iteration += 1;
        self.iterations.push(Iteration::open(self.current_iteration));
        self
    }

    /// Record the open iteration's usage and refresh the cumulative snapshot.
    pub fn add_token_usage(mut self, usage: TokenUsage) -> Self {
        self.open_iteration_mut().metadata.current_usage = Some(usage);
        let cumulative = self.cumulative_tokens();
        self.open_iteration_mut().metadata.cumulative_tokens = Some(cumulative);
        self
    }

    /// Sum of every iteration's `current_usage`, recomputed from scratch.
    /// Iterations without usage count as zero.
    pub fn cumulative_tokens(&self) -> TokenUsage {
        self.iterations
            .iter()
            .filter_map(|it| it.metadata.current_usage)
            .sum()
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Inclusive: reaching the limit counts as exceeded.
    pub fn exceeded_max_iterations(&self, max_iterations: u32) -> bool {
        self.current_iteration >= max_iterations
    }

    /// Tool calls attached to the last message of the open iteration.
    pub fn extract_tool_calls(&self) -> Vec<ToolCall> {
        self.open_iteration()
            .and_then(|it| it.messages.last())
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default()
    }

    /// All messages, in iteration order then within-iteration order.
    pub fn to_messages(&self) -> Vec<Message> {
        self.iterations
            .iter()
            .flat_map(|it| it.messages.iter().cloned())
            .collect()
    }

    // ── Pruning ───────────────────────────────────────────────────────

    /// Keep only the last `n` iterations. No-op when `n >= len`.
    ///
    /// `n == 0` is treated as 1: the open iteration is never dropped.
    pub fn keep_last_iterations(mut self, n: usize) -> Self {
        let n = n.max(1);
        let len = self.iterations.len();
        if n < len {
            self.iterations.drain(..len - n);
        }
        self
    }

    /// Drop iterations completed more than `max_age` ago.
    pub fn remove_old_iterations(self, max_age: Duration) -> Self {
        let cutoff = Utc::now() - max_age;
        self.remove_iterations_completed_before(cutoff)
    }

    /// Drop iterations completed before `cutoff`. Open iterations stay.
    pub fn remove_iterations_completed_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.iterations
            .retain(|it| it.completed_at.is_none_or(|done| done >= cutoff));
        self
    }

    /// Record a compaction pass on the first retained iteration.
    pub fn mark_compacted(mut self, strategy: impl Into<String>, removed: usize) -> Self {
        if let Some(first) = self.iterations.first_mut() {
            first.metadata.compaction = Some(CompactionMark {
                strategy: strategy.into(),
                removed,
                at: Utc::now(),
            });
        }
        self
    }

    // ── Token estimation ──────────────────────────────────────────────

    /// Rough token count: characters / 4 over all message content.
    ///
    /// An approximation (typically ±20–30% against real tokenizers). Use it
    /// for pruning decisions, never for accounting.
    pub fn estimate_token_count(&self) -> usize {
        let chars: usize = self.iterations.iter().map(Iteration::char_count).sum();
        chars / CHARS_PER_TOKEN
    }

    pub fn exceeds_token_budget(&self, budget: usize) -> bool {
        self.estimate_token_count() > budget
    }

    /// Estimated tokens left before `budget`, floored at 0.
    pub fn tokens_remaining(&self, budget: usize) -> usize {
        budget.saturating_sub(self.estimate_token_count())
    }

    /// Estimated size as a fraction of `budget`; may exceed 1.0.
    pub fn budget_utilization(&self, budget: usize) -> f64 {
        let estimate = self.estimate_token_count();
        if budget == 0 {
            return if estimate == 0 { 0.0 } else { f64::INFINITY };
        }
        estimate as f64 / budget as f64
    }
}
