//! The iteration loop implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ironloop_config::RuntimeConfig;
use ironloop_core::context::{Context, ContextOptions};
use ironloop_core::error::{Error, Result};
use ironloop_core::event::{DomainEvent, EventBus};
use ironloop_core::model::{AnswerFormat, ModelClient, ModelRequest, ModelResponse};
use ironloop_core::tool::{ExecutionFrame, OnError, ToolRegistry};
use ironloop_telemetry::{BudgetConfig, TokenBudgetTracker, UsageReport};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::compaction;
use crate::executor::ToolExecutor;
use crate::hooks::{CompactionHook, HookPipeline, IterationHooks, ProcessorHook};
use crate::processors;
use crate::token;

/// Why a successful run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without requesting tools
    FinalAnswer,
    /// A tool returned the halt signal
    Halted { tool: String },
}

/// A successful run: the answer plus the final context.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub answer: Value,
    pub stop_reason: StopReason,
    pub usage: UsageReport,
    pub context: Context,
}

impl RunOutcome {
    fn new(answer: Value, context: Context, stop_reason: StopReason) -> Self {
        Self {
            answer,
            stop_reason,
            usage: UsageReport::from_context(&context),
            context,
        }
    }
}

/// The loop that drives model calls and tool execution for one request at
/// a time.
///
/// The agent itself holds no per-run state; each [`run`](Self::run) owns
/// its own [`Context`], so one `AgentLoop` can serve concurrent runs.
pub struct AgentLoop {
    /// The model-client collaborator
    model: Arc<dyn ModelClient>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,

    /// Extension points applied every iteration
    hooks: HookPipeline,

    budget: BudgetConfig,

    /// Iteration ceiling; reaching it is fatal
    max_iterations: u32,

    /// What a failing tool call does to its batch
    on_error: OnError,

    /// Per tool call, enforced by the executor
    tool_timeout: Option<Duration>,

    answer_format: AnswerFormat,

    /// Agent identity handed to every tool call
    frame: ExecutionFrame,

    system_prompt: Option<String>,
}

impl AgentLoop {
    /// Create a new loop with default limits.
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self {
            model,
            tools,
            event_bus,
            hooks: HookPipeline::new(),
            budget: BudgetConfig::default(),
            max_iterations: 10,
            on_error: OnError::default(),
            tool_timeout: None,
            answer_format: AnswerFormat::default(),
            frame: ExecutionFrame::new("ironloop"),
            system_prompt: None,
        }
    }

    /// Build a loop from configuration: limits, budget, identity, and the
    /// processor and compaction hooks it describes.
    pub fn from_config(
        config: &RuntimeConfig,
        model: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let mut hooks = HookPipeline::new();
        if !config.processors.is_empty() {
            let chain = config.processors.iter().map(processors::from_config).collect();
            hooks.push(Arc::new(ProcessorHook::new(chain)));
        }
        if let Some(compactor) = compaction::from_config(&config.compaction) {
            hooks.push(Arc::new(
                CompactionHook::new(compactor).with_event_bus(event_bus.clone()),
            ));
        }

        let mut frame = ExecutionFrame::new(config.agent.name.clone());
        if let Some(domain) = &config.agent.domain {
            frame = frame.with_domain(domain.clone());
        }
        if let Some(tenant) = &config.agent.tenant {
            frame = frame.with_tenant(tenant.clone());
        }

        let agent = Self::new(model, tools, event_bus)
            .with_max_iterations(config.runtime.max_iterations)
            .with_on_error(config.runtime.on_error)
            .with_tool_timeout(config.runtime.tool_timeout())
            .with_answer_format(config.runtime.answer_format)
            .with_budget(config.budget.clone())
            .with_hooks(hooks)
            .with_frame(frame);

        match &config.agent.system_prompt {
            Some(prompt) => agent.with_system_prompt(prompt.clone()),
            None => agent,
        }
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_budget(mut self, budget: BudgetConfig) -> Self {
        self.budget = budget;
        self
    }

    /// Replace the hook pipeline.
    pub fn with_hooks(mut self, hooks: HookPipeline) -> Self {
        self.hooks = hooks;
        self
    }

    /// Append one hook to the pipeline.
    pub fn with_hook(mut self, hook: impl IterationHooks + 'static) -> Self {
        self.hooks = self.hooks.with(hook);
        self
    }

    pub fn with_answer_format(mut self, format: AnswerFormat) -> Self {
        self.answer_format = format;
        self
    }

    pub fn with_frame(mut self, frame: ExecutionFrame) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Run the loop for one user request.
    pub async fn run(&self, user_input: impl Into<String>) -> Result<RunOutcome> {
        self.run_in_frame(user_input, self.frame.clone()).await
    }

    /// Run on behalf of `actor`, which tools see in their frame.
    pub async fn run_as(&self, user_input: impl Into<String>, actor: Value) -> Result<RunOutcome> {
        self.run_in_frame(user_input, self.frame.clone().with_actor(actor))
            .await
    }

    async fn run_in_frame(&self, user_input: impl Into<String>, mut frame: ExecutionFrame) -> Result<RunOutcome> {
        if let Some(timeout) = self.tool_timeout {
            frame.timeout = Some(timeout);
        }

        let mut opts = ContextOptions::default();
        if let Some(prompt) = &self.system_prompt {
            opts = opts.with_system_prompt(prompt.clone());
        }
        let ctx = Context::new(user_input, opts);
        let context_id = ctx.id.to_string();

        info!(
            context_id = %context_id,
            agent = %frame.agent,
            model = self.model.name(),
            max_iterations = self.max_iterations,
            "Starting run"
        );

        match self.drive(ctx, &frame).await {
            Ok(outcome) => {
                info!(
                    context_id = %context_id,
                    iterations = outcome.usage.iterations,
                    total_tokens = outcome.usage.tokens.total_tokens,
                    stop_reason = ?outcome.stop_reason,
                    "Run completed"
                );
                self.event_bus.publish(DomainEvent::RunCompleted {
                    context_id,
                    iterations: outcome.usage.iterations,
                    total_tokens: outcome.usage.tokens.total_tokens,
                    timestamp: Utc::now(),
                });
                Ok(outcome)
            }
            Err(e) => {
                warn!(context_id = %context_id, kind = %e.kind(), error = %e, "Run failed");
                self.event_bus.publish(DomainEvent::RunFailed {
                    context_id,
                    kind: e.kind().as_str().to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    /// The state machine. Each pass is one iteration:
    /// start checks → model call → (final answer | tools → fold → compact).
    async fn drive(&self, mut ctx: Context, frame: &ExecutionFrame) -> Result<RunOutcome> {
        let tracker = TokenBudgetTracker::new(self.budget.clone()).with_event_bus(self.event_bus.clone());
        let executor = ToolExecutor::new(self.tools.clone(), self.event_bus.clone()).with_on_error(self.on_error);
        let definitions = self.tools.definitions();

        loop {
            let iteration = ctx.current_iteration;

            // ── Iteration start ──
            self.event_bus.publish(DomainEvent::IterationStarted {
                context_id: ctx.id.to_string(),
                iteration,
                timestamp: Utc::now(),
            });
            self.hooks.on_iteration_start(iteration).await?;
            tracker.check(&ctx)?;

            // ── Model call ──
            let messages = self.hooks.prepare_messages(ctx.to_messages()).await?;
            debug!(
                context_id = %ctx.id,
                iteration,
                messages = messages.len(),
                estimated_tokens =
                    token::estimate_messages_tokens(&messages) + token::estimate_tools_tokens(&definitions),
                "Calling model"
            );
            let response = self
                .model
                .complete(ModelRequest {
                    messages,
                    tools: definitions.clone(),
                })
                .await?;

            if let Some(usage) = response.usage {
                ctx = ctx.add_token_usage(usage);
            }

            if !response.requests_tools() {
                let answer = self.parse_answer(&response)?;
                ctx = ctx.add_assistant_message(response.content, Vec::new());
                return Ok(RunOutcome::new(answer, ctx, StopReason::FinalAnswer));
            }

            // ── Tool execution ──
            ctx = ctx.add_assistant_message(response.content, response.tool_calls);
            let calls = ctx.extract_tool_calls();
            debug!(iteration, tool_calls = calls.len(), "Executing tool calls");

            let raw = executor.execute_all(&calls, frame).await?;
            let halted = raw
                .iter()
                .find(|r| r.is_halt())
                .map(|r| (r.name.clone(), r.outcome.payload().clone()));
            let results = self.hooks.prepare_tool_results(raw).await?;

            // ── Iteration complete ──
            let reached_limit = ctx.exceeded_max_iterations(self.max_iterations);
            ctx = ctx.add_tool_results(results);
            self.event_bus.publish(DomainEvent::IterationCompleted {
                context_id: ctx.id.to_string(),
                iteration,
                tool_calls: calls.len(),
                timestamp: Utc::now(),
            });

            self.hooks.on_iteration_complete(iteration, &ctx).await?;
            ctx = self.hooks.prepare_context(ctx).await?;

            if reached_limit {
                warn!(
                    context_id = %ctx.id,
                    max_iterations = self.max_iterations,
                    "Max iterations reached"
                );
                return Err(Error::max_iterations_exceeded(self.max_iterations));
            }

            if let Some((tool, answer)) = halted {
                debug!(iteration, tool = %tool, "Tool halted the run");
                return Ok(RunOutcome::new(answer, ctx, StopReason::Halted { tool }));
            }
        }
    }

    /// Read the final answer out of a response with no tool calls.
    fn parse_answer(&self, response: &ModelResponse) -> Result<Value> {
        if let Some(answer) = &response.answer {
            return Ok(answer.clone());
        }
        match self.answer_format {
            AnswerFormat::Text => Ok(Value::String(response.content.clone())),
            AnswerFormat::Json => serde_json::from_str(&response.content).map_err(|e| {
                Error::parse(format!("final answer is not valid JSON: {e}"))
                    .with_detail("content", response.content.clone())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::StopAfter;
    use crate::test_helpers::*;
    use async_trait::async_trait;
    use ironloop_config::{CompactionStrategy, ProcessorConfig, SampleStrategy};
    use ironloop_core::error::{ErrorKind, ModelError};
    use ironloop_core::message::Role;
    use ironloop_core::tool::{Tool, ToolCall};
    use ironloop_telemetry::BudgetStrategy;
    use serde_json::json;
    use tokio::sync::broadcast::Receiver;

    fn agent(model: Arc<SequentialMockModel>, tools: Vec<Box<dyn Tool>>) -> (AgentLoop, Arc<EventBus>) {
        let bus = Arc::new(EventBus::default());
        let agent = AgentLoop::new(model, Arc::new(registry_with(tools)), bus.clone());
        (agent, bus)
    }

    fn drain(rx: &mut Receiver<Arc<DomainEvent>>) -> Vec<Arc<DomainEvent>> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn echo_call(id: &str) -> ToolCall {
        ToolCall::new(id, "echo", json!({"text": id}))
    }

    #[tokio::test]
    async fn simple_text_response() {
        let model = Arc::new(SequentialMockModel::new(vec![text_response("Hello! How can I help?", 15)]));
        let (agent, _) = agent(model.clone(), vec![]);
        let agent = agent.with_system_prompt("You are terse.");

        let outcome = agent.run("Hello!").await.unwrap();
        assert_eq!(outcome.answer, json!("Hello! How can I help?"));
        assert_eq!(outcome.stop_reason, StopReason::FinalAnswer);
        assert_eq!(outcome.usage.tokens.total_tokens, 15);

        // System + User + Assistant
        let messages = outcome.context.to_messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn tool_results_reach_the_next_model_call() {
        let model = Arc::new(SequentialMockModel::new(vec![
            tool_response(vec![echo_call("c1")], 20),
            text_response("done", 20),
        ]));
        let (agent, _) = agent(model.clone(), vec![Box::new(EchoTool)]);
        let agent = agent.with_frame(ExecutionFrame::new("support-bot"));

        let outcome = agent.run("go").await.unwrap();
        assert_eq!(outcome.answer, json!("done"));
        assert_eq!(outcome.context.current_iteration, 2);
        assert_eq!(outcome.usage.tool_calls, 1);

        let requests = model.requests();
        assert_eq!(requests[0].tools.len(), 1);
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last.role, Role::ToolResult);
        assert!(last.content.contains("support-bot"), "{}", last.content);
    }

    #[tokio::test]
    async fn actor_travels_in_the_frame() {
        let actor = json!({"user": "actor-sentinel-7f3"});
        let model = Arc::new(SequentialMockModel::new(vec![
            tool_response(vec![ToolCall::new("c1", "whoami", json!({}))], 0),
            text_response("ok", 0),
        ]));
        let (agent, _) = agent(model, vec![Box::new(WhoAmITool)]);

        let outcome = agent.run_as("go", actor.clone()).await.unwrap();

        // the tool saw the actor
        let result = &outcome.context.iterations[0].tool_results[0];
        assert_eq!(result.outcome.payload()["actor"], actor);

        // nothing else on the context carries it
        let mut ctx = outcome.context.clone();
        for iteration in &mut ctx.iterations {
            iteration.tool_results.clear();
            iteration.messages.retain(|m| m.role != Role::ToolResult);
        }
        let ctx_json = serde_json::to_string(&ctx).unwrap();
        assert!(!ctx_json.contains("actor-sentinel-7f3"), "{ctx_json}");
    }

    #[tokio::test]
    async fn run_without_actor_leaves_frame_actor_empty() {
        let model = Arc::new(SequentialMockModel::new(vec![
            tool_response(vec![ToolCall::new("c1", "whoami", json!({}))], 0),
            text_response("ok", 0),
        ]));
        let (agent, _) = agent(model, vec![Box::new(WhoAmITool)]);

        let outcome = agent.run("go").await.unwrap();
        let result = &outcome.context.iterations[0].tool_results[0];
        assert_eq!(result.outcome.payload()["actor"], Value::Null);
    }

    #[tokio::test]
    async fn budget_halt_stops_before_next_model_call() {
        let model = Arc::new(SequentialMockModel::new(vec![
            tool_response(vec![echo_call("c1")], 300),
            tool_response(vec![echo_call("c2")], 300),
            tool_response(vec![echo_call("c3")], 450),
            text_response("never reached", 10),
        ]));
        let (agent, _) = agent(model.clone(), vec![Box::new(EchoTool)]);
        let agent = agent.with_budget(BudgetConfig::with_limit(1000, BudgetStrategy::Halt));

        let err = agent.run("go").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Budget);
        assert_eq!(err.details()["cumulative_tokens"], 1050);
        assert_eq!(err.details()["token_budget"], 1000);
        assert_eq!(err.details()["exceeded_by"], 50);
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn compaction_drops_usage_from_the_budget() {
        let script = || {
            let mut responses: Vec<_> = (0..5)
                .map(|i| tool_response(vec![echo_call(&format!("c{i}"))], 300))
                .collect();
            responses.push(text_response("done", 10));
            responses
        };
        let budget = BudgetConfig::with_limit(1000, BudgetStrategy::Halt);

        // without compaction the fifth pass is refused
        let model = Arc::new(SequentialMockModel::new(script()));
        let (plain, _) = agent(model.clone(), vec![Box::new(EchoTool)]);
        let err = plain.with_budget(budget.clone()).run("go").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Budget);
        assert_eq!(err.details()["cumulative_tokens"], 1200);
        assert_eq!(model.call_count(), 4);

        // a one-iteration window prunes each pass's usage before the check
        let model = Arc::new(SequentialMockModel::new(script()));
        let (windowed, _) = agent(model.clone(), vec![Box::new(EchoTool)]);
        let outcome = windowed
            .with_budget(budget)
            .with_hook(CompactionHook::new(Box::new(crate::compaction::SlidingWindow::new(1))))
            .run("go")
            .await
            .unwrap();
        assert_eq!(outcome.answer, json!("done"));
        assert_eq!(model.call_count(), 6);
        assert_eq!(outcome.usage.tokens.total_tokens, 10);
    }

    #[tokio::test]
    async fn budget_warn_emits_one_warning_and_completes() {
        let model = Arc::new(SequentialMockModel::new(vec![
            tool_response(vec![echo_call("c1")], 300),
            tool_response(vec![echo_call("c2")], 300),
            tool_response(vec![echo_call("c3")], 450),
            text_response("finished", 50),
        ]));
        let (agent, bus) = agent(model.clone(), vec![Box::new(EchoTool)]);
        let mut rx = bus.subscribe();
        let agent = agent.with_budget(BudgetConfig::with_limit(1000, BudgetStrategy::Warn));

        let outcome = agent.run("go").await.unwrap();
        assert_eq!(outcome.answer, json!("finished"));
        assert_eq!(outcome.usage.tokens.total_tokens, 1100);

        let warnings: Vec<u64> = drain(&mut rx)
            .iter()
            .filter_map(|e| match e.as_ref() {
                DomainEvent::BudgetWarning { cumulative_tokens, limit, .. } => {
                    assert_eq!(*limit, 1000);
                    Some(*cumulative_tokens)
                }
                _ => None,
            })
            .collect();
        assert_eq!(warnings, vec![1050]);
    }

    #[tokio::test]
    async fn max_iterations_after_three_tool_passes() {
        let model = Arc::new(SequentialMockModel::always_tool("echo", json!({}), 10));
        let (agent, bus) = agent(model.clone(), vec![Box::new(EchoTool)]);
        let mut rx = bus.subscribe();
        let agent = agent.with_max_iterations(3);

        let err = agent.run("loop forever").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Llm);
        assert!(err.message().contains("max iterations exceeded"));
        assert_eq!(model.call_count(), 3);

        let events = drain(&mut rx);
        let tool_runs = events
            .iter()
            .filter(|e| matches!(e.as_ref(), DomainEvent::ToolExecuted { .. }))
            .count();
        assert_eq!(tool_runs, 3);
        assert!(matches!(
            events.last().map(|e| e.as_ref()),
            Some(DomainEvent::RunFailed { kind, .. }) if kind == "llm_error"
        ));
    }

    #[tokio::test]
    async fn halt_tool_ends_run_without_another_model_call() {
        let model = Arc::new(SequentialMockModel::new(vec![
            tool_response(vec![echo_call("c1")], 10),
            tool_response(vec![ToolCall::new("c2", "halt", json!({"answer": "X"}))], 10),
            text_response("never reached", 10),
        ]));
        let (agent, _) = agent(model.clone(), vec![Box::new(EchoTool), Box::new(HaltTool)]);
        let agent = agent.with_max_iterations(5);

        let outcome = agent.run("go").await.unwrap();
        assert_eq!(outcome.answer, json!({"answer": "X"}));
        assert_eq!(
            outcome.stop_reason,
            StopReason::Halted {
                tool: "halt".into()
            }
        );
        assert_eq!(model.call_count(), 2);
        assert_eq!(outcome.usage.iterations, 3);
    }

    #[tokio::test]
    async fn max_iterations_wins_over_halt_on_same_pass() {
        let model = Arc::new(SequentialMockModel::new(vec![tool_response(
            vec![ToolCall::new("c1", "halt", json!({"answer": "X"}))],
            10,
        )]));
        let (agent, _) = agent(model, vec![Box::new(HaltTool)]);
        let agent = agent.with_max_iterations(1);

        let err = agent.run("go").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Llm);
    }

    #[tokio::test]
    async fn hook_veto_aborts_run() {
        let model = Arc::new(SequentialMockModel::always_tool("echo", json!({}), 10));
        let (agent, _) = agent(model.clone(), vec![Box::new(EchoTool)]);
        let agent = agent.with_hook(StopAfter::new(2));

        let err = agent.run("go").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Hook);
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn on_error_halt_surfaces_tool_error() {
        let model = Arc::new(SequentialMockModel::always_tool("failing", json!({}), 5));
        let (agent, _) = agent(model.clone(), vec![Box::new(FailingTool)]);
        let agent = agent.with_on_error(OnError::Halt);

        let err = agent.run("go").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Tool);
        assert_eq!(err.details()["tool"], "failing");
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn on_error_continue_shows_failure_to_model() {
        let model = Arc::new(SequentialMockModel::new(vec![
            tool_response(vec![ToolCall::new("c1", "failing", json!({}))], 10),
            text_response("recovered", 10),
        ]));
        let (agent, _) = agent(model, vec![Box::new(FailingTool)]);

        let outcome = agent.run("go").await.unwrap();
        assert_eq!(outcome.answer, json!("recovered"));
        assert_eq!(outcome.usage.failed_tool_calls, 1);
    }

    #[tokio::test]
    async fn json_answers_are_parsed() {
        let model = Arc::new(SequentialMockModel::new(vec![text_response(r#"{"total": 3}"#, 10)]));
        let (agent, _) = agent(model, vec![]);
        let agent = agent.with_answer_format(AnswerFormat::Json);

        let outcome = agent.run("count").await.unwrap();
        assert_eq!(outcome.answer, json!({"total": 3}));
    }

    #[tokio::test]
    async fn invalid_json_answer_is_parse_error() {
        let model = Arc::new(SequentialMockModel::new(vec![text_response("three", 10)]));
        let (agent, _) = agent(model, vec![]);
        let agent = agent.with_answer_format(AnswerFormat::Json);

        let err = agent.run("count").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.details()["content"], "three");
    }

    #[tokio::test]
    async fn structured_answer_from_client_wins() {
        let model = Arc::new(SequentialMockModel::new(vec![
            ModelResponse::text("ignored").with_answer(json!({"ok": true})),
        ]));
        let (agent, _) = agent(model, vec![]);

        let outcome = agent.run("q").await.unwrap();
        assert_eq!(outcome.answer, json!({"ok": true}));
        assert_eq!(outcome.usage.tokens.total_tokens, 0);
    }

    #[tokio::test]
    async fn model_errors_become_llm_errors() {
        struct Down;

        #[async_trait]
        impl ModelClient for Down {
            fn name(&self) -> &str {
                "down"
            }
            async fn complete(&self, _request: ModelRequest) -> std::result::Result<ModelResponse, ModelError> {
                Err(ModelError::ApiError {
                    status_code: 503,
                    message: "unavailable".into(),
                })
            }
        }

        let agent = AgentLoop::new(
            Arc::new(Down),
            Arc::new(ToolRegistry::new()),
            Arc::new(EventBus::default()),
        );
        let err = agent.run("q").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Llm);
        assert_eq!(err.details()["status_code"], 503);
    }

    #[tokio::test]
    async fn from_config_wires_processors_and_compaction() {
        let mut config = RuntimeConfig::default();
        config.processors = vec![ProcessorConfig::Sample {
            sample_size: 3,
            strategy: SampleStrategy::First,
        }];
        config.compaction.strategy = CompactionStrategy::SlidingWindow;
        config.compaction.window_size = 2;
        config.agent.system_prompt = Some("Be brief.".into());

        let call = |id: &str| ToolCall::new(id, "list", json!({}));
        let model = Arc::new(SequentialMockModel::new(vec![
            tool_response(vec![call("c1")], 10),
            tool_response(vec![call("c2")], 10),
            tool_response(vec![call("c3")], 10),
            text_response("summarised", 10),
        ]));
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let agent = AgentLoop::from_config(
            &config,
            model.clone(),
            Arc::new(registry_with(vec![Box::new(ListTool(10))])),
            bus,
        );

        let outcome = agent.run("list things").await.unwrap();
        assert_eq!(outcome.context.iterations.len(), 2);
        assert_eq!(outcome.usage.iterations, 4);

        let kept = outcome.context.iterations[0].tool_results[0].outcome.payload();
        assert_eq!(kept["items"], json!(["item-0", "item-1", "item-2"]));
        assert_eq!(kept["total_count"], 10);

        // first request carried the configured system prompt
        assert_eq!(model.requests()[0].messages[0].content, "Be brief.");

        let compactions = drain(&mut rx)
            .iter()
            .filter(|e| matches!(e.as_ref(), DomainEvent::ContextCompacted { .. }))
            .count();
        assert_eq!(compactions, 3);
    }
}
