//! Token budget tracking: warn/halt thresholds over cumulative usage.

use chrono::Utc;
use ironloop_core::context::Context;
use ironloop_core::error::Error;
use ironloop_core::event::{DomainEvent, EventBus};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::TelemetryError;

/// Fraction of the limit at which warnings start.
pub const DEFAULT_WARN_THRESHOLD: f64 = 0.8;

/// What happens once cumulative usage reaches the limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStrategy {
    /// Stop the run with a budget error
    Halt,
    /// Observe only; the run continues regardless of overage
    #[default]
    Warn,
}

impl std::fmt::Display for BudgetStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Halt => write!(f, "halt"),
            Self::Warn => write!(f, "warn"),
        }
    }
}

impl FromStr for BudgetStrategy {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" => Ok(Self::Halt),
            "warn" => Ok(Self::Warn),
            other => Err(TelemetryError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Budget settings for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Token limit; `None` disables the check entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<u64>,

    #[serde(default)]
    pub strategy: BudgetStrategy,

    #[serde(default = "default_warn_threshold")]
    pub warn_threshold: f64,
}

fn default_warn_threshold() -> f64 {
    DEFAULT_WARN_THRESHOLD
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            token_budget: None,
            strategy: BudgetStrategy::default(),
            warn_threshold: DEFAULT_WARN_THRESHOLD,
        }
    }
}

impl BudgetConfig {
    pub fn with_limit(token_budget: u64, strategy: BudgetStrategy) -> Self {
        Self {
            token_budget: Some(token_budget),
            strategy,
            ..Self::default()
        }
    }
}

/// Outcome of a single budget evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetCheck {
    Ok,
    /// At or past the warn threshold; the run continues
    Warning {
        cumulative_tokens: u64,
        limit: u64,
        threshold_tokens: u64,
    },
    /// At or past the limit under the `halt` strategy
    Exceeded {
        cumulative_tokens: u64,
        limit: u64,
        exceeded_by: u64,
    },
}

/// Evaluate cumulative usage against a limit.
///
/// Both branches are inclusive. With `strategy == Warn` this never returns
/// `Exceeded`, however far past the limit usage has gone.
pub fn check_limit(
    cumulative_tokens: u64,
    limit: Option<u64>,
    warn_threshold: f64,
    strategy: BudgetStrategy,
) -> BudgetCheck {
    let Some(limit) = limit else {
        return BudgetCheck::Ok;
    };

    let threshold_tokens = (limit as f64 * warn_threshold).floor() as u64;

    if cumulative_tokens >= limit && strategy == BudgetStrategy::Halt {
        BudgetCheck::Exceeded {
            cumulative_tokens,
            limit,
            exceeded_by: cumulative_tokens - limit,
        }
    } else if cumulative_tokens >= threshold_tokens {
        BudgetCheck::Warning {
            cumulative_tokens,
            limit,
            threshold_tokens,
        }
    } else {
        BudgetCheck::Ok
    }
}

/// Applies a [`BudgetConfig`] to contexts and reports the result.
///
/// Warnings are logged and published as [`DomainEvent::BudgetWarning`];
/// an exceeded budget comes back as a `budget_error`.
pub struct TokenBudgetTracker {
    config: BudgetConfig,
    event_bus: Option<Arc<EventBus>>,
}

impl TokenBudgetTracker {
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            event_bus: None,
        }
    }

    /// Publish warnings on this bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    /// Check the context's cumulative usage.
    pub fn check(&self, ctx: &Context) -> Result<BudgetCheck, Error> {
        let cumulative = ctx.cumulative_tokens().total_tokens;
        let check = check_limit(
            cumulative,
            self.config.token_budget,
            self.config.warn_threshold,
            self.config.strategy,
        );

        match check {
            BudgetCheck::Ok => {}
            BudgetCheck::Warning {
                cumulative_tokens,
                limit,
                threshold_tokens,
            } => {
                tracing::warn!(
                    cumulative_tokens,
                    limit,
                    threshold_tokens,
                    strategy = %self.config.strategy,
                    "Token budget warning: approaching limit"
                );
                if let Some(bus) = &self.event_bus {
                    bus.publish(DomainEvent::BudgetWarning {
                        cumulative_tokens,
                        limit,
                        threshold_pct: self.config.warn_threshold * 100.0,
                        timestamp: Utc::now(),
                    });
                }
            }
            BudgetCheck::Exceeded {
                cumulative_tokens,
                limit,
                exceeded_by,
            } => {
                tracing::warn!(cumulative_tokens, limit, exceeded_by, "Token budget exceeded, halting");
                return Err(Error::budget_exceeded(cumulative_tokens, limit));
            }
        }

        Ok(check)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironloop_core::context::{ContextOptions, TokenUsage};
    use ironloop_core::error::ErrorKind;

    #[test]
    fn no_limit_is_always_ok() {
        assert_eq!(
            check_limit(u64::MAX, None, 0.8, BudgetStrategy::Halt),
            BudgetCheck::Ok
        );
    }

    #[test]
    fn below_threshold_is_ok() {
        assert_eq!(
            check_limit(799, Some(1000), 0.8, BudgetStrategy::Halt),
            BudgetCheck::Ok
        );
    }

    #[test]
    fn warn_threshold_is_inclusive() {
        assert_eq!(
            check_limit(800, Some(1000), 0.8, BudgetStrategy::Halt),
            BudgetCheck::Warning {
                cumulative_tokens: 800,
                limit: 1000,
                threshold_tokens: 800
            }
        );
    }

    #[test]
    fn threshold_is_floored() {
        // 999 * 0.8 = 799.2 -> 799
        assert!(matches!(
            check_limit(799, Some(999), 0.8, BudgetStrategy::Warn),
            BudgetCheck::Warning {
                threshold_tokens: 799,
                ..
            }
        ));
    }

    #[test]
    fn halt_limit_is_inclusive() {
        assert_eq!(
            check_limit(1000, Some(1000), 0.8, BudgetStrategy::Halt),
            BudgetCheck::Exceeded {
                cumulative_tokens: 1000,
                limit: 1000,
                exceeded_by: 0
            }
        );
    }

    #[test]
    fn warn_strategy_never_halts() {
        assert!(matches!(
            check_limit(50_000, Some(1000), 0.8, BudgetStrategy::Warn),
            BudgetCheck::Warning { .. }
        ));
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("HALT".parse::<BudgetStrategy>().unwrap(), BudgetStrategy::Halt);
        assert_eq!(" warn ".parse::<BudgetStrategy>().unwrap(), BudgetStrategy::Warn);
        assert!("stop".parse::<BudgetStrategy>().is_err());
    }

    fn context_with_usage(total: u64) -> Context {
        Context::new("q", ContextOptions::default()).add_token_usage(TokenUsage::new(total, 0))
    }

    #[test]
    fn tracker_halts_with_budget_error() {
        let tracker = TokenBudgetTracker::new(BudgetConfig::with_limit(1000, BudgetStrategy::Halt));
        let err = tracker.check(&context_with_usage(1050)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Budget);
        assert_eq!(err.details()["exceeded_by"], 50);
    }

    #[tokio::test]
    async fn tracker_publishes_warning_event() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let tracker = TokenBudgetTracker::new(BudgetConfig::with_limit(1000, BudgetStrategy::Warn))
            .with_event_bus(bus.clone());

        let check = tracker.check(&context_with_usage(1050)).unwrap();
        assert!(matches!(check, BudgetCheck::Warning { .. }));

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::BudgetWarning {
                cumulative_tokens,
                threshold_pct,
                ..
            } => {
                assert_eq!(*cumulative_tokens, 1050);
                assert!((threshold_pct - 80.0).abs() < 1e-9);
            }
            other => panic!("Expected BudgetWarning, got {other:?}"),
        }
    }

    #[test]
    fn budget_config_defaults_from_toml_like_json() {
        let cfg: BudgetConfig = serde_json::from_str(r#"{"token_budget": 500}"#).unwrap();
        assert_eq!(cfg.strategy, BudgetStrategy::Warn);
        assert!((cfg.warn_threshold - 0.8).abs() < f64::EPSILON);
    }
}
