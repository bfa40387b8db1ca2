//! Built-in tool implementations for ironloop.
//!
//! - `calculator` evaluates arithmetic expressions
//! - `final_answer` ends the run with the given answer (halt signal)

pub mod calculator;
pub mod final_answer;

use ironloop_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;
pub use final_answer::FinalAnswerTool;

/// Create a registry with all built-in tools.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CalculatorTool));
    registry.register(Box::new(FinalAnswerTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["calculator", "final_answer"]);
    }
}
