//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `^` (right-associative power),
//! parentheses, unary signs and decimal numbers. Bad expressions come back
//! as error outcomes so the model can correct itself.

use async_trait::async_trait;
use ironloop_core::error::ToolError;
use ironloop_core::tool::{ExecutionFrame, Tool, ToolOutcome};
use serde_json::{Value, json};
use std::iter::Peekable;
use std::str::Chars;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses, and decimal numbers."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    async fn invoke(&self, arguments: Value, _frame: &ExecutionFrame) -> Result<ToolOutcome, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'expression' argument".into()))?;

        Ok(match evaluate(expr) {
            Ok(value) => ToolOutcome::Success(json!({ "expression": expr, "result": value })),
            Err(e) => {
                tracing::debug!(expression = expr, error = %e, "Calculator rejected expression");
                ToolOutcome::Failure(json!({ "expression": expr, "error": e.to_string() }))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("expected closing parenthesis")]
    UnclosedParen,

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NotFinite,
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, CalcError> {
    let mut parser = Parser {
        chars: expr.chars().peekable(),
    };
    let value = parser.expr(0)?;
    parser.skip_ws();
    if let Some(c) = parser.chars.next() {
        return Err(CalcError::UnexpectedChar(c));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

/// Binding power a prefix sign applies to its operand. Below `^` so that
/// `-2^2` is `-(2^2)`.
const PREFIX_BP: u8 = 5;

/// (left, right) binding powers; right < left makes the operator
/// right-associative.
fn infix_bp(op: char) -> Option<(u8, u8)> {
    match op {
        '+' | '-' => Some((1, 2)),
        '*' | '/' | '%' => Some((3, 4)),
        '^' => Some((6, 5)),
        _ => None,
    }
}

/// Pratt parser evaluating directly over the character stream.
struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.peek().copied()
    }

    fn number(&mut self) -> Result<f64, CalcError> {
        let mut literal = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
            literal.push(c);
        }
        literal
            .parse()
            .map_err(|_| CalcError::InvalidNumber(literal))
    }

    fn operand(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            None => Err(CalcError::UnexpectedEnd),
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some('(') => {
                self.chars.next();
                let inner = self.expr(0)?;
                match self.peek() {
                    Some(')') => {
                        self.chars.next();
                        Ok(inner)
                    }
                    _ => Err(CalcError::UnclosedParen),
                }
            }
            Some('-') => {
                self.chars.next();
                Ok(-self.expr(PREFIX_BP)?)
            }
            Some('+') => {
                self.chars.next();
                self.expr(PREFIX_BP)
            }
            Some(c) => Err(CalcError::UnexpectedChar(c)),
        }
    }

    fn expr(&mut self, min_bp: u8) -> Result<f64, CalcError> {
        let mut lhs = self.operand()?;

        while let Some(op) = self.peek() {
            let Some((left_bp, right_bp)) = infix_bp(op) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.chars.next();
            let rhs = self.expr(right_bp)?;
            lhs = apply(op, lhs, rhs)?;
        }

        Ok(lhs)
    }
}

fn apply(op: char, lhs: f64, rhs: f64) -> Result<f64, CalcError> {
    match op {
        '+' => Ok(lhs + rhs),
        '-' => Ok(lhs - rhs),
        '*' => Ok(lhs * rhs),
        '/' | '%' if rhs == 0.0 => Err(CalcError::DivisionByZero),
        '/' => Ok(lhs / rhs),
        '%' => Ok(lhs % rhs),
        '^' => Ok(lhs.powf(rhs)),
        other => Err(CalcError::UnexpectedChar(other)),
    }
}
