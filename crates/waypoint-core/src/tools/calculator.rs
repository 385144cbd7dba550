//! Calculator tool
//!
//! Two numbers and an operation in, the result as text out.

use serde_json::Value;

use super::{BoxFuture, Tool, ToolOutput};
use crate::error::ToolError;
use crate::tool_params;

pub const CALCULATOR_TOOL: &str = "calculator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl std::str::FromStr for Operation {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Operation::Add),
            "subtract" => Ok(Operation::Subtract),
            "multiply" => Ok(Operation::Multiply),
            "divide" => Ok(Operation::Divide),
            other => Err(ToolError::InvalidParams(format!(
                "Unknown operation '{}': expected add, subtract, multiply or divide",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_value(field: &str, value: Option<&Value>) -> Result<Self, ToolError> {
        let value = value.ok_or_else(|| ToolError::InvalidParams(format!("Missing '{}'", field)))?;
        if let Some(i) = value.as_i64() {
            return Ok(Number::Int(i));
        }
        if let Some(f) = value.as_f64() {
            return Ok(Number::Float(f));
        }
        // Models sometimes quote numbers
        if let Some(s) = value.as_str() {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Number::Int(i));
            }
            if let Ok(f) = s.parse::<f64>() {
                return Ok(Number::Float(f));
            }
        }
        Err(ToolError::InvalidParams(format!("'{}' must be a number", field)))
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Apply `operation` to two numbers.
///
/// Integer inputs stay integral except for division, which always produces
/// a float (`"10 / 4"` gives `2.5`, `"4 / 2"` gives `2.0`).
pub fn evaluate(a: f64, b: f64, operation: Operation) -> Result<f64, ToolError> {
    match operation {
        Operation::Add => Ok(a + b),
        Operation::Subtract => Ok(a - b),
        Operation::Multiply => Ok(a * b),
        Operation::Divide if b == 0.0 => Err(ToolError::ExecutionFailed("Division by zero".to_string())),
        Operation::Divide => Ok(a / b),
    }
}

fn calculate(a: Number, b: Number, operation: Operation) -> Result<String, ToolError> {
    if let (Number::Int(x), Number::Int(y)) = (a, b) {
        let exact = match operation {
            Operation::Add => x.checked_add(y),
            Operation::Subtract => x.checked_sub(y),
            Operation::Multiply => x.checked_mul(y),
            Operation::Divide => None,
        };
        if let Some(result) = exact {
            return Ok(result.to_string());
        }
    }
    evaluate(a.as_f64(), b.as_f64(), operation).map(format_float)
}

pub struct Calculator;

impl Calculator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for Calculator {
    fn name(&self) -> &str {
        CALCULATOR_TOOL
    }

    fn description(&self) -> &str {
        "A simple calculator tool. The tool takes as input 2 numbers and a operation, like 2,2, \"add\" and the response is 4\noperation can only be one of add/subtract/multiply/divide"
    }

    fn parameters_schema(&self) -> Value {
        tool_params! {
            number1: "number" => "",
            number2: "number" => "",
            operation: "string" => ""
        }
    }

    fn execute(&self, params: Value) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let a = Number::from_value("number1", params.get("number1"))?;
            let b = Number::from_value("number2", params.get("number2"))?;
            let operation: Operation = params
                .get("operation")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidParams("Missing 'operation'".to_string()))?
                .parse()?;

            let result = calculate(a, b, operation)?;
            tracing::debug!(?operation, result = %result, "calculator evaluated");
            Ok(ToolOutput::success(result))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn run(params: Value) -> Result<ToolOutput, ToolError> {
        Calculator::new().execute(params).await
    }

    #[tokio::test]
    async fn test_add_integers() {
        let out = run(json!({"number1": 245, "number2": 25645, "operation": "add"}))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.content, json!("25890"));
    }

    #[tokio::test]
    async fn test_divide_yields_float() {
        let out = run(json!({"number1": 4, "number2": 2, "operation": "divide"})).await.unwrap();
        assert_eq!(out.content, json!("2.0"));

        let out = run(json!({"number1": 10, "number2": 4, "operation": "divide"})).await.unwrap();
        assert_eq!(out.content, json!("2.5"));
    }

    #[tokio::test]
    async fn test_quoted_numbers_and_floats() {
        let out = run(json!({"number1": "7", "number2": 1.5, "operation": "multiply"}))
            .await
            .unwrap();
        assert_eq!(out.content, json!("10.5"));
    }

    #[tokio::test]
    async fn test_division_by_zero_is_an_error() {
        let err = run(json!({"number1": 1, "number2": 0, "operation": "divide"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test]
    async fn test_bad_params() {
        let err = run(json!({"number1": 1, "number2": 2, "operation": "modulo"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));

        let err = run(json!({"number1": 1, "operation": "add"})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(m) if m.contains("number2")));
    }

    #[test]
    fn test_overflow_falls_back_to_float() {
        let out = calculate(Number::Int(i64::MAX), Number::Int(1), Operation::Add).unwrap();
        assert!(out.ends_with(".0") || out.contains('e'));
    }
}
