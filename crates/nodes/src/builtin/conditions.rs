//! Condition blocks. Both route via the `true` / `false` outputs.

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{config_f64, config_str, OUTPUT_FALSE, OUTPUT_TRUE};
use crate::coerce::{is_blank, to_number, to_text};
use crate::context::FlowContext;
use crate::{BlockHandler, HandlerError, HandlerResult};

const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Comparison operators available to `condition_if`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "greater_than" => Operator::GreaterThan,
            "less_than" => Operator::LessThan,
            "is_empty" => Operator::IsEmpty,
            "is_not_empty" => Operator::IsNotEmpty,
            other => return Err(format!("unknown operator '{other}'")),
        })
    }
}

impl Operator {
    /// Apply the operator to the variable's value and the configured operand.
    ///
    /// Comparisons involving NaN are false, as in JS.
    pub fn evaluate(self, actual: Option<&Value>, expected: Option<&Value>) -> bool {
        match self {
            Operator::Equals => to_text(actual) == to_text(expected),
            Operator::NotEquals => to_text(actual) != to_text(expected),
            Operator::Contains => to_text(actual).contains(&to_text(expected)),
            Operator::NotContains => !to_text(actual).contains(&to_text(expected)),
            Operator::GreaterThan => to_number(actual) > to_number(expected),
            Operator::LessThan => to_number(actual) < to_number(expected),
            Operator::IsEmpty => is_blank(actual),
            Operator::IsNotEmpty => !is_blank(actual),
        }
    }
}

fn route(held: bool) -> HandlerResult {
    HandlerResult::empty().routed(if held { OUTPUT_TRUE } else { OUTPUT_FALSE })
}

/// `condition_if`: `{variable, operator, value}`.
///
/// The variable named `message` falls back to the user message when no
/// variable of that name was set. An unknown operator evaluates to `false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionIf;

#[async_trait]
impl BlockHandler for ConditionIf {
    async fn handle(
        &self,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let name = config_str(config, "variable").unwrap_or_default();
        let message = Value::String(ctx.message.clone());
        let actual = match ctx.variable(name) {
            Some(value) => Some(value),
            None if name == "message" => Some(&message),
            None => None,
        };

        let op = config_str(config, "operator").unwrap_or("equals");
        let held = match op.parse::<Operator>() {
            Ok(operator) => operator.evaluate(actual, config.get("value")),
            Err(err) => {
                warn!("condition_if: {err}, evaluating to false");
                false
            }
        };
        Ok(route(held))
    }
}

/// `condition_confidence`: holds when `variables.confidence >= config.threshold`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfidenceThreshold;

#[async_trait]
impl BlockHandler for ConfidenceThreshold {
    async fn handle(
        &self,
        ctx: &FlowContext,
        config: &Value,
    ) -> Result<HandlerResult, HandlerError> {
        let threshold = config_f64(config, "threshold", DEFAULT_CONFIDENCE_THRESHOLD);
        let confidence = to_number(ctx.variable("confidence"));
        Ok(route(confidence >= threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with(name: &str, value: Value) -> FlowContext {
        let mut ctx = FlowContext::new("I want a refund");
        ctx.variables.insert(name.into(), value);
        ctx
    }

    async fn output(handler: &dyn BlockHandler, ctx: &FlowContext, config: Value) -> String {
        handler.handle(ctx, &config).await.unwrap().output.unwrap()
    }

    #[tokio::test]
    async fn equals_compares_as_strings() {
        let ctx = ctx_with("x", json!("5"));
        let cfg = |v: Value| json!({ "variable": "x", "operator": "equals", "value": v });

        assert_eq!(output(&ConditionIf, &ctx, cfg(json!("5"))).await, "true");
        assert_eq!(output(&ConditionIf, &ctx, cfg(json!("6"))).await, "false");
        assert_eq!(output(&ConditionIf, &ctx, cfg(json!(5))).await, "true");
    }

    #[tokio::test]
    async fn numeric_operators_coerce() {
        let ctx = ctx_with("total", json!("120.5"));
        let gt = json!({ "variable": "total", "operator": "greater_than", "value": "100" });
        let lt = json!({ "variable": "total", "operator": "less_than", "value": 100 });
        assert_eq!(output(&ConditionIf, &ctx, gt).await, "true");
        assert_eq!(output(&ConditionIf, &ctx, lt).await, "false");

        let nan = json!({ "variable": "total", "operator": "greater_than", "value": "lots" });
        assert_eq!(output(&ConditionIf, &ctx, nan).await, "false");
    }

    #[tokio::test]
    async fn contains_and_emptiness() {
        let ctx = FlowContext::new("I want a refund");
        let contains = json!({ "variable": "message", "operator": "contains", "value": "refund" });
        let missing = json!({ "variable": "nope", "operator": "is_empty" });
        let present = json!({ "variable": "message", "operator": "is_not_empty" });
        let not_contains =
            json!({ "variable": "message", "operator": "not_contains", "value": "refund" });

        assert_eq!(output(&ConditionIf, &ctx, contains).await, "true");
        assert_eq!(output(&ConditionIf, &ctx, missing).await, "true");
        assert_eq!(output(&ConditionIf, &ctx, present).await, "true");
        assert_eq!(output(&ConditionIf, &ctx, not_contains).await, "false");
    }

    #[tokio::test]
    async fn unknown_operator_is_false() {
        let ctx = ctx_with("x", json!("a"));
        let cfg = json!({ "variable": "x", "operator": "matches", "value": "a" });
        assert_eq!(output(&ConditionIf, &ctx, cfg).await, "false");
    }

    #[tokio::test]
    async fn confidence_threshold() {
        let ctx = ctx_with("confidence", json!(0.82));
        assert_eq!(output(&ConfidenceThreshold, &ctx, json!({})).await, "true");
        assert_eq!(
            output(&ConfidenceThreshold, &ctx, json!({ "threshold": 0.9 })).await,
            "false"
        );

        let unset = FlowContext::new("x");
        assert_eq!(output(&ConfidenceThreshold, &unset, json!({})).await, "false");
    }

    #[test]
    fn operator_parses_and_deserializes_alike() {
        let parsed: Operator = "not_equals".parse().unwrap();
        let decoded: Operator = serde_json::from_value(json!("not_equals")).unwrap();
        assert_eq!(parsed, decoded);
    }
}
