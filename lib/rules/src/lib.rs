//! # Burndler Dependency Evaluator
//!
//! Evaluates declarative cross-field rules against a user value tree.
//! Conditions are template expressions; a condition that fails to
//! parse or execute is a hard error rather than a silently skipped
//! rule.

use anyhow::Context;
use burndler_client::entities::rules::{
  DependencyRule, RuleType, RuleViolation,
};
use serde_json::Value;
use template::{eval_condition, lookup_path};

/// Evaluate every rule against the value tree.
///
/// Returns the violations in rule order, but no rule's outcome
/// depends on any other rule's, so the result set is order
/// independent.
pub fn evaluate(
  rules: &[DependencyRule],
  values: &Value,
) -> anyhow::Result<Vec<RuleViolation>> {
  let mut violations = Vec::new();
  for rule in rules {
    evaluate_rule(rule, values, &mut violations).with_context(
      || {
        format!(
          "failed to evaluate {} rule on field '{}'",
          rule.rule_type, rule.field
        )
      },
    )?;
  }
  Ok(violations)
}

fn evaluate_rule(
  rule: &DependencyRule,
  values: &Value,
  violations: &mut Vec<RuleViolation>,
) -> anyhow::Result<()> {
  if let RuleType::Unknown = rule.rule_type {
    violations.push(RuleViolation {
      field: rule.field.clone(),
      rule: String::from("unknown"),
      message: format!(
        "rule on field '{}' has an unknown type",
        rule.field
      ),
    });
    return Ok(());
  }

  if !eval_condition(&rule.condition, values)? {
    return Ok(());
  }

  let target = lookup_path(values, &rule.target);
  match rule.rule_type {
    RuleType::Requires => {
      if !target.is_some_and(is_set) {
        violations.push(RuleViolation {
          field: rule.target.clone(),
          rule: String::from("requires"),
          message: rule.message.clone().unwrap_or_else(|| {
            format!(
              "{} requires {} to be set",
              rule.field, rule.target
            )
          }),
        });
      }
    }
    RuleType::Conflicts => {
      if target.is_some_and(is_set) {
        violations.push(RuleViolation {
          field: rule.target.clone(),
          rule: String::from("conflicts"),
          message: rule.message.clone().unwrap_or_else(|| {
            format!("{} conflicts with {}", rule.field, rule.target)
          }),
        });
      }
    }
    // cascades rules describe value propagation applied by
    // the UI and the importer, never validation errors
    RuleType::Cascades => {}
    RuleType::Unknown => unreachable!(),
  }
  Ok(())
}

/// Present, non-empty and not exactly `false`.
fn is_set(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(_) => true,
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(o) => !o.is_empty(),
  }
}
