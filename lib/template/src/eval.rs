//! Pipeline evaluation against the variable tree.
//!
//! A bare path reference that resolves to nothing is a hard error at
//! emission, but stays soft inside function arguments and conditions,
//! so `{{ .Missing | default "x" }}` and `eq .Missing true` behave.

use serde_json::Value;

use crate::{
  Error,
  funcs,
  parse::{Command, Pipeline, Term, parse_expression},
};

pub(crate) enum Evaluated {
  Present(Value),
  /// A path lookup that found nothing; carries the dotted
  /// path for error messages.
  Missing(String),
}

impl Evaluated {
  fn into_value(self) -> Value {
    match self {
      Evaluated::Present(value) => value,
      Evaluated::Missing(_) => Value::Null,
    }
  }
}

/// Evaluate a bare expression (no `{{ }}` delimiters) to a boolean.
///
/// Truthiness follows the template function library: null, false,
/// zero, empty strings and empty collections are false, everything
/// else is true. Absent paths are false.
pub fn eval_condition(
  expr: &str,
  vars: &Value,
) -> crate::Result<bool> {
  let pipeline = parse_expression(expr)?;
  Ok(match eval_pipeline(&pipeline, vars)? {
    Evaluated::Missing(_) => false,
    Evaluated::Present(value) => truthy(&value),
  })
}

/// Walk a dot-path (`A.B.C`) into a variable tree. Each
/// non-terminal must be a map or the lookup yields `None`.
pub fn lookup_path<'v>(
  vars: &'v Value,
  path: &str,
) -> Option<&'v Value> {
  let mut current = vars;
  for segment in path.split('.') {
    if segment.is_empty() {
      return None;
    }
    current = current.as_object()?.get(segment)?;
  }
  Some(current)
}

pub(crate) fn truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(o) => !o.is_empty(),
  }
}

pub(crate) fn render_pipeline(
  pipeline: &Pipeline,
  vars: &Value,
) -> crate::Result<String> {
  match eval_pipeline(pipeline, vars)? {
    Evaluated::Missing(path) => Err(Error::Exec {
      message: format!("no value at '.{path}'"),
    }),
    Evaluated::Present(value) => emit(&value),
  }
}

fn emit(value: &Value) -> crate::Result<String> {
  match value {
    Value::Null => Ok(String::new()),
    Value::Bool(b) => Ok(b.to_string()),
    Value::Number(n) => Ok(n.to_string()),
    Value::String(s) => Ok(s.clone()),
    Value::Array(_) | Value::Object(_) => Err(Error::Exec {
      message: String::from(
        "cannot interpolate a list or map value, pipe it through a formatting function",
      ),
    }),
  }
}

pub(crate) fn eval_pipeline(
  pipeline: &Pipeline,
  vars: &Value,
) -> crate::Result<Evaluated> {
  let mut current: Option<Evaluated> = None;
  for command in &pipeline.commands {
    current = Some(eval_command(command, current, vars)?);
  }
  // the parser guarantees at least one command
  current.ok_or(Error::Exec {
    message: String::from("empty pipeline"),
  })
}

fn eval_command(
  command: &Command,
  piped: Option<Evaluated>,
  vars: &Value,
) -> crate::Result<Evaluated> {
  match &command.terms[0] {
    Term::Ident(name) => {
      let mut args = Vec::with_capacity(command.terms.len());
      for term in &command.terms[1..] {
        args.push(eval_term(term, vars)?.into_value());
      }
      if let Some(piped) = piped {
        args.push(piped.into_value());
      }
      funcs::call(name, args).map(Evaluated::Present)
    }
    term => {
      if command.terms.len() > 1 {
        return Err(Error::Exec {
          message: String::from(
            "expected a function name at the head of a multi-term command",
          ),
        });
      }
      if piped.is_some() {
        return Err(Error::Exec {
          message: String::from(
            "pipeline stages after the first must be function calls",
          ),
        });
      }
      eval_term(term, vars)
    }
  }
}

fn eval_term(
  term: &Term,
  vars: &Value,
) -> crate::Result<Evaluated> {
  match term {
    Term::Path(segments) => {
      let mut current = vars;
      for segment in segments {
        match current.as_object().and_then(|o| o.get(segment)) {
          Some(next) => current = next,
          None => {
            return Ok(Evaluated::Missing(segments.join(".")));
          }
        }
      }
      Ok(Evaluated::Present(current.clone()))
    }
    Term::Str(s) => Ok(Evaluated::Present(Value::from(s.clone()))),
    Term::Int(i) => Ok(Evaluated::Present(Value::from(*i))),
    Term::Bool(b) => Ok(Evaluated::Present(Value::from(*b))),
    Term::Ident(name) => Err(Error::Exec {
      message: format!(
        "function '{name}' cannot be used as an argument"
      ),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn looks_up_nested_paths() {
    let vars = json!({ "A": { "B": { "C": 1 } } });
    assert_eq!(lookup_path(&vars, "A.B.C"), Some(&json!(1)));
    assert_eq!(lookup_path(&vars, "A.B"), Some(&json!({ "C": 1 })));
    assert_eq!(lookup_path(&vars, "A.X"), None);
    // non-terminal scalar yields absent
    assert_eq!(lookup_path(&vars, "A.B.C.D"), None);
  }

  #[test]
  fn truthiness() {
    assert!(!truthy(&Value::Null));
    assert!(!truthy(&json!("")));
    assert!(!truthy(&json!(0)));
    assert!(!truthy(&json!([])));
    assert!(truthy(&json!("x")));
    assert!(truthy(&json!(2)));
    assert!(truthy(&json!({ "a": 1 })));
  }
}
