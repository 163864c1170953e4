//! # Burndler Template Engine
//!
//! Expands `{{ ... }}` interpolations against a variable tree
//! ([serde_json::Value]). Pipelines pass the piped value as the final
//! argument, so `{{ .Database.Port | default 5432 }}` falls back to
//! `5432` when the path is absent or empty.
//!
//! Output declared as yaml or json is re-parsed and re-serialized
//! after rendering. This catches the common class of bug where an
//! interpolation breaks yaml indentation or leaves a stray comma in
//! json, and normalizes formatting at the same time.

use burndler_client::entities::{
  container::TemplateFormat, error::ErrorKind,
};
use serde_json::Value;

mod eval;
mod funcs;
mod parse;

pub use eval::{eval_condition, lookup_path};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("invalid template at offset {offset} | {message}")]
  Parse { offset: usize, message: String },

  #[error("failed to execute template | {message}")]
  Exec { message: String },

  #[error("rendered output does not parse as {format} | {message}")]
  PostRenderStructure {
    format: TemplateFormat,
    message: String,
  },
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Parse { .. } => ErrorKind::TemplateParseError,
      Error::Exec { .. } => ErrorKind::TemplateExecError,
      Error::PostRenderStructure { .. } => {
        ErrorKind::PostRenderStructureError
      }
    }
  }
}

pub type Result<T> = ::core::result::Result<T, Error>;

/// Render a template against a variable tree.
///
/// For [TemplateFormat::Yaml] / [TemplateFormat::Json] the rendered
/// text is re-parsed and re-serialized from the parsed tree, proving
/// the output is structurally valid. [TemplateFormat::Env] and
/// [TemplateFormat::Text] are emitted as rendered.
pub fn render(
  template: &str,
  format: TemplateFormat,
  vars: &Value,
) -> Result<String> {
  let nodes = parse::parse_template(template)?;
  let mut out = String::with_capacity(template.len());
  for node in nodes {
    match node {
      parse::Node::Text(text) => out.push_str(text),
      parse::Node::Expr(pipeline) => {
        out.push_str(&eval::render_pipeline(&pipeline, vars)?)
      }
    }
  }
  match format {
    TemplateFormat::Yaml => {
      let parsed =
        serde_yaml_ng::from_str::<serde_yaml_ng::Value>(&out)
          .map_err(|e| Error::PostRenderStructure {
            format,
            message: e.to_string(),
          })?;
      serde_yaml_ng::to_string(&parsed).map_err(|e| {
        Error::PostRenderStructure {
          format,
          message: e.to_string(),
        }
      })
    }
    TemplateFormat::Json => {
      let parsed = serde_json::from_str::<Value>(&out).map_err(
        |e| Error::PostRenderStructure {
          format,
          message: e.to_string(),
        },
      )?;
      serde_json::to_string_pretty(&parsed).map_err(|e| {
        Error::PostRenderStructure {
          format,
          message: e.to_string(),
        }
      })
    }
    TemplateFormat::Env | TemplateFormat::Text => Ok(out),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn renders_yaml_with_default_fallback() {
    let out = render(
      "port: {{ .Database.Port | default 5432 }}",
      TemplateFormat::Yaml,
      &json!({ "Database": {} }),
    )
    .unwrap();
    assert!(out.contains("port: 5432"));
    serde_yaml_ng::from_str::<serde_yaml_ng::Value>(&out).unwrap();
  }

  #[test]
  fn prefers_present_value_over_default() {
    let out = render(
      "port: {{ .Database.Port | default 5432 }}",
      TemplateFormat::Yaml,
      &json!({ "Database": { "Port": 9000 } }),
    )
    .unwrap();
    assert!(out.contains("port: 9000"));
  }

  #[test]
  fn default_triggers_on_empty_string() {
    let out = render(
      "{{ .Name | default \"fallback\" }}",
      TemplateFormat::Text,
      &json!({ "Name": "" }),
    )
    .unwrap();
    assert_eq!(out, "fallback");
  }

  #[test]
  fn missing_strict_path_is_an_exec_error() {
    let err = render(
      "value: {{ .Not.There }}",
      TemplateFormat::Yaml,
      &json!({}),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Exec { .. }));
    assert_eq!(err.kind(), ErrorKind::TemplateExecError);
  }

  #[test]
  fn unterminated_interpolation_is_a_parse_error() {
    let err =
      render("{{ .A", TemplateFormat::Text, &json!({ "A": 1 }))
        .unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
  }

  #[test]
  fn invalid_yaml_output_is_a_structure_error() {
    let err = render(
      "key: {{ .V }}\n  bad indent: [",
      TemplateFormat::Yaml,
      &json!({ "V": 1 }),
    )
    .unwrap_err();
    assert!(matches!(err, Error::PostRenderStructure { .. }));
  }

  #[test]
  fn json_output_is_normalized() {
    let out = render(
      "{\"a\": {{ .A }}, \"b\": \"{{ .B | upper }}\"}",
      TemplateFormat::Json,
      &json!({ "A": 1, "B": "x" }),
    )
    .unwrap();
    let parsed: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed, json!({ "a": 1, "b": "X" }));
  }

  #[test]
  fn env_format_is_emitted_raw() {
    let out = render(
      "HOST={{ .Host }}\nPORT={{ .Port }}\n",
      TemplateFormat::Env,
      &json!({ "Host": "db", "Port": 5432 }),
    )
    .unwrap();
    assert_eq!(out, "HOST=db\nPORT=5432\n");
  }

  #[test]
  fn string_functions_chain() {
    let out = render(
      "{{ .Name | trim | lower | replace \"corp\" \"inc\" }}",
      TemplateFormat::Text,
      &json!({ "Name": "  ACME Corp  " }),
    )
    .unwrap();
    assert_eq!(out, "acme inc");
  }

  #[test]
  fn split_and_join_round_trip() {
    let out = render(
      "{{ .Hosts | split \",\" | join \";\" }}",
      TemplateFormat::Text,
      &json!({ "Hosts": "a,b,c" }),
    )
    .unwrap();
    assert_eq!(out, "a;b;c");
  }

  #[test]
  fn integer_arithmetic() {
    let vars = json!({ "Base": 8000 });
    assert_eq!(
      render("{{ .Base | add 80 }}", TemplateFormat::Text, &vars)
        .unwrap(),
      "8080"
    );
    assert_eq!(
      render("{{ mul .Base 2 }}", TemplateFormat::Text, &vars)
        .unwrap(),
      "16000"
    );
    assert_eq!(
      render("{{ div .Base 100 }}", TemplateFormat::Text, &vars)
        .unwrap(),
      "80"
    );
    let err =
      render("{{ div .Base 0 }}", TemplateFormat::Text, &vars)
        .unwrap_err();
    assert!(matches!(err, Error::Exec { .. }));
  }

  #[test]
  fn predicates() {
    let vars = json!({ "A": "x", "B": "x", "N": 2 });
    assert_eq!(
      render("{{ eq .A .B }}", TemplateFormat::Text, &vars).unwrap(),
      "true"
    );
    assert_eq!(
      render("{{ ne .N 3 }}", TemplateFormat::Text, &vars).unwrap(),
      "true"
    );
  }

  #[test]
  fn sha256_and_base64() {
    assert_eq!(
      render("{{ sha256 \"abc\" }}", TemplateFormat::Text, &json!({}))
        .unwrap(),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(
      render(
        "{{ \"burndler\" | base64Encode | base64Decode }}",
        TemplateFormat::Text,
        &json!({})
      )
      .unwrap(),
      "burndler"
    );
  }

  #[test]
  fn random_port_is_in_range() {
    let out = render(
      "{{ randomPort 2000 2010 }}",
      TemplateFormat::Text,
      &json!({}),
    )
    .unwrap();
    let port: u16 = out.parse().unwrap();
    assert!((2000..=2010).contains(&port));
  }

  #[test]
  fn generated_password_has_requested_length() {
    let out = render(
      "{{ generatePassword 24 }}",
      TemplateFormat::Text,
      &json!({}),
    )
    .unwrap();
    assert_eq!(out.chars().count(), 24);
  }

  #[test]
  fn condition_evaluation() {
    let vars = json!({ "SSL": { "Enabled": true }, "Count": 0 });
    assert!(eval_condition("eq .SSL.Enabled true", &vars).unwrap());
    assert!(!eval_condition("eq .SSL.Enabled false", &vars).unwrap());
    // absent paths are falsy, not errors, in conditions
    assert!(!eval_condition(".Cache.Enabled", &vars).unwrap());
    assert!(!eval_condition(".Count", &vars).unwrap());
  }
}
