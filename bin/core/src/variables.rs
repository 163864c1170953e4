//! Variable scope resolution (low to high): built-in globals,
//! container version defaults, service level variables,
//! per-reference overrides, then the user's configuration values.
//! Maps merge deeply; scalars and lists replace wholesale.

use burndler_client::entities::service::{
  Service, ServiceContainer,
};
use serde_json::{Map, Value, json};

/// Pure function of its inputs: the same scopes always
/// produce the same tree.
pub fn resolve(
  service: &Service,
  service_container: &ServiceContainer,
  version_defaults: &Value,
  user_values: Option<&Value>,
) -> Value {
  let mut tree = json!({
    "SERVICE_NAME": service.name,
    "SERVICE_ID": service.id,
  });
  merge_layer(&mut tree, version_defaults);
  merge_layer(&mut tree, &service.variables);
  merge_layer(&mut tree, &service_container.overrides);
  if let Some(user_values) = user_values {
    merge_layer(&mut tree, user_values);
  }
  tree
}

/// An unset layer (null) is a no-op; anything else merges
/// over the target.
fn merge_layer(target: &mut Value, source: &Value) {
  if source.is_null() {
    return;
  }
  merge_values(target, source);
}

fn merge_values(target: &mut Value, source: &Value) {
  match (target.as_object_mut(), source.as_object()) {
    (Some(target_map), Some(source_map)) => {
      merge_objects(target_map, source_map)
    }
    _ => *target = source.clone(),
  }
}

fn merge_objects(
  target: &mut Map<String, Value>,
  source: &Map<String, Value>,
) {
  for (key, value) in source {
    match target.get_mut(key) {
      Some(existing) => merge_values(existing, value),
      None => {
        target.insert(key.clone(), value.clone());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use burndler_client::entities::burndler_timestamp;

  fn service(variables: Value) -> Service {
    Service {
      id: 7,
      user_id: 1,
      name: String::from("acme"),
      variables,
      created_at: burndler_timestamp(),
      updated_at: burndler_timestamp(),
    }
  }

  fn reference(overrides: Value) -> ServiceContainer {
    ServiceContainer {
      id: 1,
      service_id: 7,
      container_id: 2,
      version_id: 3,
      order: 0,
      enabled: true,
      overrides,
    }
  }

  #[test]
  fn built_in_globals_are_present() {
    let tree = resolve(
      &service(Value::Null),
      &reference(Value::Null),
      &Value::Null,
      None,
    );
    assert_eq!(tree["SERVICE_NAME"], json!("acme"));
    assert_eq!(tree["SERVICE_ID"], json!(7));
  }

  #[test]
  fn precedence_is_defaults_service_overrides_user() {
    let defaults = json!({
      "Database": { "Port": 5432, "Host": "db" },
      "Replicas": 1,
    });
    let service_vars = json!({
      "Database": { "Port": 5433 },
      "Replicas": 2,
    });
    let overrides = json!({ "Replicas": 3 });
    let user = json!({
      "Database": { "Host": "db.internal" },
    });
    let tree = resolve(
      &service(service_vars),
      &reference(overrides),
      &defaults,
      Some(&user),
    );
    // deep merge keeps sibling keys from lower scopes
    assert_eq!(tree["Database"]["Port"], json!(5433));
    assert_eq!(tree["Database"]["Host"], json!("db.internal"));
    assert_eq!(tree["Replicas"], json!(3));
  }

  #[test]
  fn lists_replace_wholesale() {
    let defaults = json!({ "Hosts": ["a", "b"] });
    let user = json!({ "Hosts": ["c"] });
    let tree = resolve(
      &service(Value::Null),
      &reference(Value::Null),
      &defaults,
      Some(&user),
    );
    assert_eq!(tree["Hosts"], json!(["c"]));
  }

  #[test]
  fn scalars_replace_maps_and_vice_versa() {
    let defaults = json!({ "Cache": { "Size": 10 } });
    let user = json!({ "Cache": false });
    let tree = resolve(
      &service(Value::Null),
      &reference(Value::Null),
      &defaults,
      Some(&user),
    );
    assert_eq!(tree["Cache"], json!(false));
  }

  #[test]
  fn resolution_is_pure() {
    let defaults = json!({ "A": { "B": 1 } });
    let svc = service(json!({ "A": { "C": 2 } }));
    let sc = reference(Value::Null);
    let first = resolve(&svc, &sc, &defaults, None);
    let second = resolve(&svc, &sc, &defaults, None);
    assert_eq!(first, second);
  }
}
