use async_timing_util::unix_timestamp_ms;
use serde::{
  Deserialize, Serialize,
  de::{Visitor, value::MapAccessDeserializer},
};
use typeshare::typeshare;

/// Subtypes of [Build][build::Build].
pub mod build;
/// Merge reports and lint reports shared between the compose
/// preview endpoints and the build pipeline.
pub mod compose;
/// [CoreConfig][config::CoreConfig] and its [Env][config::Env] overrides.
pub mod config;
/// Subtypes of [Container][container::Container].
pub mod container;
/// Stable error kind identifiers.
pub mod error;
/// Subtypes of [LogConfig][logger::LogConfig].
pub mod logger;
/// Dependency rules and their violations.
pub mod rules;
/// Subtypes of [Service][service::Service].
pub mod service;
/// Setup wizard stages.
pub mod setup;
/// Subtypes of [User][user::User].
pub mod user;

#[typeshare(serialized_as = "number")]
pub type I64 = i64;
#[typeshare(serialized_as = "number")]
pub type U64 = u64;

/// Unix timestamp in milliseconds as i64
pub fn burndler_timestamp() -> i64 {
  unix_timestamp_ms() as i64
}

/// Lowercases a display name into the slug used as the
/// first segment of a merge namespace.
pub fn to_service_slug(name: &str) -> String {
  let mut slug = String::with_capacity(name.len());
  let mut prev_dash = false;
  for c in name.trim().chars() {
    if c.is_ascii_alphanumeric() {
      slug.push(c.to_ascii_lowercase());
      prev_dash = false;
    } else if !prev_dash && !slug.is_empty() {
      slug.push('-');
      prev_dash = true;
    }
  }
  while slug.ends_with('-') {
    slug.pop();
  }
  slug
}

#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct __Serror {
  pub error: String,
  pub trace: Vec<String>,
}

/// A `vMAJOR.MINOR.PATCH` semantic version.
/// Ordering is by (major, minor, patch) for
/// `minimum_version` compatibility checks.
#[typeshare]
#[derive(
  Serialize,
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
)]
pub struct Version {
  pub major: i32,
  pub minor: i32,
  pub patch: i32,
}

impl<'de> Deserialize<'de> for Version {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    #[derive(Deserialize)]
    struct VersionInner {
      major: i32,
      minor: i32,
      patch: i32,
    }

    struct VersionVisitor;

    impl<'de> Visitor<'de> for VersionVisitor {
      type Value = Version;
      fn expecting(
        &self,
        formatter: &mut std::fmt::Formatter,
      ) -> std::fmt::Result {
        write!(
          formatter,
          "version string or object | example: 'v0.2.4' or {{ \"major\": 0, \"minor\": 2, \"patch\": 4 }}"
        )
      }

      fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
      where
        E: serde::de::Error,
      {
        v.parse()
          .map_err(|e| serde::de::Error::custom(format!("{e:#}")))
      }

      fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
      where
        A: serde::de::MapAccess<'de>,
      {
        let VersionInner {
          major,
          minor,
          patch,
        } = VersionInner::deserialize(MapAccessDeserializer::new(
          map,
        ))?;
        Ok(Version {
          major,
          minor,
          patch,
        })
      }
    }

    deserializer.deserialize_any(VersionVisitor)
  }
}

impl std::str::FromStr for Version {
  type Err = anyhow::Error;
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let stripped = s.trim().strip_prefix('v').unwrap_or(s.trim());
    let mut parts = stripped.split('.');
    let mut next = |field: &str| {
      parts
        .next()
        .ok_or_else(|| {
          anyhow::anyhow!("version '{s}' is missing {field}")
        })?
        .parse::<i32>()
        .map_err(|_| {
          anyhow::anyhow!("version '{s}' has non numeric {field}")
        })
    };
    let version = Version {
      major: next("major")?,
      minor: next("minor")?,
      patch: next("patch")?,
    };
    if parts.next().is_some() {
      return Err(anyhow::anyhow!(
        "version '{s}' has more than three components"
      ));
    }
    Ok(version)
  }
}

impl std::fmt::Display for Version {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_versions_with_and_without_prefix() {
    let version: Version = "v1.2.3".parse().unwrap();
    assert_eq!(
      version,
      Version {
        major: 1,
        minor: 2,
        patch: 3
      }
    );
    let bare: Version = "0.10.0".parse().unwrap();
    assert_eq!(bare.to_string(), "v0.10.0");
    assert!("1.2".parse::<Version>().is_err());
    assert!("1.2.x".parse::<Version>().is_err());
  }

  #[test]
  fn orders_by_components() {
    let a: Version = "v1.2.3".parse().unwrap();
    let b: Version = "v1.10.0".parse().unwrap();
    assert!(a < b);
  }

  #[test]
  fn slugifies_service_names() {
    assert_eq!(to_service_slug("Acme Corp"), "acme-corp");
    assert_eq!(to_service_slug("  acme  "), "acme");
    assert_eq!(to_service_slug("a&b.c"), "a-b-c");
  }
}
