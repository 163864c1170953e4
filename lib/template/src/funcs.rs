//! The curated template function library.
//!
//! Pipe semantics append the piped value as the final argument, so
//! string-manipulation functions take their subject last
//! (`{{ .Name | replace "a" "b" }}`).

use std::net::UdpSocket;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::Error;

const PASSWORD_CHARSET: &[u8] =
  b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*-_=+";

pub(crate) fn call(
  name: &str,
  args: Vec<Value>,
) -> crate::Result<Value> {
  match name {
    // ==== STRING ====
    "upper" => {
      let [s] = take::<1>(name, args)?;
      Ok(coerce_str(name, &s)?.to_uppercase().into())
    }
    "lower" => {
      let [s] = take::<1>(name, args)?;
      Ok(coerce_str(name, &s)?.to_lowercase().into())
    }
    "trim" => {
      let [s] = take::<1>(name, args)?;
      Ok(coerce_str(name, &s)?.trim().into())
    }
    "replace" => {
      let [old, new, s] = take::<3>(name, args)?;
      Ok(
        coerce_str(name, &s)?
          .replace(
            coerce_str(name, &old)?.as_str(),
            coerce_str(name, &new)?.as_str(),
          )
          .into(),
      )
    }
    "contains" => {
      let [needle, s] = take::<2>(name, args)?;
      Ok(
        coerce_str(name, &s)?
          .contains(coerce_str(name, &needle)?.as_str())
          .into(),
      )
    }
    "hasPrefix" => {
      let [prefix, s] = take::<2>(name, args)?;
      Ok(
        coerce_str(name, &s)?
          .starts_with(coerce_str(name, &prefix)?.as_str())
          .into(),
      )
    }
    "hasSuffix" => {
      let [suffix, s] = take::<2>(name, args)?;
      Ok(
        coerce_str(name, &s)?
          .ends_with(coerce_str(name, &suffix)?.as_str())
          .into(),
      )
    }
    "split" => {
      let [sep, s] = take::<2>(name, args)?;
      let sep = coerce_str(name, &sep)?;
      if sep.is_empty() {
        return Err(exec("split separator cannot be empty"));
      }
      Ok(Value::Array(
        coerce_str(name, &s)?
          .split(sep.as_str())
          .map(|part| Value::from(part.to_string()))
          .collect(),
      ))
    }
    "join" => {
      let [sep, list] = take::<2>(name, args)?;
      let sep = coerce_str(name, &sep)?;
      let Value::Array(items) = list else {
        return Err(exec("join expects a list as final argument"));
      };
      let parts = items
        .iter()
        .map(|item| coerce_str(name, item))
        .collect::<crate::Result<Vec<_>>>()?;
      Ok(parts.join(&sep).into())
    }

    // ==== ARITHMETIC (integer) ====
    "add" => int_op(name, args, |a, b| Some(a + b)),
    "sub" => int_op(name, args, |a, b| Some(a - b)),
    "mul" => int_op(name, args, |a, b| Some(a * b)),
    "div" => int_op(name, args, |a, b| {
      if b == 0 { None } else { Some(a / b) }
    }),

    // ==== PREDICATES ====
    "eq" => {
      let [a, b] = take::<2>(name, args)?;
      Ok(values_equal(&a, &b).into())
    }
    "ne" => {
      let [a, b] = take::<2>(name, args)?;
      Ok((!values_equal(&a, &b)).into())
    }

    // ==== UTILITY ====
    "default" => {
      let [fallback, value] = take::<2>(name, args)?;
      if matches!(&value, Value::Null)
        || value.as_str().is_some_and(str::is_empty)
      {
        Ok(fallback)
      } else {
        Ok(value)
      }
    }
    "env" => {
      let [key] = take::<1>(name, args)?;
      Ok(
        std::env::var(coerce_str(name, &key)?)
          .unwrap_or_default()
          .into(),
      )
    }
    "uuid" => {
      take::<0>(name, args)?;
      Ok(uuid::Uuid::new_v4().to_string().into())
    }
    "timestamp" => {
      take::<0>(name, args)?;
      Ok(
        Utc::now()
          .to_rfc3339_opts(SecondsFormat::Secs, true)
          .into(),
      )
    }

    // ==== SECURITY ====
    "generatePassword" => {
      let [length] = take::<1>(name, args)?;
      let length = coerce_int(name, &length)?;
      if !(1..=1024).contains(&length) {
        return Err(exec(
          "generatePassword length must be in 1..=1024",
        ));
      }
      let mut rng = rand::rng();
      let password = (0..length)
        .map(|_| {
          let i = rng.random_range(0..PASSWORD_CHARSET.len());
          PASSWORD_CHARSET[i] as char
        })
        .collect::<String>();
      Ok(password.into())
    }
    "sha256" => {
      let [s] = take::<1>(name, args)?;
      let mut hasher = Sha256::new();
      hasher.update(coerce_str(name, &s)?.as_bytes());
      Ok(hex::encode(hasher.finalize()).into())
    }
    "base64Encode" => {
      let [s] = take::<1>(name, args)?;
      Ok(STANDARD.encode(coerce_str(name, &s)?).into())
    }
    "base64Decode" => {
      let [s] = take::<1>(name, args)?;
      let bytes =
        STANDARD.decode(coerce_str(name, &s)?).map_err(|e| {
          exec(format!("base64Decode got invalid input | {e}"))
        })?;
      String::from_utf8(bytes)
        .map(Into::into)
        .map_err(|_| exec("base64Decode produced non utf-8 bytes"))
    }

    // ==== NETWORK ====
    "randomPort" => {
      let [lo, hi] = take::<2>(name, args)?;
      let lo = coerce_int(name, &lo)?;
      let hi = coerce_int(name, &hi)?;
      if !(1..=65535).contains(&lo)
        || !(1..=65535).contains(&hi)
        || lo > hi
      {
        return Err(exec(format!(
          "randomPort range {lo}..={hi} is not a valid port range"
        )));
      }
      Ok(rand::rng().random_range(lo..=hi).into())
    }
    "localIPv4" => {
      take::<0>(name, args)?;
      Ok(local_ipv4().into())
    }

    _ => Err(exec(format!("unknown function '{name}'"))),
  }
}

/// Best effort local address discovery. Routes a UDP socket
/// (no packets are sent) and reads the chosen source address.
fn local_ipv4() -> String {
  UdpSocket::bind("0.0.0.0:0")
    .and_then(|socket| {
      socket.connect("8.8.8.8:80")?;
      socket.local_addr()
    })
    .map(|addr| addr.ip().to_string())
    .unwrap_or_else(|_| String::from("127.0.0.1"))
}

fn exec(message: impl Into<String>) -> Error {
  Error::Exec {
    message: message.into(),
  }
}

fn take<const N: usize>(
  name: &str,
  args: Vec<Value>,
) -> crate::Result<[Value; N]> {
  let got = args.len();
  args.try_into().map_err(|_| {
    exec(format!("{name} expects {N} argument(s), got {got}"))
  })
}

fn int_op(
  name: &str,
  args: Vec<Value>,
  op: fn(i64, i64) -> Option<i64>,
) -> crate::Result<Value> {
  let [a, b] = take::<2>(name, args)?;
  let a = coerce_int(name, &a)?;
  let b = coerce_int(name, &b)?;
  op(a, b)
    .map(Value::from)
    .ok_or_else(|| exec(format!("{name}: division by zero")))
}

fn coerce_str(name: &str, value: &Value) -> crate::Result<String> {
  match value {
    Value::String(s) => Ok(s.clone()),
    Value::Number(n) => Ok(n.to_string()),
    Value::Bool(b) => Ok(b.to_string()),
    Value::Null => Ok(String::new()),
    Value::Array(_) | Value::Object(_) => Err(exec(format!(
      "{name} expects a scalar, got a list or map"
    ))),
  }
}

fn coerce_int(name: &str, value: &Value) -> crate::Result<i64> {
  match value {
    Value::Number(n) => n.as_i64().ok_or_else(|| {
      exec(format!("{name} expects an integer, got {n}"))
    }),
    Value::String(s) => s.trim().parse().map_err(|_| {
      exec(format!("{name} expects an integer, got '{s}'"))
    }),
    other => Err(exec(format!(
      "{name} expects an integer, got {other}"
    ))),
  }
}

fn values_equal(a: &Value, b: &Value) -> bool {
  match (a.as_f64(), b.as_f64()) {
    (Some(a), Some(b)) => a == b,
    _ => a == b,
  }
}
