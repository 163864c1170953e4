use std::{path::PathBuf, sync::OnceLock};

use anyhow::Context;
use burndler_client::entities::{
  config::{CoreConfig, Env},
  logger::LogConfig,
};
use colored::Colorize;

pub fn core_config() -> &'static CoreConfig {
  static CORE_CONFIG: OnceLock<CoreConfig> = OnceLock::new();
  CORE_CONFIG.get_or_init(|| {
    let env: Env = match envy::from_env()
      .context("Failed to parse Burndler Core environment")
    {
      Ok(env) => env,
      Err(e) => {
        panic!("{e:?}");
      }
    };

    let config_path = env
      .burndler_config_path
      .clone()
      .unwrap_or_else(|| PathBuf::from("/config/config.toml"));
    let config = match std::fs::read_to_string(&config_path) {
      Ok(contents) => toml::from_str::<CoreConfig>(&contents)
        .with_context(|| {
          format!("Failed to parse config file at {config_path:?}")
        })
        .unwrap_or_else(|e| panic!("{e:?}")),
      Err(_) => {
        println!(
          "{}: No config file at {config_path:?}, using default config",
          "INFO".green(),
        );
        CoreConfig::default()
      }
    };
    if env.burndler_config_debug {
      println!(
        "{}: {}: {config:?}",
        "DEBUG".cyan(),
        "Parsed Config File".dimmed()
      );
    }

    let mut storage = config.storage;
    storage.local_root = env
      .burndler_storage_local_root
      .unwrap_or(storage.local_root);
    storage.url_base =
      env.burndler_storage_url_base.unwrap_or(storage.url_base);
    storage.signing_secret = maybe_read_item_from_file(
      env.burndler_storage_signing_secret_file,
      env.burndler_storage_signing_secret,
    )
    .unwrap_or(storage.signing_secret);
    storage.signed_url_ttl_secs = env
      .burndler_storage_signed_url_ttl_secs
      .unwrap_or(storage.signed_url_ttl_secs);

    let mut build = config.build;
    build.timeout_secs =
      env.burndler_build_timeout_secs.unwrap_or(build.timeout_secs);
    build.fan_out =
      env.burndler_build_fan_out.unwrap_or(build.fan_out);

    let mut lint = config.lint;
    lint.strict = env.burndler_lint_strict.unwrap_or(lint.strict);

    // recreating CoreConfig here makes sure all env overrides
    // are applied
    CoreConfig {
      title: env.burndler_title.unwrap_or(config.title),
      host: env.burndler_host.unwrap_or(config.host),
      port: env.burndler_port.unwrap_or(config.port),
      bind_ip: env.burndler_bind_ip.unwrap_or(config.bind_ip),
      setup_token: maybe_read_item_from_file(
        env.burndler_setup_token_file,
        env.burndler_setup_token,
      )
      .unwrap_or(config.setup_token),
      ssl_enabled: env
        .burndler_ssl_enabled
        .unwrap_or(config.ssl_enabled),
      ssl_cert_file: env
        .burndler_ssl_cert_file
        .unwrap_or(config.ssl_cert_file),
      ssl_key_file: env
        .burndler_ssl_key_file
        .unwrap_or(config.ssl_key_file),
      storage,
      build,
      lint,
      logging: LogConfig {
        level: env
          .burndler_logging_level
          .unwrap_or(config.logging.level),
        stdio: env
          .burndler_logging_stdio
          .unwrap_or(config.logging.stdio),
        pretty: env
          .burndler_logging_pretty
          .unwrap_or(config.logging.pretty),
        location: env
          .burndler_logging_location
          .unwrap_or(config.logging.location),
      },
      pretty_startup_config: env
        .burndler_pretty_startup_config
        .unwrap_or(config.pretty_startup_config),
    }
  })
}

/// Prefer the file contents when a `_FILE` variant is set and
/// the file is non-empty, falling back to the plain variable.
fn maybe_read_item_from_file(
  path: Option<PathBuf>,
  item: Option<String>,
) -> Option<String> {
  if let Some(path) = path {
    let contents = std::fs::read_to_string(&path).unwrap_or_else(
      |e| panic!("Failed to read secret file at {path:?} | {e:?}"),
    );
    let trimmed = contents.trim();
    if !trimmed.is_empty() {
      return Some(trimmed.to_string());
    }
  }
  item
}
