//! # Configuring the Burndler Core API
//!
//! Burndler Core is configured by parsing a base configuration file
//! ([CoreConfig]), and overriding any fields given in the file with
//! ones provided on the environment ([Env]).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{
  compose::LintOptions,
  logger::{LogConfig, LogLevel, StdioLogMode},
};

/// # Burndler Core Environment Variables
///
/// You can override any fields of the [CoreConfig] by passing the
/// associated environment variable. The variables should be passed in
/// the traditional `UPPER_SNAKE_CASE` format, although the lower case
/// format can still be parsed. Secrets can alternatively be read from
/// files using the `_FILE` variants.
#[derive(Debug, Clone, Deserialize)]
pub struct Env {
  /// Specify a custom config path for the core config toml.
  #[serde(default)]
  pub burndler_config_path: Option<PathBuf>,
  /// Print some extra logs on startup to debug config loading issues.
  #[serde(default)]
  pub burndler_config_debug: bool,

  /// Override `title`
  pub burndler_title: Option<String>,
  /// Override `host`
  pub burndler_host: Option<String>,
  /// Override `port`
  pub burndler_port: Option<u16>,
  /// Override `bind_ip`
  pub burndler_bind_ip: Option<String>,
  /// Override `setup_token`
  pub burndler_setup_token: Option<String>,
  /// Override `setup_token` with file
  pub burndler_setup_token_file: Option<PathBuf>,
  /// Override `ssl_enabled`
  pub burndler_ssl_enabled: Option<bool>,
  /// Override `ssl_cert_file`
  pub burndler_ssl_cert_file: Option<PathBuf>,
  /// Override `ssl_key_file`
  pub burndler_ssl_key_file: Option<PathBuf>,

  /// Override `storage.local_root`
  pub burndler_storage_local_root: Option<PathBuf>,
  /// Override `storage.url_base`
  pub burndler_storage_url_base: Option<String>,
  /// Override `storage.signing_secret`
  pub burndler_storage_signing_secret: Option<String>,
  /// Override `storage.signing_secret` with file
  pub burndler_storage_signing_secret_file: Option<PathBuf>,
  /// Override `storage.signed_url_ttl_secs`
  pub burndler_storage_signed_url_ttl_secs: Option<u64>,

  /// Override `build.timeout_secs`
  pub burndler_build_timeout_secs: Option<u64>,
  /// Override `build.fan_out`
  pub burndler_build_fan_out: Option<usize>,

  /// Override `lint.strict`
  pub burndler_lint_strict: Option<bool>,

  /// Override `logging.level`
  pub burndler_logging_level: Option<LogLevel>,
  /// Override `logging.stdio`
  pub burndler_logging_stdio: Option<StdioLogMode>,
  /// Override `logging.pretty`
  pub burndler_logging_pretty: Option<bool>,
  /// Override `logging.location`
  pub burndler_logging_location: Option<bool>,
  /// Override `pretty_startup_config`
  pub burndler_pretty_startup_config: Option<bool>,
}

/// Core configuration, parsed from the config toml with [Env]
/// overrides applied on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
  /// Display title for this instance.
  #[serde(default = "default_title")]
  pub title: String,

  /// Public facing host, eg `https://burndler.example.com`.
  /// Used as the default base for storage retrieval URLs.
  #[serde(default)]
  pub host: String,

  /// Port the api runs on. Default: 9720
  #[serde(default = "default_core_port")]
  pub port: u16,

  /// IP the api binds to. Default: 0.0.0.0
  #[serde(default = "default_core_bind_ip")]
  pub bind_ip: String,

  /// Operator minted token gating one-time admin creation.
  /// Must be at least 32 characters to be accepted.
  #[serde(default)]
  pub setup_token: String,

  /// Whether to serve the api over https.
  #[serde(default)]
  pub ssl_enabled: bool,
  /// Path to the ssl certificate.
  #[serde(default = "default_ssl_cert_file")]
  pub ssl_cert_file: PathBuf,
  /// Path to the ssl private key.
  #[serde(default = "default_ssl_key_file")]
  pub ssl_key_file: PathBuf,

  #[serde(default)]
  pub storage: StorageConfig,

  #[serde(default)]
  pub build: BuildConfig,

  /// Default lint options applied to builds and publishes.
  #[serde(default)]
  pub lint: LintOptions,

  #[serde(default)]
  pub logging: LogConfig,

  /// Pretty print the startup config debug log.
  #[serde(default)]
  pub pretty_startup_config: bool,
}

fn default_title() -> String {
  String::from("Burndler")
}

fn default_core_port() -> u16 {
  9720
}

fn default_core_bind_ip() -> String {
  String::from("0.0.0.0")
}

fn default_ssl_cert_file() -> PathBuf {
  PathBuf::from("/config/ssl/cert.pem")
}

fn default_ssl_key_file() -> PathBuf {
  PathBuf::from("/config/ssl/key.pem")
}

impl Default for CoreConfig {
  fn default() -> Self {
    CoreConfig {
      title: default_title(),
      host: Default::default(),
      port: default_core_port(),
      bind_ip: default_core_bind_ip(),
      setup_token: Default::default(),
      ssl_enabled: false,
      ssl_cert_file: default_ssl_cert_file(),
      ssl_key_file: default_ssl_key_file(),
      storage: Default::default(),
      build: Default::default(),
      lint: Default::default(),
      logging: Default::default(),
      pretty_startup_config: false,
    }
  }
}

impl CoreConfig {
  /// The config with secrets redacted, for startup logging.
  pub fn sanitized(&self) -> CoreConfig {
    let mut config = self.clone();
    config.setup_token = empty_or_redacted(&config.setup_token);
    config.storage.signing_secret =
      empty_or_redacted(&config.storage.signing_secret);
    config
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
  /// Blob storage backend.
  #[serde(default)]
  pub provider: StorageProvider,

  /// Root directory for the `local` provider.
  #[serde(default = "default_local_root")]
  pub local_root: PathBuf,

  /// Base URL emitted in canonical / signed retrieval URLs.
  /// Falls back to `{host}/storage` when empty.
  #[serde(default)]
  pub url_base: String,

  /// HMAC-SHA256 secret for signed URLs.
  #[serde(default)]
  pub signing_secret: String,

  /// Lifetime of signed URLs in seconds. Default: 1 day.
  #[serde(default = "default_signed_url_ttl")]
  pub signed_url_ttl_secs: u64,
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
  #[default]
  Local,
}

fn default_local_root() -> PathBuf {
  PathBuf::from("/burndler/storage")
}

fn default_signed_url_ttl() -> u64 {
  24 * 60 * 60
}

impl Default for StorageConfig {
  fn default() -> Self {
    StorageConfig {
      provider: Default::default(),
      local_root: default_local_root(),
      url_base: Default::default(),
      signing_secret: Default::default(),
      signed_url_ttl_secs: default_signed_url_ttl(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
  /// Per build wall clock timeout in seconds.
  /// Default: 10 minutes.
  #[serde(default = "default_build_timeout")]
  pub timeout_secs: u64,

  /// Bounded fan out for template rendering and asset
  /// resolution. Default: 4.
  #[serde(default = "default_fan_out")]
  pub fan_out: usize,
}

fn default_build_timeout() -> u64 {
  10 * 60
}

fn default_fan_out() -> usize {
  4
}

impl Default for BuildConfig {
  fn default() -> Self {
    BuildConfig {
      timeout_secs: default_build_timeout(),
      fan_out: default_fan_out(),
    }
  }
}

pub fn empty_or_redacted(src: &str) -> String {
  if src.is_empty() {
    String::new()
  } else {
    String::from("##############")
  }
}
