//! One-time bootstrap of the initial administrator.
//!
//! Process-wide state machine, serialized behind a mutex:
//! `uninitialized -> token_valid -> admin_created -> completed`.

use std::sync::Mutex;

use anyhow::Context;
use burndler_client::entities::{
  error::ErrorKind,
  setup::{SETUP_TOKEN_MIN_LENGTH, SetupStage},
  user::User,
};
use serde_json::Value;

use crate::{
  config::core_config,
  db::DbClient,
  helpers::{AddErrorKind, CoreResult, err},
};

pub struct SetupManager {
  stage: Mutex<SetupStage>,
}

impl SetupManager {
  pub fn new() -> SetupManager {
    SetupManager {
      stage: Mutex::new(SetupStage::Uninitialized),
    }
  }

  pub fn stage(&self) -> SetupStage {
    *self.stage.lock().unwrap()
  }

  /// Present the operator minted token to unlock admin
  /// creation. Re-presenting in `token_valid` is a no-op.
  pub fn init(&self, token: &str) -> CoreResult<SetupStage> {
    let mut stage = self.stage.lock().unwrap();
    match *stage {
      SetupStage::Uninitialized | SetupStage::TokenValid => {}
      SetupStage::AdminCreated | SetupStage::Completed => {
        return Err(err(
          ErrorKind::SetupAlreadyCompleted,
          "setup has already been performed",
        ));
      }
    }
    let expected = &core_config().setup_token;
    if expected.len() < SETUP_TOKEN_MIN_LENGTH {
      return Err(err(
        ErrorKind::InvalidSetupToken,
        "no setup token of sufficient length is configured",
      ));
    }
    if token != expected {
      return Err(err(
        ErrorKind::InvalidSetupToken,
        "the presented setup token does not match",
      ));
    }
    *stage = SetupStage::TokenValid;
    Ok(*stage)
  }

  /// Create the single admin account. Only legal in
  /// `token_valid`.
  pub fn create_admin(
    &self,
    db: &DbClient,
    username: &str,
    password: &str,
  ) -> CoreResult<User> {
    let mut stage = self.stage.lock().unwrap();
    match *stage {
      SetupStage::TokenValid => {}
      SetupStage::Uninitialized => {
        return Err(err(
          ErrorKind::InvalidSetupToken,
          "present the setup token before creating the admin",
        ));
      }
      SetupStage::AdminCreated | SetupStage::Completed => {
        return Err(err(
          ErrorKind::SetupAlreadyCompleted,
          "the admin account has already been created",
        ));
      }
    }
    if password.is_empty() {
      return Err(err(
        ErrorKind::InvalidRequest,
        "admin password cannot be empty",
      ));
    }
    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
      .context("failed to hash admin password")
      .error_kind(ErrorKind::Internal)?;
    let user = db.create_user(username, hash, true)?;
    *stage = SetupStage::AdminCreated;
    info!("setup | created admin '{}'", user.username);
    Ok(user)
  }

  /// Store site-level settings and finish setup. Only legal
  /// in `admin_created`.
  pub fn complete(
    &self,
    db: &DbClient,
    settings: Value,
  ) -> CoreResult<SetupStage> {
    let mut stage = self.stage.lock().unwrap();
    match *stage {
      SetupStage::AdminCreated => {}
      SetupStage::Uninitialized => {
        return Err(err(
          ErrorKind::InvalidSetupToken,
          "present the setup token before completing setup",
        ));
      }
      SetupStage::TokenValid => {
        return Err(err(
          ErrorKind::InvalidRequest,
          "create the admin account before completing setup",
        ));
      }
      SetupStage::Completed => {
        return Err(err(
          ErrorKind::SetupAlreadyCompleted,
          "setup has already been completed",
        ));
      }
    }
    db.store_settings(settings);
    *stage = SetupStage::Completed;
    info!("setup | completed");
    Ok(*stage)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // the configured token is read from the process
  // environment before the config OnceLock initializes
  fn configure_token() -> String {
    let token = String::from("0123456789abcdef0123456789abcdef");
    unsafe {
      std::env::set_var("BURNDLER_SETUP_TOKEN", &token);
    }
    token
  }

  #[test]
  fn walks_the_full_state_chain() {
    let token = configure_token();
    let manager = SetupManager::new();
    let db = DbClient::new();

    assert_eq!(manager.stage(), SetupStage::Uninitialized);

    // admin creation before the token fails
    let before = manager
      .create_admin(&db, "admin", "hunter22")
      .unwrap_err();
    assert_eq!(before.kind, ErrorKind::InvalidSetupToken);

    assert!(manager.init("wrong-token").is_err());
    assert_eq!(
      manager.init(&token).unwrap(),
      SetupStage::TokenValid
    );
    // idempotent re-presentation
    assert_eq!(
      manager.init(&token).unwrap(),
      SetupStage::TokenValid
    );

    let admin = manager
      .create_admin(&db, "admin", "hunter22")
      .unwrap();
    assert!(admin.admin);
    assert!(db.has_admin());

    // exactly one admin may be created
    let second = manager
      .create_admin(&db, "admin2", "hunter22")
      .unwrap_err();
    assert_eq!(second.kind, ErrorKind::SetupAlreadyCompleted);

    assert_eq!(
      manager
        .complete(&db, serde_json::json!({ "title": "Acme" }))
        .unwrap(),
      SetupStage::Completed
    );
    assert_eq!(
      db.settings(),
      serde_json::json!({ "title": "Acme" })
    );

    // everything is closed now
    assert_eq!(
      manager
        .create_admin(&db, "admin3", "hunter22")
        .unwrap_err()
        .kind,
      ErrorKind::SetupAlreadyCompleted
    );
    assert_eq!(
      manager.init(&token).unwrap_err().kind,
      ErrorKind::SetupAlreadyCompleted
    );
    assert_eq!(
      manager
        .complete(&db, Value::Null)
        .unwrap_err()
        .kind,
      ErrorKind::SetupAlreadyCompleted
    );
  }
}
