use std::sync::OnceLock;

use storage::Storage;

use crate::{
  config::core_config, db::DbClient, setup::SetupManager,
};

pub fn db_client() -> &'static DbClient {
  static DB_CLIENT: OnceLock<DbClient> = OnceLock::new();
  DB_CLIENT.get_or_init(DbClient::new)
}

pub fn storage() -> &'static Storage {
  static STORAGE: OnceLock<Storage> = OnceLock::new();
  STORAGE.get_or_init(|| {
    let config = core_config();
    Storage::from_config(&config.storage, &config.host)
      .expect("failed to initialize blob storage")
  })
}

pub fn setup_manager() -> &'static SetupManager {
  static SETUP_MANAGER: OnceLock<SetupManager> = OnceLock::new();
  SETUP_MANAGER.get_or_init(SetupManager::new)
}
