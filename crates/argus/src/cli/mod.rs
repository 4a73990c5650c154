//! Command implementations.

pub mod analyze;
pub mod config;
pub mod runs;
pub mod upload;

use argus_core::{Config, LocalStore};

/// Open the local object store, honoring a `--store` override.
pub(crate) fn open_store(config: &Config, root_override: Option<&str>) -> LocalStore {
    let root = match root_override {
        Some(root) => std::path::PathBuf::from(shellexpand::tilde(root).into_owned()),
        None => config.store_root(),
    };
    let store = LocalStore::new(root);
    match &config.store.public_base_url {
        Some(base) => store.with_public_base_url(base.as_str()),
        None => store,
    }
}
