//! CLI subcommands
//!
//! Every command builds its own [`WatchRegistry`] from the loaded
//! configuration; the registry is not shared between processes.

pub mod config;
pub mod run;
pub mod start;
pub mod watch;

use std::sync::Arc;

use uplink_core::config::Config;
use uplink_sync::crypto::AesGcmEncryptor;
use uplink_sync::filesystem::{LocalTreeWalker, MirrorUploader};
use uplink_sync::store::JsonStateStore;
use uplink_sync::{SyncContext, WatchRegistry};

/// Wire the reference adapters into a registry
pub fn build_registry(config: &Config) -> WatchRegistry {
    let store = Arc::new(JsonStateStore::new(config.state.file.clone()));
    let ctx = SyncContext {
        uploader: Arc::new(MirrorUploader::new(config.upload.mirror_root.clone())),
        encryptor: Arc::new(AesGcmEncryptor::new()),
        walker: Arc::new(LocalTreeWalker::new()),
        temp_root: config.sync.temp_dir.clone(),
        ignore_file_name: config.sync.ignore_file_name.clone(),
    };
    WatchRegistry::new(store, ctx)
}
