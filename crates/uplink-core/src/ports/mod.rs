//! Port definitions (hexagonal architecture interfaces)
//!
//! The sync engine depends on these traits; adapters in `uplink-sync`
//! (or test doubles) implement them.
//!
//! ## Ports Overview
//!
//! - [`IUploader`] - Hands one local artifact to remote storage
//! - [`IEncryptor`] - Encrypts one file into another
//! - [`ITreeWalker`] - Enumerates the files below a root
//! - [`IStateStore`] - Loads and saves the persisted [`Registry`](crate::domain::Registry)

pub mod encryptor;
pub mod state_store;
pub mod tree_walker;
pub mod uploader;

pub use encryptor::IEncryptor;
pub use state_store::IStateStore;
pub use tree_walker::ITreeWalker;
pub use uploader::IUploader;
