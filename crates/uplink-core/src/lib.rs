//! Uplink Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `WatchEntry`, `FileState`, `Registry`
//! - **Newtypes** - `WatchId`, `RelativePath`, `RemotePath`, `ContentHash`
//! - **Port definitions** - Traits for adapters: `IUploader`, `IEncryptor`,
//!   `ITreeWalker`, `IStateStore`
//! - **Configuration** - YAML configuration file with validation
//!
//! # Architecture
//!
//! The domain module holds pure data and validation with no I/O.
//! Ports define the trait interfaces the sync engine drives; the
//! implementations live in `uplink-sync` or in test doubles.

pub mod config;
pub mod domain;
pub mod ports;
