//! # tally-sync: Sync Engine for Tally POS
//!
//! Uploads the local ledger to the remote store whenever the device is
//! online. Every synchronizable row carries its own PENDING/SYNCED flag;
//! the engine drains PENDING rows in dependency order and flips them to
//! SYNCED once the remote accepts them.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Offline-First Upload                               │
//! │                                                                         │
//! │  ┌──────────────┐      ┌──────────────┐      ┌──────────────────────┐ │
//! │  │   tally-db   │      │  SyncEngine  │      │    RemoteStore       │ │
//! │  │              │─────►│              │─────►│                      │ │
//! │  │ PENDING rows │      │ upload order │      │ upsert by local id   │ │
//! │  │              │◄─────│ mark SYNCED  │◄─────│ ack (+ remote id)    │ │
//! │  └──────────────┘      └──────────────┘      └──────────────────────┘ │
//! │                                                                         │
//! │  Offline: the till keeps selling, rows stay PENDING.                   │
//! │  Online:  the next cycle uploads them; re-sends are harmless.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - TOML configuration with `TALLY_*` overrides
//! - [`dto`] - Remote record shapes
//! - [`remote`] - The [`RemoteStore`] seam and its HTTP implementation
//! - [`engine`] - The sync cycle
//! - [`error`] - Sync error types

pub mod config;
pub mod dto;
pub mod engine;
pub mod error;
pub mod remote;

#[cfg(test)]
pub(crate) mod testing;

pub use config::SyncConfig;
pub use dto::{ChildRecord, ToRemote};
pub use engine::{EngineOptions, SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use remote::{HttpRemoteStore, RemoteAck, RemoteStore, SyncBeacon, UpsertRequest};
