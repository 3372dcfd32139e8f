//! # VaultSync Testkit
//!
//! Test utilities for VaultSync.
//!
//! This crate provides:
//! - Vault fixtures in temporary directories
//! - A test bed wiring a [`SyncEngine`](vaultsync_engine::SyncEngine) to an
//!   in-memory remote
//! - Scripted prompts and recording status sinks
//! - Property-based generators for URLs and entries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vaultsync_testkit::prelude::*;
//!
//! #[test]
//! fn first_sync_uploads() {
//!     let bed = TestBed::new();
//!     let mut vault = bed.vault("vault.kdbx");
//!     assert!(bed.sync(&mut vault, true).is_success());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
