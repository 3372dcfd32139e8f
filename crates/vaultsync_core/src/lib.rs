//! # VaultSync Core
//!
//! The local encrypted record database that VaultSync keeps in sync.
//!
//! A vault is a single file holding a set of entries (string fields keyed by
//! name) plus a record of deletions. The whole body is CBOR-encoded and
//! sealed with AES-256-GCM under a key derived from the user's master key.
//!
//! ## Key Invariants
//!
//! - A vault file is either fully readable with the right master key or
//!   fails with an integrity error; there is no partial read
//! - Saves are atomic (write to a sibling temp file, then rename)
//! - Two vault files with identical content still differ byte-wise, since
//!   every save draws a fresh salt and nonce
//! - Merging never drops an entry edited after its deletion

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crypto;
mod entry;
mod error;
pub mod format;
mod merge;
mod vault;

pub use crypto::{KdfParams, MasterKey};
pub use entry::{fields, DeletedObject, Entry};
pub use error::{CoreError, CoreResult};
pub use merge::{MergeMethod, MergeStats};
pub use vault::Vault;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
