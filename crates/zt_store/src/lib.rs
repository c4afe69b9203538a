//! zt_store — Local durable storage for Zero Trust Chat
//!
//! The core treats storage as an abstract durable key-value store
//! (`KeyValueStore`). Two backends ship here:
//! - `SqliteStore` — SQLite through sqlx, migrations in `migrations/` run on open
//! - `MemoryStore` — process-local map for tests and throwaway sessions
//!
//! `KeyStore` sits on top and custodies the private key per username.
//! Keys are stored unwrapped (base64 plaintext at rest). There is no
//! passphrase wrapping yet.

pub mod db;
pub mod error;
pub mod keystore;
pub mod kv;

pub use db::SqliteStore;
pub use error::StoreError;
pub use keystore::KeyStore;
pub use kv::{KeyValueStore, MemoryStore};
