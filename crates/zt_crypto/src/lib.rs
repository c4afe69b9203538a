//! zt_crypto — Zero Trust Chat cryptographic primitives
//!
//! # Design principles
//! - NO custom primitives; X25519, HKDF-SHA256, XChaCha20-Poly1305 and BLAKE3
//!   all come from audited Rust crates.
//! - Secret key material is zeroized on drop.
//! - Every binary value crossing the wire is URL-safe base64 without padding.
//!
//! # Module layout
//! - `keys`     — X25519 keypair generation and the public/secret newtypes
//! - `sealed`   — anonymous-sender sealed box (`seal` / `open`) and `Envelope`
//! - `file`     — file content + metadata encryption on top of `sealed`
//! - `encoding` — the single base64 variant used everywhere
//! - `error`    — unified error type

pub mod encoding;
pub mod error;
pub mod file;
pub mod keys;
pub mod sealed;

pub use error::CryptoError;
pub use file::{FileCipherError, FileMetadata};
pub use keys::{Keypair, PublicKeyBytes, SecretKeyBytes};
pub use sealed::{open, seal, Envelope, SEAL_OVERHEAD};
