//! zt_proto — Wire types and the decoded message model for Zero Trust Chat
//!
//! All request/response bodies are JSON with camelCase field names. Binary
//! values (public keys, envelopes) travel as URL-safe base64 strings.
//!
//! # Modules
//! - `api`     — request/response bodies for the transport operations
//! - `message` — locally decoded messages, content variants and delivery status

pub mod api;
pub mod message;

pub use api::WireMessage;
pub use message::{ChatMessage, DeliveryStatus, MessageContent, MessageId, UnreadableReason};
