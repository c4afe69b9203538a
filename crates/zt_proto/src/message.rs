//! Locally decoded messages.
//!
//! A server row is resolved into exactly one `MessageContent` variant at
//! decode time; later consumers never inspect raw ciphertext to decide what
//! a message is.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use zt_crypto::{Envelope, FileMetadata};

pub const DECRYPTION_FAILED_MARKER: &str = "[DECRYPTION FAILED]";
pub const MALFORMED_METADATA_MARKER: &str = "[MALFORMED FILE METADATA]";
pub const SEALED_FOR_PEER_MARKER: &str = "[sealed for recipient]";

/// Server ids are permanent; local ids only live until the server accepts
/// the send.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageId {
    Server(String),
    Local(Uuid),
}

impl MessageId {
    pub fn new_local() -> Self {
        Self::Local(Uuid::new_v4())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server(id) => f.write_str(id),
            Self::Local(id) => write!(f, "local-{id}"),
        }
    }
}

/// Why a message could not be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnreadableReason {
    /// No private key stored for the local identity.
    KeyNotFound,
    /// The sender's public key could not be resolved.
    SenderUnknown,
    DecryptionFailed,
    /// The descriptor opened but did not parse.
    MalformedMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    File {
        metadata: FileMetadata,
        file_ref: Option<String>,
    },
    Unreadable(UnreadableReason),
    /// Our own message as returned by the server: sealed to the peer, so it
    /// cannot be opened locally.
    SealedForPeer,
}

impl MessageContent {
    pub fn display_text(&self) -> String {
        match self {
            Self::Text(body) => body.clone(),
            Self::File { metadata, .. } => format!("[file] {}", metadata.file_name),
            Self::Unreadable(UnreadableReason::MalformedMetadata) => {
                MALFORMED_METADATA_MARKER.to_string()
            }
            Self::Unreadable(_) => DECRYPTION_FAILED_MARKER.to_string(),
            Self::SealedForPeer => SEALED_FOR_PEER_MARKER.to_string(),
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unreadable(_))
    }
}

/// Local-only UI state. `None` on a `ChatMessage` means resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryStatus {
    Pending,
    Encrypting,
    Uploading,
    SendingFailed,
    Decrypting,
    DecryptionFailed,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: MessageId,
    pub from: String,
    pub to: String,
    /// Absent on a local draft that has not been sealed yet.
    pub envelope: Option<Envelope>,
    pub content: MessageContent,
    /// Seconds.
    pub ttl: u32,
    pub created_at: DateTime<Utc>,
    pub is_file: bool,
    pub status: Option<DeliveryStatus>,
}

impl ChatMessage {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::seconds(i64::from(self.ttl))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at() <= now
    }

    /// The other participant, seen from `me`.
    pub fn peer<'a>(&'a self, me: &str) -> &'a str {
        if self.from == me {
            &self.to
        } else {
            &self.from
        }
    }

    pub fn display_text(&self) -> String {
        self.content.display_text()
    }
}
