//! API request/response types for the chat server.
//! These map directly to JSON bodies on the wire.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use zt_crypto::Envelope;

/// Servers in the wild hand out both numeric and string ids.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Str(String),
        Num(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Str(s) => s,
        RawId::Num(n) => n.to_string(),
    })
}

// ── Directory ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyResponse {
    /// URL-safe base64, validated by the caller so a bad key is attributed
    /// to the user it belongs to.
    pub public_key: String,
}

// ── Messages ─────────────────────────────────────────────────────────────────

/// One row of `getMessages`. The envelope is kept as its encoded string so a
/// corrupt envelope surfaces as an unreadable message rather than a decode
/// error. Transports decode rows one at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "ciphertext", alias = "envelope")]
    pub envelope: String,
    /// Seconds.
    pub ttl: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_file: bool,
    /// Server-issued reference to the sealed file blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub recipient_username: String,
    pub ciphertext: Envelope,
    pub ttl: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    pub recipient_username: String,
    pub ttl: u32,
    /// Sealed `FileMetadata` JSON.
    pub encrypted_metadata: Envelope,
    /// Sealed file content.
    pub encrypted_file: Envelope,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileResponse {
    #[serde(default)]
    pub file_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileBlobResponse {
    pub encrypted_file: Envelope,
}

// ── Presence ─────────────────────────────────────────────────────────────────

/// username -> online
pub type OnlineUsersResponse = HashMap<String, bool>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStatusResponse {
    #[serde(default)]
    pub typing_users: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub is_typing: bool,
    pub recipient: String,
}

// ── Common ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(alias = "message")]
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_message_accepts_numeric_id_and_ciphertext_field() {
        let json = r#"{
            "id": 42,
            "from": "alice",
            "to": "bob",
            "ciphertext": "AAAA",
            "ttl": 60,
            "createdAt": "2024-05-01T10:00:00Z"
        }"#;
        let msg: WireMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "42");
        assert_eq!(msg.envelope, "AAAA");
        assert!(!msg.is_file);
        assert!(msg.file_ref.is_none());
    }

    #[test]
    fn wire_message_accepts_envelope_alias() {
        let json = r#"{
            "id": "m-1", "from": "a", "to": "b", "envelope": "QQ",
            "ttl": 30, "createdAt": "2024-05-01T10:00:00Z",
            "isFile": true, "fileRef": "f-9"
        }"#;
        let msg: WireMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "m-1");
        assert!(msg.is_file);
        assert_eq!(msg.file_ref.as_deref(), Some("f-9"));
    }

    #[test]
    fn typing_request_is_camel_case() {
        let body = serde_json::to_value(TypingRequest {
            is_typing: true,
            recipient: "bob".into(),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "isTyping": true, "recipient": "bob" }));
    }

    #[test]
    fn post_message_serialises_envelope_as_string() {
        let body = serde_json::to_value(PostMessageRequest {
            recipient_username: "bob".into(),
            ciphertext: Envelope::from_bytes(vec![0xfb, 0xff]),
            ttl: 60,
        })
        .unwrap();
        assert_eq!(body["recipientUsername"], "bob");
        assert_eq!(body["ciphertext"], "-_8");
        assert_eq!(body["ttl"], 60);
    }
}
