//! File content + descriptor encryption.
//!
//! A file travels as two independent sealed payloads: the raw content blob
//! (uploaded and addressed by a server-issued reference) and a small JSON
//! descriptor. Either one can fail to open without affecting the other.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CryptoError;
use crate::keys::{Keypair, PublicKeyBytes};
use crate::sealed::{open, seal, Envelope};

#[derive(Debug, Error)]
pub enum FileCipherError {
    #[error("Decryption failed")]
    DecryptionFailed,

    /// The envelope opened but the plaintext is not a valid descriptor.
    #[error("Malformed file metadata: {0}")]
    MalformedMetadata(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Plaintext of a file message's envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

impl FileMetadata {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: None,
        }
    }

    pub fn with_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }
}

pub fn encrypt_file(bytes: &[u8], recipient: &PublicKeyBytes) -> Result<Envelope, FileCipherError> {
    Ok(seal(bytes, recipient)?)
}

pub fn encrypt_metadata(
    metadata: &FileMetadata,
    recipient: &PublicKeyBytes,
) -> Result<Envelope, FileCipherError> {
    let json = serde_json::to_vec(metadata).map_err(CryptoError::from)?;
    Ok(seal(&json, recipient)?)
}

/// Open and parse a descriptor. A cryptographic failure and a parse failure
/// are reported as different variants.
pub fn decrypt_metadata(
    envelope: &Envelope,
    keypair: &Keypair,
) -> Result<FileMetadata, FileCipherError> {
    let plaintext = open(envelope, &keypair.public, keypair.secret())
        .map_err(|_| FileCipherError::DecryptionFailed)?;
    let metadata: FileMetadata = serde_json::from_slice(&plaintext)
        .map_err(|e| FileCipherError::MalformedMetadata(e.to_string()))?;
    if metadata.file_name.trim().is_empty() {
        return Err(FileCipherError::MalformedMetadata(
            "fileName is empty".into(),
        ));
    }
    Ok(metadata)
}

pub fn decrypt_file(envelope: &Envelope, keypair: &Keypair) -> Result<Vec<u8>, FileCipherError> {
    let plaintext = open(envelope, &keypair.public, keypair.secret())
        .map_err(|_| FileCipherError::DecryptionFailed)?;
    Ok(plaintext.to_vec())
}
