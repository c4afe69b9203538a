use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Sealing failed")]
    Seal,

    /// The envelope did not open with the supplied keypair. Expected for
    /// messages addressed to another key; callers render a failure marker.
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
