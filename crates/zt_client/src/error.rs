use thiserror::Error;

/// Network-level failures. Periodic tasks log these and try again on the
/// next tick.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request failed ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    /// Worth trying again on a later tick: the server may answer differently.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound(_) | Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// No private key is stored for the local identity.
    #[error("No private key stored for {0}")]
    KeyNotFound(String),

    /// Blocks only the send that needed it.
    #[error("Public key for {username} unavailable: {reason}")]
    RecipientKeyUnavailable { username: String, reason: String },

    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Malformed file metadata: {0}")]
    MalformedMetadata(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(#[from] zt_store::StoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] zt_crypto::CryptoError),

    /// Retry of an id that is not a failed send.
    #[error("No failed send with id {0}")]
    UnknownMessage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<zt_crypto::FileCipherError> for SyncError {
    fn from(e: zt_crypto::FileCipherError) -> Self {
        match e {
            zt_crypto::FileCipherError::DecryptionFailed => Self::DecryptionFailed,
            zt_crypto::FileCipherError::MalformedMetadata(m) => Self::MalformedMetadata(m),
            zt_crypto::FileCipherError::Crypto(c) => Self::Crypto(c),
        }
    }
}
