use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] zt_crypto::CryptoError),

    #[error("Invalid username: {0:?}")]
    InvalidUsername(String),

    #[error("A private key is already stored for {0}")]
    KeyExists(String),

    #[error("Stored private key for {0} is corrupt")]
    CorruptKey(String),
}
