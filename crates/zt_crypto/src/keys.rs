//! X25519 keypairs.
//!
//! One keypair per identity, generated at registration. The public half is
//! the only key that ever leaves the device; the secret half is wrapped in a
//! newtype that zeroizes on drop and never implements `Serialize`.

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::encoding::{from_b64, to_b64};
use crate::error::CryptoError;

pub const KEY_LEN: usize = 32;

/// 32-byte X25519 public key, URL-safe base64 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKeyBytes(pub [u8; KEY_LEN]);

impl PublicKeyBytes {
    pub fn to_b64(&self) -> String {
        to_b64(&self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        Self::from_slice(&from_b64(s)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "Public key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub(crate) fn to_x25519(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl TryFrom<String> for PublicKeyBytes {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_b64(&value)
    }
}

impl From<PublicKeyBytes> for String {
    fn from(value: PublicKeyBytes) -> Self {
        value.to_b64()
    }
}

/// 32-byte X25519 secret key. Drop clears memory.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyBytes([u8; KEY_LEN]);

impl SecretKeyBytes {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Secret key must be 32 bytes".into()))?;
        Ok(Self(arr))
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let mut raw = from_b64(s)?;
        let out = Self::from_slice(&raw);
        raw.zeroize();
        out
    }

    /// Encoded form for the local key store only.
    pub fn to_b64(&self) -> String {
        to_b64(&self.0)
    }

    pub fn public_key(&self) -> PublicKeyBytes {
        PublicKeyBytes(PublicKey::from(&self.to_x25519()).to_bytes())
    }

    pub(crate) fn to_x25519(&self) -> StaticSecret {
        StaticSecret::from(self.0)
    }
}

impl std::fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKeyBytes(<redacted>)")
    }
}

/// An identity keypair.
#[derive(Clone, Debug)]
pub struct Keypair {
    pub public: PublicKeyBytes,
    secret: SecretKeyBytes,
}

impl Keypair {
    /// Fresh keypair from the OS CSPRNG. An entropy failure is fatal to
    /// registration and is reported instead of panicking.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut seed = [0u8; KEY_LEN];
        rand::RngCore::try_fill_bytes(&mut OsRng, &mut seed)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let secret = SecretKeyBytes(seed);
        seed.zeroize();
        Ok(Self::from_secret(secret))
    }

    pub fn from_secret(secret: SecretKeyBytes) -> Self {
        Self {
            public: secret.public_key(),
            secret,
        }
    }

    pub fn secret(&self) -> &SecretKeyBytes {
        &self.secret
    }
}
