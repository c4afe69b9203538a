//! Anonymous-sender sealed box.
//!
//! The sender needs only the recipient's public key and reveals nothing about
//! its own identity. Opening needs the recipient's full keypair.
//!
//! Construction:
//!   esk, epk  = fresh X25519 ephemeral keypair (one per call)
//!   key       = HKDF-SHA256(ikm = X25519(esk, rpk), salt = epk || rpk, info = CONTEXT)
//!   nonce     = BLAKE3(epk || rpk)[..24]
//!   wire      = [ epk (32 bytes) | XChaCha20-Poly1305 ciphertext + tag (16 bytes) ]
//!
//! The nonce is derived, not transmitted, so the overhead is exactly
//! `SEAL_OVERHEAD` = 48 bytes. A fresh ephemeral key per call makes the
//! ciphertext nondeterministic.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

use crate::encoding::{from_b64, to_b64};
use crate::error::CryptoError;
use crate::keys::{PublicKeyBytes, SecretKeyBytes, KEY_LEN};

const CONTEXT: &[u8] = b"zt-sealed-box-v1";
const TAG_LEN: usize = 16;
const NONCE_LEN: usize = 24;

/// Ephemeral public key + Poly1305 tag.
pub const SEAL_OVERHEAD: usize = KEY_LEN + TAG_LEN;

/// Wire/storage form of a sealed payload: raw ciphertext, URL-safe base64
/// (no padding) whenever it is serialised.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Envelope {
    ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn from_bytes(ciphertext: Vec<u8>) -> Self {
        Self { ciphertext }
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        Ok(Self::from_bytes(from_b64(s)?))
    }

    pub fn to_b64(&self) -> String {
        to_b64(&self.ciphertext)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn len(&self) -> usize {
        self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("len", &self.ciphertext.len())
            .finish()
    }
}

impl TryFrom<String> for Envelope {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_b64(&value)
    }
}

impl From<Envelope> for String {
    fn from(value: Envelope) -> Self {
        value.to_b64()
    }
}

fn derive_key(
    shared: &[u8; 32],
    epk: &[u8; 32],
    rpk: &[u8; 32],
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let mut salt = [0u8; 2 * KEY_LEN];
    salt[..KEY_LEN].copy_from_slice(epk);
    salt[KEY_LEN..].copy_from_slice(rpk);
    let hk = Hkdf::<Sha256>::new(Some(&salt), shared);
    let mut key = Zeroizing::new([0u8; 32]);
    hk.expand(CONTEXT, key.as_mut())
        .map_err(|_| CryptoError::Seal)?;
    Ok(key)
}

fn derive_nonce(epk: &[u8; 32], rpk: &[u8; 32]) -> [u8; NONCE_LEN] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(epk);
    hasher.update(rpk);
    let digest = hasher.finalize();
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&digest.as_bytes()[..NONCE_LEN]);
    nonce
}

/// Seal `plaintext` to `recipient`. Output length is
/// `plaintext.len() + SEAL_OVERHEAD`.
pub fn seal(plaintext: &[u8], recipient: &PublicKeyBytes) -> Result<Envelope, CryptoError> {
    let esk = EphemeralSecret::random_from_rng(OsRng);
    let epk = PublicKey::from(&esk);
    let shared = esk.diffie_hellman(&recipient.to_x25519());
    if !shared.was_contributory() {
        return Err(CryptoError::InvalidKey("recipient key is low-order".into()));
    }

    let key = derive_key(shared.as_bytes(), epk.as_bytes(), &recipient.0)?;
    let nonce = derive_nonce(epk.as_bytes(), &recipient.0);
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_ref()).map_err(|_| CryptoError::Seal)?;
    let ct = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Seal)?;

    let mut out = Vec::with_capacity(KEY_LEN + ct.len());
    out.extend_from_slice(epk.as_bytes());
    out.extend_from_slice(&ct);
    Ok(Envelope::from_bytes(out))
}

/// Open an envelope with the recipient's keypair.
///
/// Never panics on foreign or malformed input: anything that does not
/// authenticate comes back as `CryptoError::DecryptionFailed`.
pub fn open(
    envelope: &Envelope,
    recipient_public: &PublicKeyBytes,
    recipient_secret: &SecretKeyBytes,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let data = envelope.as_bytes();
    if data.len() < SEAL_OVERHEAD {
        return Err(CryptoError::DecryptionFailed);
    }
    let (epk_bytes, ct) = data.split_at(KEY_LEN);
    let epk: [u8; KEY_LEN] = epk_bytes
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed)?;

    let shared = recipient_secret
        .to_x25519()
        .diffie_hellman(&PublicKey::from(epk));
    if !shared.was_contributory() {
        return Err(CryptoError::DecryptionFailed);
    }

    let key = derive_key(shared.as_bytes(), &epk, &recipient_public.0)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let nonce = derive_nonce(&epk, &recipient_public.0);
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let plaintext = cipher
        .decrypt(XNonce::from_slice(&nonce), ct)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Keypair;

    fn open_with(kp: &Keypair, env: &Envelope) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        open(env, &kp.public, kp.secret())
    }

    #[test]
    fn seal_open_roundtrip() {
        let bob = Keypair::generate().unwrap();
        for msg in [&b""[..], b"hello", &[0xAAu8; 4096][..]] {
            let env = seal(msg, &bob.public).unwrap();
            assert_eq!(env.len(), msg.len() + SEAL_OVERHEAD);
            assert_eq!(open_with(&bob, &env).unwrap().as_slice(), msg);
        }
    }

    #[test]
    fn ciphertext_is_fresh_per_call() {
        let bob = Keypair::generate().unwrap();
        let a = seal(b"same", &bob.public).unwrap();
        let b = seal(b"same", &bob.public).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_keypair_is_rejected() {
        let bob = Keypair::generate().unwrap();
        let eve = Keypair::generate().unwrap();
        let env = seal(b"for bob only", &bob.public).unwrap();
        let err = open_with(&eve, &env).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed));
    }

    #[test]
    fn mismatched_public_key_is_rejected() {
        let bob = Keypair::generate().unwrap();
        let other = Keypair::generate().unwrap();
        let env = seal(b"payload", &bob.public).unwrap();
        let err = open(&env, &other.public, bob.secret()).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed));
    }

    #[test]
    fn tampering_is_detected() {
        let bob = Keypair::generate().unwrap();
        let env = seal(b"payload", &bob.public).unwrap();
        let mut raw = env.as_bytes().to_vec();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let err = open_with(&bob, &Envelope::from_bytes(raw)).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptionFailed));
    }

    #[test]
    fn short_or_garbage_input_fails_cleanly() {
        let bob = Keypair::generate().unwrap();
        for raw in [vec![], vec![7u8; 10], vec![0u8; SEAL_OVERHEAD], vec![0x5Au8; 200]] {
            let err = open_with(&bob, &Envelope::from_bytes(raw)).unwrap_err();
            assert!(matches!(err, CryptoError::DecryptionFailed));
        }
    }

    #[test]
    fn low_order_recipient_key_is_refused() {
        let err = seal(b"x", &PublicKeyBytes([0u8; 32])).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }

    #[test]
    fn envelope_json_is_url_safe_b64() {
        let bob = Keypair::generate().unwrap();
        let env = seal(b"wire", &bob.public).unwrap();
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains('+') && !json.contains('/') && !json.contains('='));
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(open_with(&bob, &back).unwrap().as_slice(), b"wire");
    }
}
