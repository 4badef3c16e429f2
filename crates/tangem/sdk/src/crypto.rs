//! Key derivation and signature verification

use std::fmt;

use k256::{
    PublicKey,
    ecdh::EphemeralSecret,
    ecdsa::{Signature, VerifyingKey, signature::Verifier},
    elliptic_curve::sec1::ToEncodedPoint,
};
use nexum_tangem_apdu::SessionKey;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand_v8::thread_rng;
use sha2::{Digest, Sha256};

use crate::error::{Error, ProtocolError, Result};
use crate::types::{EllipticCurve, UserCode};

/// Size of a terminal nonce for fast encryption
pub const NONCE_SIZE: usize = 16;

/// PBKDF2 rounds used for the fast tier
pub const PBKDF2_ROUNDS: u32 = 50;

/// Fill a fresh buffer with random bytes
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

/// Derive the fast tier key
///
/// `SHA-256(PBKDF2-SHA256(access code, uid, 50) | A | B)`
pub fn derive_fast_key(access_code: &UserCode, uid: &[u8], nonce_a: &[u8], nonce_b: &[u8]) -> SessionKey {
    let mut stretched = [0u8; 32];
    pbkdf2_hmac::<Sha256>(access_code.value(), uid, PBKDF2_ROUNDS, &mut stretched);

    let mut hasher = Sha256::new();
    hasher.update(stretched);
    hasher.update(nonce_a);
    hasher.update(nonce_b);
    SessionKey::from(<[u8; 32]>::from(hasher.finalize()))
}

/// Terminal half of a strong tier exchange
pub struct EphemeralKey {
    secret: EphemeralSecret,
}

impl fmt::Debug for EphemeralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EphemeralKey(..)")
    }
}

impl EphemeralKey {
    /// Generate a fresh secp256k1 key pair
    pub fn generate() -> Self {
        Self {
            secret: EphemeralSecret::random(&mut thread_rng()),
        }
    }

    /// Uncompressed SEC1 public key sent to the card
    pub fn public_key(&self) -> Vec<u8> {
        self.secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Derive the strong tier key from the card's public key
    ///
    /// `SHA-256(shared x | access code)`
    pub fn derive_key(&self, card_key: &[u8], access_code: &UserCode) -> Result<SessionKey> {
        let card_key = PublicKey::from_sec1_bytes(card_key)
            .map_err(|_| ProtocolError::KeyNegotiation("invalid card public key"))?;
        let shared = self.secret.diffie_hellman(&card_key);

        let mut hasher = Sha256::new();
        hasher.update(shared.raw_secret_bytes());
        hasher.update(access_code.value());
        Ok(SessionKey::from(<[u8; 32]>::from(hasher.finalize())))
    }
}

/// Opaque signature check used by wallet commands
pub trait SignatureVerifier: Send + Sync + fmt::Debug {
    /// Whether `signature` over `message` verifies under `public_key`
    fn verify(
        &self,
        curve: EllipticCurve,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool>;
}

/// ECDSA over secp256k1 with SHA-256 message hashing
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(
        &self,
        curve: EllipticCurve,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        if curve != EllipticCurve::Secp256k1 {
            return Err(Error::UnsupportedCurve(curve.to_string()));
        }
        let key = VerifyingKey::from_sec1_bytes(public_key)
            .map_err(|_| Error::Crypto("invalid public key"))?;
        let signature =
            Signature::from_slice(signature).map_err(|_| Error::Crypto("invalid signature"))?;
        Ok(key.verify(message, &signature).is_ok())
    }
}
