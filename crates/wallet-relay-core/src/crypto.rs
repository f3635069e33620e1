//! Cryptographic primitives for the wallet relay.
//!
//! Wraps BIP-340 Schnorr signing over secp256k1 with strong types. Event
//! identifiers are SHA-256 digests (see [`crate::canonical`]).

use rand::RngCore;
use secp256k1::{schnorr, All, Message, Secp256k1, XOnlyPublicKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

use crate::error::CoreError;
use crate::types::decode_fixed;

/// Process-wide secp256k1 context, built on first use.
fn context() -> &'static Secp256k1<All> {
    static CONTEXT: OnceLock<Secp256k1<All>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::new)
}

/// A 32-byte x-only secp256k1 public key identifying an event author.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        decode_fixed::<32>(s).map(Self)
    }

    /// Verify a Schnorr signature over a 32-byte digest.
    pub fn verify(&self, digest: &[u8; 32], signature: &Signature) -> Result<(), CoreError> {
        let key = XOnlyPublicKey::from_slice(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig =
            schnorr::Signature::from_slice(&signature.0).map_err(|_| CoreError::InvalidSignature)?;
        let message = Message::from_digest(*digest);

        context()
            .verify_schnorr(&sig, &message, &key)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

/// A 64-byte BIP-340 Schnorr signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        decode_fixed::<64>(s).map(Self)
    }

    /// The zero signature (invalid, used as placeholder).
    pub const ZERO: Self = Self([0u8; 64]);
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 64]> for Signature {
    fn from(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

/// A keypair for signing events.
///
/// This wraps secp256k1's Keypair.
#[derive(Clone)]
pub struct Keypair {
    inner: secp256k1::Keypair,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let mut seed = [0u8; 32];
            rng.fill_bytes(&mut seed);
            if let Ok(keypair) = Self::from_seed(&seed) {
                return keypair;
            }
        }
    }

    /// Create from a 32-byte secret key.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, CoreError> {
        let inner = secp256k1::Keypair::from_seckey_slice(context(), seed)
            .map_err(|_| CoreError::InvalidSecretKey)?;
        Ok(Self { inner })
    }

    /// Get the x-only public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.inner.x_only_public_key().0.serialize())
    }

    /// Sign a 32-byte digest (deterministic, no auxiliary randomness).
    pub fn sign(&self, digest: &[u8; 32]) -> Signature {
        let message = Message::from_digest(*digest);
        let sig = context().sign_schnorr_no_aux_rand(&message, &self.inner);
        Signature(sig.serialize())
    }

    /// Get the raw secret key bytes.
    pub fn seed(&self) -> [u8; 32] {
        self.inner.secret_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.public_key())
    }
}
