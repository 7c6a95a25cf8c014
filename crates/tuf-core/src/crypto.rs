//! Cryptographic primitives: hashing, key representations, and signing.
//!
//! The server-managed roles (snapshot, timestamp) and the keys an uploading client signs with
//! may use any of the three algorithms in the data model (§3 `Key`): ed25519, ecdsa (P-256), or
//! rsa (PKCS#1v1.5, 2048-8192 bit). A `KeyId` is always the base64url-encoded SHA-256 fingerprint
//! of the key's canonical public-key bytes, independent of algorithm.

use data_encoding::{BASE64URL_NOPAD, HEXLOWER};
use ring::digest::{self, SHA256, SHA512};
use ring::rand::SystemRandom;
use ring::signature::{
    self, Ed25519KeyPair, EcdsaKeyPair, KeyPair, RsaKeyPair, UnparsedPublicKey, ECDSA_P256_SHA256_ASN1,
    ECDSA_P256_SHA256_ASN1_SIGNING, ED25519, RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_SHA256,
};
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::io::Read;

use crate::error::Error;
use crate::Result;

/// Hash algorithms supported for metadata and target descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256.
    #[serde(rename = "sha256")]
    Sha256,
    /// SHA-512.
    #[serde(rename = "sha512")]
    Sha512,
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => f.write_str("sha256"),
            HashAlgorithm::Sha512 => f.write_str("sha512"),
        }
    }
}

impl std::str::FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            other => Err(Error::Encoding(format!("unknown hash algorithm: {}", other))),
        }
    }
}

/// A calculated hash value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HashValue(Vec<u8>);

impl HashValue {
    /// Wrap the given bytes as a `HashValue`.
    pub fn new(bytes: Vec<u8>) -> Self {
        HashValue(bytes)
    }

    /// The raw bytes of this hash value.
    pub fn value(&self) -> &[u8] {
        &self.0
    }

    /// The lowercase hex encoding of this hash value, as used in checksum-addressed reads
    /// (spec §4.A `GetChecksum`, §6 `{checksum}` URL path segment).
    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }

    /// Parse a lowercase (or uppercase) hex digest into a `HashValue`.
    pub fn from_hex(s: &str) -> Result<Self> {
        HEXLOWER
            .decode(s.to_lowercase().as_bytes())
            .map(HashValue)
            .map_err(|e| Error::Encoding(format!("hex: {:?}", e)))
    }
}

/// Calculate the size and a set of hashes for the given reader in one pass.
pub fn calculate_hashes<R: Read>(
    mut reader: R,
    hash_algs: &[HashAlgorithm],
) -> Result<(u64, HashMap<HashAlgorithm, HashValue>)> {
    if hash_algs.is_empty() {
        return Err(Error::NoSupportedHashAlgorithm);
    }

    let mut sha256_ctx = if hash_algs.contains(&HashAlgorithm::Sha256) {
        Some(digest::Context::new(&SHA256))
    } else {
        None
    };
    let mut sha512_ctx = if hash_algs.contains(&HashAlgorithm::Sha512) {
        Some(digest::Context::new(&SHA512))
    } else {
        None
    };

    let mut size = 0u64;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).map_err(Error::from)?;
        if n == 0 {
            break;
        }
        size += n as u64;
        if let Some(ctx) = sha256_ctx.as_mut() {
            ctx.update(&buf[..n]);
        }
        if let Some(ctx) = sha512_ctx.as_mut() {
            ctx.update(&buf[..n]);
        }
    }

    let mut out = HashMap::new();
    if let Some(ctx) = sha256_ctx {
        out.insert(HashAlgorithm::Sha256, HashValue::new(ctx.finish().as_ref().to_vec()));
    }
    if let Some(ctx) = sha512_ctx {
        out.insert(HashAlgorithm::Sha512, HashValue::new(ctx.finish().as_ref().to_vec()));
    }

    Ok((size, out))
}

/// Convenience wrapper around [`calculate_hashes`] for a full sha256, used when checking a
/// stored metadata blob against `ChangeRecord`/`GetChecksum` checksums (spec §3, §4.A).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = digest::digest(&SHA256, bytes);
    HEXLOWER.encode(digest.as_ref())
}

/// The signature scheme used by a key, corresponding to the data model's `algorithm` field
/// (spec §3 `Key`: `algorithm ∈ {ed25519, ecdsa, rsa}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// ed25519.
    #[serde(rename = "ed25519")]
    Ed25519,
    /// ECDSA over the P-256 curve with SHA-256.
    #[serde(rename = "ecdsa")]
    Ecdsa,
    /// RSA PKCS#1v1.5 with SHA-256, 2048-8192 bit moduli.
    #[serde(rename = "rsa")]
    Rsa,
}

impl Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignatureScheme::Ed25519 => f.write_str("ed25519"),
            SignatureScheme::Ecdsa => f.write_str("ecdsa"),
            SignatureScheme::Rsa => f.write_str("rsa"),
        }
    }
}

impl std::str::FromStr for SignatureScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ed25519" => Ok(SignatureScheme::Ed25519),
            "ecdsa" => Ok(SignatureScheme::Ecdsa),
            "rsa" => Ok(SignatureScheme::Rsa),
            other => Err(Error::UnknownKeyType(other.to_string())),
        }
    }
}

/// The fingerprint of a public key: base64url (no padding) of its SHA-256 digest. Every key in
/// the system, public or private, is addressed by this id (spec §3 `Key`: "key-id is the
/// canonical fingerprint of the public key").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(String);

impl KeyId {
    fn from_public_bytes(bytes: &[u8]) -> Self {
        let digest = digest::digest(&SHA256, bytes);
        KeyId(BASE64URL_NOPAD.encode(digest.as_ref()))
    }

    /// Reconstruct a `KeyId` from a string previously obtained from [`KeyId::value`] (e.g. a
    /// key-id column read back from a store). Does not re-derive or validate the fingerprint.
    pub fn from_string(s: impl Into<String>) -> Self {
        KeyId(s.into())
    }

    /// The string value of this key id.
    pub fn value(&self) -> &str {
        &self.0
    }
}

impl Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A public key and the scheme used to verify signatures made with its private half.
#[derive(Clone, Serialize, Deserialize)]
pub struct PublicKey {
    scheme: SignatureScheme,
    #[serde(with = "base64_bytes")]
    value: Vec<u8>,
    #[serde(skip)]
    key_id: KeyId,
}

impl PublicKey {
    /// Construct a `PublicKey` from its scheme and raw (SPKI-less, scheme-native) public bytes.
    pub fn new(scheme: SignatureScheme, value: Vec<u8>) -> Self {
        let key_id = KeyId::from_public_bytes(&value);
        PublicKey { scheme, value, key_id }
    }

    /// This key's fingerprint.
    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// The signature scheme this key is used with.
    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// The raw public key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    /// Verify a signature made over `msg` against this key.
    pub fn verify(&self, msg: &[u8], sig: &Signature) -> Result<()> {
        if sig.key_id() != &self.key_id {
            return Err(Error::VerificationFailure(
                "signature key id did not match public key id".into(),
            ));
        }

        let alg: &dyn signature::VerificationAlgorithm = match self.scheme {
            SignatureScheme::Ed25519 => &ED25519,
            SignatureScheme::Ecdsa => &ECDSA_P256_SHA256_ASN1,
            SignatureScheme::Rsa => &RSA_PKCS1_2048_8192_SHA256,
        };

        UnparsedPublicKey::new(alg, &self.value)
            .verify(msg, sig.value())
            .map_err(|_| Error::BadSignature)
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("scheme", &self.scheme)
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key_id == other.key_id
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key_id.hash(state)
    }
}

/// The private half of a keypair. Used only inside `tuf-keydb`/`tuf-signer`; never serialized in
/// cleartext (spec §3 invariant: "the cleartext private key is never persisted").
pub enum PrivateKey {
    /// ed25519 keypair.
    Ed25519(Ed25519KeyPair, PublicKey),
    /// ECDSA P-256 keypair. `ring` requires separate signing/verifying representations.
    Ecdsa(EcdsaKeyPair, PublicKey),
    /// RSA keypair.
    Rsa(RsaKeyPair, PublicKey),
}

impl PrivateKey {
    /// Generate a new keypair for the given scheme.
    ///
    /// Returns the keypair together with its PKCS#8 DER encoding: `ring`'s key types are opaque
    /// signing handles once constructed, so callers that need to persist the generated key (the
    /// signer's key store does, immediately, under an encryption wrapper) must capture the
    /// PKCS#8 bytes at generation time rather than re-derive them later.
    pub fn generate(scheme: SignatureScheme) -> Result<(Self, Vec<u8>)> {
        let rng = SystemRandom::new();
        match scheme {
            SignatureScheme::Ed25519 => {
                let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
                    .map_err(|e| Error::Opaque(format!("key generation: {:?}", e)))?;
                let keypair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
                    .map_err(|e| Error::Opaque(format!("key generation: {:?}", e)))?;
                let public = PublicKey::new(scheme, keypair.public_key().as_ref().to_vec());
                Ok((PrivateKey::Ed25519(keypair, public), pkcs8.as_ref().to_vec()))
            }
            SignatureScheme::Ecdsa => {
                let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
                    .map_err(|e| Error::Opaque(format!("key generation: {:?}", e)))?;
                let keypair =
                    EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                        .map_err(|e| Error::Opaque(format!("key generation: {:?}", e)))?;
                let public = PublicKey::new(scheme, keypair.public_key().as_ref().to_vec());
                Ok((PrivateKey::Ecdsa(keypair, public), pkcs8.as_ref().to_vec()))
            }
            SignatureScheme::Rsa => Err(Error::Programming(
                "RSA key generation is not supported; RSA keys must be imported via from_pkcs8"
                    .into(),
            )),
        }
    }

    /// Parse a PKCS#8-encoded private key.
    pub fn from_pkcs8(der: &[u8], scheme: SignatureScheme) -> Result<Self> {
        let rng = SystemRandom::new();
        match scheme {
            SignatureScheme::Ed25519 => {
                let keypair = Ed25519KeyPair::from_pkcs8(der)
                    .map_err(|e| Error::Encoding(format!("pkcs8: {:?}", e)))?;
                let public = PublicKey::new(scheme, keypair.public_key().as_ref().to_vec());
                Ok(PrivateKey::Ed25519(keypair, public))
            }
            SignatureScheme::Ecdsa => {
                let keypair =
                    EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, der, &rng)
                        .map_err(|e| Error::Encoding(format!("pkcs8: {:?}", e)))?;
                let public = PublicKey::new(scheme, keypair.public_key().as_ref().to_vec());
                Ok(PrivateKey::Ecdsa(keypair, public))
            }
            SignatureScheme::Rsa => {
                let keypair = RsaKeyPair::from_pkcs8(der)
                    .map_err(|e| Error::Encoding(format!("pkcs8: {:?}", e)))?;
                let public = PublicKey::new(scheme, keypair.public_key().as_ref().to_vec());
                Ok(PrivateKey::Rsa(keypair, public))
            }
        }
    }

    /// An immutable reference to this key's public half.
    pub fn public(&self) -> &PublicKey {
        match self {
            PrivateKey::Ed25519(_, p) => p,
            PrivateKey::Ecdsa(_, p) => p,
            PrivateKey::Rsa(_, p) => p,
        }
    }

    /// This key's fingerprint, convenience for `self.public().key_id()`.
    pub fn key_id(&self) -> &KeyId {
        self.public().key_id()
    }

    /// Sign `msg`, returning a `Signature` tagged with this key's id and scheme.
    pub fn sign(&self, msg: &[u8]) -> Result<Signature> {
        let value = match self {
            PrivateKey::Ed25519(keypair, _) => keypair.sign(msg).as_ref().to_vec(),
            PrivateKey::Ecdsa(keypair, _) => {
                let rng = SystemRandom::new();
                keypair
                    .sign(&rng, msg)
                    .map_err(|e| Error::Opaque(format!("signing: {:?}", e)))?
                    .as_ref()
                    .to_vec()
            }
            PrivateKey::Rsa(keypair, _) => {
                let rng = SystemRandom::new();
                let mut sig = vec![0u8; keypair.public().modulus_len()];
                keypair
                    .sign(&RSA_PKCS1_SHA256, &rng, msg, &mut sig)
                    .map_err(|e| Error::Opaque(format!("signing: {:?}", e)))?;
                sig
            }
        };

        Ok(Signature {
            key_id: self.key_id().clone(),
            scheme: self.public().scheme(),
            value,
        })
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("key_id", &self.key_id())
            .finish()
    }
}

/// A single signature over canonicalized metadata bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    key_id: KeyId,
    #[serde(rename = "method")]
    scheme: SignatureScheme,
    #[serde(rename = "sig", with = "hex_bytes")]
    value: Vec<u8>,
}

impl Signature {
    /// Reconstruct a `Signature` from its parts, as received over a wire protocol that transmits
    /// key-id/method/bytes separately rather than as this struct's serialized form (e.g.
    /// `tuf-signer`'s `Sign` RPC response).
    pub fn from_parts(key_id: KeyId, scheme: SignatureScheme, value: Vec<u8>) -> Self {
        Signature { key_id, scheme, value }
    }

    /// The id of the key that produced this signature.
    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    /// The scheme used to produce this signature.
    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// The raw signature bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }
}

mod base64_bytes {
    use data_encoding::BASE64URL_NOPAD;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64URL_NOPAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        BASE64URL_NOPAD
            .decode(s.as_bytes())
            .map_err(|e| D::Error::custom(format!("{:?}", e)))
    }
}

mod hex_bytes {
    use data_encoding::HEXLOWER_PERMISSIVE;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&HEXLOWER_PERMISSIVE.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        HEXLOWER_PERMISSIVE
            .decode(s.as_bytes())
            .map_err(|e| D::Error::custom(format!("{:?}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_ed25519() {
        let key = PrivateKey::generate(SignatureScheme::Ed25519).unwrap();
        let sig = key.sign(b"hello world").unwrap();
        assert!(key.public().verify(b"hello world", &sig).is_ok());
        assert!(key.public().verify(b"goodbye world", &sig).is_err());
    }

    #[test]
    fn sign_and_verify_ecdsa() {
        let key = PrivateKey::generate(SignatureScheme::Ecdsa).unwrap();
        let sig = key.sign(b"hello world").unwrap();
        assert!(key.public().verify(b"hello world", &sig).is_ok());
    }

    #[test]
    fn different_keys_have_different_ids() {
        let a = PrivateKey::generate(SignatureScheme::Ed25519).unwrap();
        let b = PrivateKey::generate(SignatureScheme::Ed25519).unwrap();
        assert_ne!(a.key_id(), b.key_id());
    }

    #[test]
    fn hashes_cover_requested_algorithms_only() {
        let (size, hashes) =
            calculate_hashes(&b"it was a pleasure to burn"[..], &[HashAlgorithm::Sha256]).unwrap();
        assert_eq!(size, 25);
        assert!(hashes.contains_key(&HashAlgorithm::Sha256));
        assert!(!hashes.contains_key(&HashAlgorithm::Sha512));
    }
}
