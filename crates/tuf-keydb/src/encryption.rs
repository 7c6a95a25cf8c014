//! Passphrase-based wrapping of private key bytes.
//!
//! Wire format: `salt(16) || nonce(12) || ciphertext+tag`. The wrapping key is derived from the
//! passphrase and the random salt with PBKDF2-HMAC-SHA256, then used with AES-256-GCM — the same
//! `ring` primitives the teacher's crypto module already uses for signature verification.

use ring::aead::{Aad, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::error::Unspecified;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::Error;
use crate::Result;

const SALT_LEN: usize = 16;
const PBKDF2_ITERATIONS: u32 = 100_000;

struct OneShotNonce(Option<[u8; NONCE_LEN]>);

impl NonceSequence for OneShotNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, Unspecified> {
        self.0.take().map(Nonce::assume_unique_for_key).ok_or(Unspecified)
    }
}

fn derive_key(passphrase: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        std::num::NonZeroU32::new(PBKDF2_ITERATIONS).unwrap(),
        salt,
        passphrase.as_bytes(),
        &mut key,
    );
    key
}

/// Encrypt `plaintext` (a private key's raw bytes) under `passphrase`.
pub fn wrap(passphrase: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).map_err(|_| Error::Crypto("rng failure generating salt".into()))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| Error::Crypto("rng failure generating nonce".into()))?;

    let key = derive_key(passphrase, &salt);
    let unbound = UnboundKey::new(&AES_256_GCM, &key)
        .map_err(|_| Error::Crypto("failed to construct AEAD key".into()))?;
    let mut sealing = SealingKey::new(unbound, OneShotNonce(Some(nonce_bytes)));

    let mut in_out = plaintext.to_vec();
    sealing
        .seal_in_place_append_tag(Aad::empty(), &mut in_out)
        .map_err(|_| Error::Crypto("AEAD seal failed".into()))?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + in_out.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&in_out);
    Ok(out)
}

/// Decrypt bytes produced by [`wrap`]. Returns [`Error::WrongPassphrase`] on any failure, since
/// AEAD tag mismatch is the only externally observable signal of a wrong passphrase versus a
/// corrupt record.
pub fn unwrap(passphrase: &str, wrapped: &[u8], key_id_for_error: &str) -> Result<Vec<u8>> {
    if wrapped.len() < SALT_LEN + NONCE_LEN {
        return Err(Error::WrongPassphrase(key_id_for_error.to_string()));
    }
    let (salt, rest) = wrapped.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let key = derive_key(passphrase, salt);
    let unbound = UnboundKey::new(&AES_256_GCM, &key)
        .map_err(|_| Error::Crypto("failed to construct AEAD key".into()))?;
    let mut nonce_arr = [0u8; NONCE_LEN];
    nonce_arr.copy_from_slice(nonce_bytes);
    let mut opening = OpeningKey::new(unbound, OneShotNonce(Some(nonce_arr)));

    let mut in_out = ciphertext.to_vec();
    let plaintext = opening
        .open_in_place(Aad::empty(), &mut in_out)
        .map_err(|_| Error::WrongPassphrase(key_id_for_error.to_string()))?;
    Ok(plaintext.to_vec())
}
