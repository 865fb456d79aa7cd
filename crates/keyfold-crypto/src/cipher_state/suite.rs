//! AEAD suite capability and the built-in `ChaCha20-Poly1305` suite
//!
//! [`CipherState`](super::state::CipherState) never talks to a cipher
//! directly; it goes through [`AeadSuite`], which bundles the cipher's
//! length constants with detached-tag encrypt/decrypt and the one-way key
//! ratchet. Alternative ciphers plug in by implementing this trait.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use zeroize::Zeroize;

use super::error::CipherStateError;

/// Byte counts consumed and produced by one cipher-state operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    /// Bytes read from the input buffer
    pub bytes_read: usize,
    /// Bytes written to the output buffer
    pub bytes_written: usize,
}

/// An authenticated cipher parameterizing a cipher state.
///
/// Implementations provide detached-tag AEAD over fixed-size keys and
/// counter nonces, plus the in-place key ratchet used at rekey boundaries.
pub trait AeadSuite {
    /// Key bytes. The all-zero value is reserved as the "no key" sentinel
    /// and must never be produced by [`rekey`](Self::rekey).
    type Key: AsRef<[u8]> + AsMut<[u8]> + Clone + Default + Zeroize;
    /// Nonce bytes, interpreted as a fixed-width little-endian counter.
    type Nonce: AsRef<[u8]> + AsMut<[u8]> + Clone + Default;

    /// Key length in bytes
    const KEY_LEN: usize;
    /// Nonce length in bytes
    const NONCE_LEN: usize;
    /// Authentication tag length in bytes
    const TAG_LEN: usize;

    /// Encrypt `plaintext` under `key` and `nonce`, binding `ad`, writing
    /// ciphertext followed by the authentication tag into `out`.
    fn encrypt(
        out: &mut [u8],
        key: &Self::Key,
        nonce: &Self::Nonce,
        ad: &[u8],
        plaintext: &[u8],
    ) -> Result<Counts, CipherStateError>;

    /// Verify the trailing tag of `ciphertext` under `key`, `nonce` and
    /// `ad`, then write the plaintext into `out`. The tag is checked before
    /// any plaintext is released.
    fn decrypt(
        out: &mut [u8],
        key: &Self::Key,
        nonce: &Self::Nonce,
        ad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Counts, CipherStateError>;

    /// Derive a new key from `key` in place. The previous key value is
    /// unrecoverable once this returns.
    fn rekey(key: &mut Self::Key);
}

/// `ChaCha20-Poly1305` with a 64-bit counter nonce.
///
/// The 12-byte IETF nonce is four zero bytes followed by the counter in
/// little-endian order. The key ratchet encrypts 32 zero bytes at the
/// maximum counter value and keeps the first 32 bytes of output, so the
/// counter value `2^64 - 1` is reserved for rekeying and never used for a
/// message (the cipher state refuses it).
#[derive(Debug, Clone, Copy)]
pub struct ChaChaPoly;

impl ChaChaPoly {
    /// Build the 12-byte IETF nonce from the 8-byte counter.
    fn full_nonce(counter: &[u8; 8]) -> Nonce {
        let mut bytes = [0u8; 12];
        bytes[4..].copy_from_slice(counter);
        *Nonce::from_slice(&bytes)
    }
}

impl AeadSuite for ChaChaPoly {
    type Key = [u8; 32];
    type Nonce = [u8; 8];

    const KEY_LEN: usize = 32;
    const NONCE_LEN: usize = 8;
    const TAG_LEN: usize = 16;

    fn encrypt(
        out: &mut [u8],
        key: &Self::Key,
        nonce: &Self::Nonce,
        ad: &[u8],
        plaintext: &[u8],
    ) -> Result<Counts, CipherStateError> {
        let needed = plaintext.len() + Self::TAG_LEN;
        if out.len() < needed {
            return Err(CipherStateError::OutputBufferTooSmall { needed, actual: out.len() });
        }

        let cipher = ChaCha20Poly1305::new(key.into());
        let (body, rest) = out.split_at_mut(plaintext.len());
        body.copy_from_slice(plaintext);

        let Ok(tag) = cipher.encrypt_in_place_detached(&Self::full_nonce(nonce), ad, body) else {
            unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
        };
        rest[..Self::TAG_LEN].copy_from_slice(&tag);

        Ok(Counts { bytes_read: plaintext.len(), bytes_written: needed })
    }

    fn decrypt(
        out: &mut [u8],
        key: &Self::Key,
        nonce: &Self::Nonce,
        ad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Counts, CipherStateError> {
        let Some(body_len) = ciphertext.len().checked_sub(Self::TAG_LEN) else {
            return Err(CipherStateError::CiphertextTooShort {
                min: Self::TAG_LEN,
                actual: ciphertext.len(),
            });
        };
        if out.len() < body_len {
            return Err(CipherStateError::OutputBufferTooSmall {
                needed: body_len,
                actual: out.len(),
            });
        }

        let (body, tag) = ciphertext.split_at(body_len);
        let cipher = ChaCha20Poly1305::new(key.into());

        // The tag is verified over the ciphertext before the buffer is
        // decrypted, so a failed check never exposes plaintext.
        out[..body_len].copy_from_slice(body);
        cipher
            .decrypt_in_place_detached(
                &Self::full_nonce(nonce),
                ad,
                &mut out[..body_len],
                Tag::from_slice(tag),
            )
            .map_err(|_| CipherStateError::AuthenticationFailed)?;

        Ok(Counts { bytes_read: ciphertext.len(), bytes_written: body_len })
    }

    fn rekey(key: &mut Self::Key) {
        // REKEY(k): encrypt one key-length block of zeros at the reserved
        // maximum counter value and take the keystream as the new key.
        let cipher = ChaCha20Poly1305::new((&*key).into());
        let mut block = [0u8; 32];

        let Ok(_tag) = cipher.encrypt_in_place_detached(
            &Self::full_nonce(&[0xFF; 8]),
            &[],
            &mut block,
        ) else {
            unreachable!("ChaCha20-Poly1305 encryption cannot fail with valid inputs");
        };

        *key = block;
        block.zeroize();
    }
}
