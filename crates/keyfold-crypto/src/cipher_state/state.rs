//! The cipher-state record and its guarded operations
//!
//! # Security Properties
//!
//! - Nonce Uniqueness: The counter advances after every keyed operation and
//!   the operation that would reuse the maximum value is refused first
//! - No Partial Mutation: Every failure path returns before the counter is
//!   touched
//! - Passthrough Isolation: Without a key both directions are the identity
//!   transform and the counter is frozen

use core::fmt;

use zeroize::Zeroize;

use super::{
    error::CipherStateError,
    memory,
    suite::{AeadSuite, Counts},
};

/// Symmetric encryption state for one direction of a secure channel.
///
/// Couples a cipher key with the per-key message counter. A state starts
/// unkeyed: the all-zero key is the reserved "no key" sentinel, and in that
/// mode [`encrypt_with_ad`](Self::encrypt_with_ad) and
/// [`decrypt_with_ad`](Self::decrypt_with_ad) copy their input verbatim so
/// early handshake messages flow through the same code path as transport
/// messages.
///
/// The record is exclusively owned by one caller context; all operations
/// take `&mut self`, so sharing a state across threads requires an external
/// lock by construction. The key field is zeroized on drop.
pub struct CipherState<S: AeadSuite> {
    key: S::Key,
    nonce: S::Nonce,
}

impl<S: AeadSuite> CipherState<S> {
    /// Total size of the state in bytes: key plus counter.
    pub const STATE_LEN: usize = S::KEY_LEN + S::NONCE_LEN;

    /// Create an unkeyed state with a zero counter.
    pub fn new() -> Self {
        Self { key: S::Key::default(), nonce: S::Nonce::default() }
    }

    /// Install or clear the key.
    ///
    /// `Some(key)` copies the key in and resets the counter to zero.
    /// `None` zeroizes only the key field: the counter keeps its position,
    /// so a key installed later at the same counter value can resume a
    /// suspended session. Callers that want a fully reset state install a
    /// key or drop the record.
    ///
    /// # Errors
    ///
    /// `InvalidKeyLength` if `key` is not exactly `KEY_LEN` bytes; the
    /// state is unchanged.
    pub fn initialize_key(&mut self, key: Option<&[u8]>) -> Result<(), CipherStateError> {
        match key {
            None => {
                self.key.zeroize();
            },
            Some(bytes) => {
                if bytes.len() != S::KEY_LEN {
                    return Err(CipherStateError::InvalidKeyLength {
                        expected: S::KEY_LEN,
                        actual: bytes.len(),
                    });
                }
                self.key.as_mut().copy_from_slice(bytes);
                self.nonce = S::Nonce::default();
            },
        }
        Ok(())
    }

    /// Whether a key is installed.
    ///
    /// Constant-time test: the answer does not leak which key byte differs
    /// from zero.
    pub fn has_key(&self) -> bool {
        !memory::ct_is_zero(self.key.as_ref())
    }

    /// Overwrite the message counter verbatim.
    ///
    /// Bypasses the normal increment discipline; the caller owns the
    /// nonce-uniqueness guarantee afterwards (session resumption, explicit
    /// replay windows).
    ///
    /// # Errors
    ///
    /// `InvalidNonceLength` if `nonce` is not exactly `NONCE_LEN` bytes;
    /// the state is unchanged.
    pub fn set_nonce(&mut self, nonce: &[u8]) -> Result<(), CipherStateError> {
        if nonce.len() != S::NONCE_LEN {
            return Err(CipherStateError::InvalidNonceLength {
                expected: S::NONCE_LEN,
                actual: nonce.len(),
            });
        }
        self.nonce.as_mut().copy_from_slice(nonce);
        Ok(())
    }

    /// Current message counter bytes (little-endian).
    pub fn nonce(&self) -> &[u8] {
        self.nonce.as_ref()
    }

    /// Encrypt `plaintext` with `ad` as associated data, writing ciphertext
    /// followed by the authentication tag into `out`, then advance the
    /// counter.
    ///
    /// Unkeyed states copy `plaintext` into `out` verbatim and do not
    /// advance the counter.
    ///
    /// # Errors
    ///
    /// - `NonceOverflow` if the counter is at its maximum; checked before
    ///   anything else, so the state is unchanged
    /// - `OutputBufferTooSmall` if `out` cannot hold
    ///   `plaintext.len() + TAG_LEN` (keyed) or `plaintext.len()` (unkeyed)
    pub fn encrypt_with_ad(
        &mut self,
        out: &mut [u8],
        ad: &[u8],
        plaintext: &[u8],
    ) -> Result<Counts, CipherStateError> {
        if memory::ct_is_max(self.nonce.as_ref()) {
            return Err(CipherStateError::NonceOverflow);
        }

        if !self.has_key() {
            return passthrough(out, plaintext);
        }

        let counts = S::encrypt(out, &self.key, &self.nonce, ad, plaintext)?;
        memory::increment_le(self.nonce.as_mut());
        Ok(counts)
    }

    /// Verify and decrypt `ciphertext` with `ad` as associated data,
    /// writing the plaintext into `out`, then advance the counter.
    ///
    /// Unkeyed states copy `ciphertext` into `out` verbatim and do not
    /// advance the counter.
    ///
    /// # Errors
    ///
    /// - `NonceOverflow` if the counter is at its maximum; state unchanged
    /// - `CiphertextTooShort` if `ciphertext` is shorter than the tag
    ///   (keyed mode)
    /// - `OutputBufferTooSmall` if `out` cannot hold the plaintext
    /// - `AuthenticationFailed` if tag verification rejects the message;
    ///   the counter is not advanced and `out` must be treated as
    ///   untrusted
    pub fn decrypt_with_ad(
        &mut self,
        out: &mut [u8],
        ad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Counts, CipherStateError> {
        if memory::ct_is_max(self.nonce.as_ref()) {
            return Err(CipherStateError::NonceOverflow);
        }

        if !self.has_key() {
            return passthrough(out, ciphertext);
        }

        let counts = S::decrypt(out, &self.key, &self.nonce, ad, ciphertext)?;
        memory::increment_le(self.nonce.as_mut());
        Ok(counts)
    }

    /// Ratchet the key forward in place.
    ///
    /// The suite derives the new key from the current one; the old value is
    /// unrecoverable once overwritten. The counter is not touched, so the
    /// next message continues the sequence under the new key.
    ///
    /// Only meaningful on a keyed state: ratcheting the all-zero sentinel
    /// would manufacture a key outside [`initialize_key`](Self::initialize_key),
    /// so callers check [`has_key`](Self::has_key) first.
    pub fn rekey(&mut self) -> Counts {
        S::rekey(&mut self.key);
        Counts { bytes_read: S::KEY_LEN, bytes_written: S::KEY_LEN }
    }
}

/// Identity transform for the unkeyed phase: copy input to output, report
/// symmetric byte counts.
fn passthrough(out: &mut [u8], input: &[u8]) -> Result<Counts, CipherStateError> {
    if out.len() < input.len() {
        return Err(CipherStateError::OutputBufferTooSmall {
            needed: input.len(),
            actual: out.len(),
        });
    }
    out[..input.len()].copy_from_slice(input);
    Ok(Counts { bytes_read: input.len(), bytes_written: input.len() })
}

impl<S: AeadSuite> Default for CipherState<S> {
    fn default() -> Self {
        Self::new()
    }
}

// Key material never appears in debug output
impl<S: AeadSuite> fmt::Debug for CipherState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherState")
            .field("has_key", &self.has_key())
            .field("nonce", &self.nonce.as_ref())
            .field("key", &"[redacted]")
            .finish()
    }
}

impl<S: AeadSuite> Drop for CipherState<S> {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::super::suite::ChaChaPoly;
    use super::*;

    const TAG_LEN: usize = ChaChaPoly::TAG_LEN;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = 0xA0 ^ i as u8;
        }
        key
    }

    fn keyed_state() -> CipherState<ChaChaPoly> {
        let mut state = CipherState::new();
        state.initialize_key(Some(&test_key())).unwrap();
        state
    }

    #[test]
    fn state_len_covers_key_and_nonce() {
        assert_eq!(CipherState::<ChaChaPoly>::STATE_LEN, 40);
    }

    #[test]
    fn fresh_state_is_unkeyed() {
        let state = CipherState::<ChaChaPoly>::new();
        assert!(!state.has_key());
        assert_eq!(state.nonce(), [0u8; 8]);
    }

    #[test]
    fn initialize_key_installs_key_and_resets_nonce() {
        let mut state = keyed_state();
        state.set_nonce(&5u64.to_le_bytes()).unwrap();

        state.initialize_key(Some(&test_key())).unwrap();
        assert!(state.has_key());
        assert_eq!(state.nonce(), [0u8; 8], "installing a key must reset the counter");
    }

    #[test]
    fn initialize_key_rejects_wrong_length() {
        let mut state = CipherState::<ChaChaPoly>::new();
        let result = state.initialize_key(Some(&[1u8; 16]));
        assert_eq!(result, Err(CipherStateError::InvalidKeyLength { expected: 32, actual: 16 }));
        assert!(!state.has_key(), "failed install must not change the state");
    }

    #[test]
    fn clearing_key_leaves_nonce_untouched() {
        let mut state = keyed_state();
        state.set_nonce(&7u64.to_le_bytes()).unwrap();

        state.initialize_key(None).unwrap();
        assert!(!state.has_key());
        assert_eq!(state.nonce(), 7u64.to_le_bytes(), "key clear must not move the counter");
    }

    #[test]
    fn set_nonce_rejects_wrong_length() {
        let mut state = keyed_state();
        let result = state.set_nonce(&[0u8; 12]);
        assert_eq!(result, Err(CipherStateError::InvalidNonceLength { expected: 8, actual: 12 }));
        assert_eq!(state.nonce(), [0u8; 8]);
    }

    #[test]
    fn unkeyed_encrypt_is_passthrough() {
        let mut state = CipherState::<ChaChaPoly>::new();
        let mut out = [0u8; 5];

        let counts = state.encrypt_with_ad(&mut out, b"any ad", b"hello").unwrap();
        assert_eq!(&out, b"hello");
        assert_eq!(counts, Counts { bytes_read: 5, bytes_written: 5 });
        assert_eq!(state.nonce(), [0u8; 8], "passthrough must not advance the counter");
    }

    #[test]
    fn unkeyed_decrypt_is_passthrough() {
        let mut state = CipherState::<ChaChaPoly>::new();
        let mut out = [0u8; 5];

        let counts = state.decrypt_with_ad(&mut out, b"", b"hello").unwrap();
        assert_eq!(&out, b"hello");
        assert_eq!(counts, Counts { bytes_read: 5, bytes_written: 5 });
        assert_eq!(state.nonce(), [0u8; 8]);
    }

    #[test]
    fn passthrough_rejects_short_output() {
        let mut state = CipherState::<ChaChaPoly>::new();
        let mut out = [0u8; 3];

        let result = state.encrypt_with_ad(&mut out, b"", b"hello");
        assert_eq!(result, Err(CipherStateError::OutputBufferTooSmall { needed: 5, actual: 3 }));
    }

    #[test]
    fn keyed_roundtrip_advances_both_counters() {
        let mut sender = keyed_state();
        let mut receiver = keyed_state();

        let mut ciphertext = vec![0u8; 2 + TAG_LEN];
        let counts = sender.encrypt_with_ad(&mut ciphertext, b"ctx", b"hi").unwrap();
        assert_eq!(counts, Counts { bytes_read: 2, bytes_written: 2 + TAG_LEN });
        assert_eq!(sender.nonce(), 1u64.to_le_bytes());

        let mut plaintext = vec![0u8; 2];
        let counts = receiver.decrypt_with_ad(&mut plaintext, b"ctx", &ciphertext).unwrap();
        assert_eq!(counts, Counts { bytes_read: 2 + TAG_LEN, bytes_written: 2 });
        assert_eq!(plaintext, b"hi");
        assert_eq!(receiver.nonce(), 1u64.to_le_bytes());
    }

    #[test]
    fn keyed_ciphertext_differs_from_plaintext() {
        let mut state = keyed_state();
        let mut ciphertext = vec![0u8; 5 + TAG_LEN];
        state.encrypt_with_ad(&mut ciphertext, b"", b"hello").unwrap();
        assert_ne!(&ciphertext[..5], b"hello");
    }

    #[test]
    fn tampered_ciphertext_fails_and_freezes_nonce() {
        let mut sender = keyed_state();
        let mut receiver = keyed_state();

        let mut ciphertext = vec![0u8; 4 + TAG_LEN];
        sender.encrypt_with_ad(&mut ciphertext, b"", b"data").unwrap();
        ciphertext[0] ^= 0x01;

        let mut out = vec![0u8; 4];
        let result = receiver.decrypt_with_ad(&mut out, b"", &ciphertext);
        assert_eq!(result, Err(CipherStateError::AuthenticationFailed));
        assert_eq!(receiver.nonce(), [0u8; 8], "failed decryption must not advance the counter");
    }

    #[test]
    fn tampered_ad_fails_decryption() {
        let mut sender = keyed_state();
        let mut receiver = keyed_state();

        let mut ciphertext = vec![0u8; 4 + TAG_LEN];
        sender.encrypt_with_ad(&mut ciphertext, b"good", b"data").unwrap();

        let mut out = vec![0u8; 4];
        let result = receiver.decrypt_with_ad(&mut out, b"evil", &ciphertext);
        assert_eq!(result, Err(CipherStateError::AuthenticationFailed));
    }

    #[test]
    fn nonce_counts_successful_operations() {
        let mut state = keyed_state();
        let mut ciphertext = vec![0u8; 3 + TAG_LEN];

        for _ in 0..5 {
            state.encrypt_with_ad(&mut ciphertext, b"", b"msg").unwrap();
        }
        assert_eq!(state.nonce(), 5u64.to_le_bytes());
    }

    #[test]
    fn encrypt_refused_at_maximum_nonce() {
        let mut state = keyed_state();
        state.set_nonce(&[0xFF; 8]).unwrap();

        let mut out = vec![0u8; 3 + TAG_LEN];
        let result = state.encrypt_with_ad(&mut out, b"", b"msg");
        assert_eq!(result, Err(CipherStateError::NonceOverflow));
        assert_eq!(state.nonce(), [0xFF; 8], "refused operation must leave the counter alone");
    }

    #[test]
    fn decrypt_refused_at_maximum_nonce() {
        let mut state = keyed_state();
        state.set_nonce(&[0xFF; 8]).unwrap();

        let mut out = vec![0u8; 16];
        let result = state.decrypt_with_ad(&mut out, b"", &[0u8; 16 + TAG_LEN]);
        assert_eq!(result, Err(CipherStateError::NonceOverflow));
    }

    #[test]
    fn overflow_guard_applies_to_passthrough_too() {
        // Matches the operation ordering: the overflow check runs before
        // the key check, so even an unkeyed state refuses at the maximum.
        let mut state = CipherState::<ChaChaPoly>::new();
        state.set_nonce(&[0xFF; 8]).unwrap();

        let mut out = [0u8; 5];
        let result = state.encrypt_with_ad(&mut out, b"", b"hello");
        assert_eq!(result, Err(CipherStateError::NonceOverflow));
    }

    #[test]
    fn one_below_maximum_still_encrypts() {
        let mut state = keyed_state();
        let mut nonce = [0xFF; 8];
        nonce[0] = 0xFE;
        state.set_nonce(&nonce).unwrap();

        let mut out = vec![0u8; 3 + TAG_LEN];
        state.encrypt_with_ad(&mut out, b"", b"msg").unwrap();
        assert_eq!(state.nonce(), [0xFF; 8]);

        // The next operation hits the guard
        let result = state.encrypt_with_ad(&mut out, b"", b"msg");
        assert_eq!(result, Err(CipherStateError::NonceOverflow));
    }

    #[test]
    fn rekey_changes_key_and_keeps_nonce() {
        let mut state = keyed_state();
        let mut before = vec![0u8; 3 + TAG_LEN];
        state.encrypt_with_ad(&mut before, b"", b"msg").unwrap();
        let nonce_before = state.nonce().to_vec();

        let counts = state.rekey();
        assert_eq!(counts, Counts { bytes_read: 32, bytes_written: 32 });
        assert_eq!(state.nonce(), nonce_before.as_slice(), "rekey must not move the counter");

        // Same nonce, new key: ciphertext for the same message changes
        let mut state2 = keyed_state();
        state2.set_nonce(&nonce_before).unwrap();
        let mut after = vec![0u8; 3 + TAG_LEN];
        state.set_nonce(&nonce_before).unwrap();
        state.encrypt_with_ad(&mut after, b"", b"msg").unwrap();
        let mut unratcheted = vec![0u8; 3 + TAG_LEN];
        state2.encrypt_with_ad(&mut unratcheted, b"", b"msg").unwrap();
        assert_ne!(after, unratcheted, "ratcheted key must produce different ciphertext");
    }

    #[test]
    fn rekeyed_peers_still_interoperate() {
        let mut sender = keyed_state();
        let mut receiver = keyed_state();

        sender.rekey();
        receiver.rekey();

        let mut ciphertext = vec![0u8; 6 + TAG_LEN];
        sender.encrypt_with_ad(&mut ciphertext, b"ad", b"onward").unwrap();

        let mut plaintext = vec![0u8; 6];
        receiver.decrypt_with_ad(&mut plaintext, b"ad", &ciphertext).unwrap();
        assert_eq!(plaintext, b"onward");
    }

    #[test]
    fn debug_output_redacts_key() {
        let state = keyed_state();
        let rendered = format!("{state:?}");
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains("160"), "no key byte may leak into debug output");
    }

    // The end-to-end walkthrough: unkeyed passthrough, key install,
    // transport message, peer decryption, rekey.
    #[test]
    fn handshake_walkthrough() {
        let mut state = CipherState::<ChaChaPoly>::new();
        state.initialize_key(None).unwrap();
        assert!(!state.has_key());

        let mut early = [0u8; 5];
        state.encrypt_with_ad(&mut early, b"", b"hello").unwrap();
        assert_eq!(&early, b"hello");
        assert_eq!(state.nonce(), [0u8; 8]);

        let key = test_key();
        state.initialize_key(Some(&key)).unwrap();
        assert!(state.has_key());
        assert_eq!(state.nonce(), [0u8; 8]);

        let mut ciphertext = vec![0u8; 2 + TAG_LEN];
        state.encrypt_with_ad(&mut ciphertext, b"ctx", b"hi").unwrap();
        assert_eq!(ciphertext.len(), 2 + TAG_LEN);
        assert_eq!(state.nonce(), 1u64.to_le_bytes());

        let mut peer = CipherState::<ChaChaPoly>::new();
        peer.initialize_key(Some(&key)).unwrap();
        let mut out = vec![0u8; 2];
        peer.decrypt_with_ad(&mut out, b"ctx", &ciphertext).unwrap();
        assert_eq!(out, b"hi");
        assert_eq!(peer.nonce(), 1u64.to_le_bytes());

        state.rekey();
        assert_eq!(state.nonce(), 1u64.to_le_bytes());
    }
}
