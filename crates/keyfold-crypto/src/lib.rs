//! Keyfold Cryptographic Primitives
//!
//! The symmetric building block of the Keyfold secure-channel handshake.
//! A [`CipherState`] owns a cipher key and a per-key message counter and
//! exposes authenticated encryption over that pair, including a transparent
//! passthrough mode for the handshake phase before a shared key exists.
//!
//! # Key Lifecycle
//!
//! Each direction of a session holds one `CipherState`. The handshake layer
//! installs keys as shared secrets become available; every keyed message
//! advances the counter, and the key can be ratcheted in place at any point
//! the protocol defines a rekey boundary.
//!
//! ```text
//! (no key)  ── passthrough: messages pass unmodified, counter frozen
//!     │
//!     ▼ initialize_key(k)
//! CipherState { key: k, nonce: 0 }
//!     │
//!     ▼ encrypt_with_ad / decrypt_with_ad
//! ciphertext ‖ tag, nonce += 1
//!     │
//!     ▼ rekey
//! key' = REKEY(key), nonce unchanged
//! ```
//!
//! # Security
//!
//! Nonce Discipline:
//! - The counter is unique per key and only ever moves forward
//! - Operations at the maximum counter value are refused before any
//!   mutation, so a (key, nonce) pair is never reused
//! - Failed decryption leaves the counter untouched
//!
//! Key Hygiene:
//! - The all-zero key value is reserved as the "no key" sentinel
//! - Clearing or replacing a key zeroizes the old material
//! - `rekey` overwrites the key in place; the prior key is unrecoverable
//!
//! Authenticity:
//! - The AEAD tag is verified before any plaintext is released
//! - A failed tag check is a hard error; the output buffer must be
//!   discarded

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher_state;

pub use cipher_state::{
    AeadSuite, ChaChaPoly, CipherState, CipherStateError, Counts,
};
