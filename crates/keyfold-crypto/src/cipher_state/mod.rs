//! Cipher state: keyed AEAD with a per-key message counter
//!
//! This module implements the cipher-state object that sits under the
//! Keyfold handshake. It couples a secret key with a fixed-width message
//! counter and guards every invariant the surrounding protocol relies on:
//!
//! - the counter never repeats under a given key and never wraps;
//! - the all-zero key is the "unkeyed" sentinel, in which both encrypt and
//!   decrypt degrade to the identity transform (early handshake messages);
//! - the key can be ratcheted forward in place without moving the counter.
//!
//! # Architecture
//!
//! ```text
//! CipherState<S>
//!     │
//!     ▼ guards (overflow check, key check, buffer sizes)
//! AeadSuite (encrypt / decrypt / rekey)
//!     │
//!     ▼
//! ChaCha20-Poly1305 ciphertext ‖ tag
//! ```
//!
//! The AEAD itself is a capability: [`CipherState`] is generic over any
//! [`AeadSuite`] implementation. [`ChaChaPoly`] is the suite shipped with
//! this crate.

pub mod error;
pub mod memory;
pub mod state;
pub mod suite;

pub use error::CipherStateError;
pub use state::CipherState;
pub use suite::{AeadSuite, ChaChaPoly, Counts};
