//! Fuzz target for the cipher state
//!
//! Drives a paired sender/receiver through arbitrary operation sequences.
//!
//! # Strategy
//!
//! - Arbitrary keys, including the all-zero sentinel (passthrough mode)
//! - Random interleavings of encrypt, rekey, key clear, and nonce jumps
//! - Corrupted ciphertexts fed to the receiver
//! - Boundary nonce positions (near and at the maximum)
//!
//! # Invariants
//!
//! - No operation panics
//! - decrypt(encrypt(m)) == m whenever both sides hold the same key and
//!   nonce
//! - Sender and receiver counters stay in lockstep across round trips
//! - Corrupted ciphertext never decrypts successfully in keyed mode
//! - A refused operation (overflow, auth failure) leaves the counter put

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use keyfold_crypto::{AeadSuite, ChaChaPoly, CipherState, CipherStateError};

const TAG_LEN: usize = ChaChaPoly::TAG_LEN;

#[derive(Debug, Arbitrary)]
struct CipherScenario {
    /// Initial key; all-zero selects passthrough mode
    key: [u8; 32],
    /// Operations to perform in order
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    /// Encrypt on the sender, decrypt on the receiver, compare
    RoundTrip { ad: Vec<u8>, message: Vec<u8> },
    /// Encrypt, corrupt one byte, expect the receiver to reject
    Corrupted { message: Vec<u8>, flip: u8 },
    /// Ratchet both keys forward
    Rekey,
    /// Jump both counters to the same position
    SetNonce { position: u64 },
    /// Move both counters next to the overflow boundary
    NearOverflow,
    /// Clear the key on both sides (back to passthrough)
    ClearKey,
    /// Install a fresh key on both sides
    NewKey { key: [u8; 32] },
}

fuzz_target!(|scenario: CipherScenario| {
    let mut sender = CipherState::<ChaChaPoly>::new();
    let mut receiver = CipherState::<ChaChaPoly>::new();
    sender.initialize_key(Some(&scenario.key)).unwrap();
    receiver.initialize_key(Some(&scenario.key)).unwrap();

    for op in scenario.operations {
        match op {
            Operation::RoundTrip { ad, message } => {
                let mut ciphertext = vec![0u8; message.len() + TAG_LEN];
                let nonce_before = sender.nonce().to_vec();

                match sender.encrypt_with_ad(&mut ciphertext, &ad, &message) {
                    Ok(counts) => {
                        // counts.bytes_written excludes the tag in passthrough mode
                        let mut out = vec![0u8; message.len()];
                        let decrypted = receiver
                            .decrypt_with_ad(&mut out, &ad, &ciphertext[..counts.bytes_written])
                            .unwrap();
                        assert_eq!(decrypted.bytes_written, message.len());
                        assert_eq!(out, message);
                        assert_eq!(sender.nonce(), receiver.nonce());
                    }
                    Err(CipherStateError::NonceOverflow) => {
                        // Refusal must not move the counter
                        assert_eq!(sender.nonce(), nonce_before.as_slice());
                    }
                    Err(err) => panic!("unexpected encrypt error: {err}"),
                }
            }
            Operation::Corrupted { message, flip } => {
                if !sender.has_key() {
                    continue;
                }
                let mut ciphertext = vec![0u8; message.len() + TAG_LEN];
                if sender.encrypt_with_ad(&mut ciphertext, b"", &message).is_err() {
                    continue;
                }

                let index = flip as usize % ciphertext.len();
                ciphertext[index] ^= 0x80;

                let nonce_before = receiver.nonce().to_vec();
                let mut out = vec![0u8; message.len()];
                let result = receiver.decrypt_with_ad(&mut out, b"", &ciphertext);
                assert_eq!(result, Err(CipherStateError::AuthenticationFailed));
                assert_eq!(receiver.nonce(), nonce_before.as_slice());

                // Re-sync the sender so later round trips line up
                sender.set_nonce(&nonce_before).unwrap();
            }
            Operation::Rekey => {
                if !sender.has_key() {
                    continue;
                }
                sender.rekey();
                receiver.rekey();
            }
            Operation::SetNonce { position } => {
                let bytes = position.to_le_bytes();
                sender.set_nonce(&bytes).unwrap();
                receiver.set_nonce(&bytes).unwrap();
            }
            Operation::NearOverflow => {
                let mut bytes = [0xFF; 8];
                bytes[0] = 0xFE;
                sender.set_nonce(&bytes).unwrap();
                receiver.set_nonce(&bytes).unwrap();
            }
            Operation::ClearKey => {
                sender.initialize_key(None).unwrap();
                receiver.initialize_key(None).unwrap();
                assert!(!sender.has_key());
            }
            Operation::NewKey { key } => {
                sender.initialize_key(Some(&key)).unwrap();
                receiver.initialize_key(Some(&key)).unwrap();
                assert_eq!(sender.nonce(), 0u64.to_le_bytes());
            }
        }
    }
});
