//! Constant-time byte helpers for key and counter material
//!
//! Branching on secret bytes leaks their value through timing. Every test
//! in this module inspects its full input regardless of content, via
//! [`subtle`]'s `Choice` machinery.

use subtle::{Choice, ConstantTimeEq};

/// Constant-time equality between two byte slices.
///
/// Slices of different lengths compare unequal; the length itself is not
/// secret.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Constant-time test for an all-zero byte slice.
pub fn ct_is_zero(bytes: &[u8]) -> bool {
    ct_is_filled(bytes, 0x00)
}

/// Constant-time test for an all-`0xFF` byte slice.
pub fn ct_is_max(bytes: &[u8]) -> bool {
    ct_is_filled(bytes, 0xFF)
}

fn ct_is_filled(bytes: &[u8], value: u8) -> bool {
    bytes
        .iter()
        .fold(Choice::from(1), |acc, byte| acc & byte.ct_eq(&value))
        .into()
}

/// Increment a fixed-width little-endian counter in place, propagating the
/// carry across the whole width.
///
/// An all-`0xFF` counter wraps to zero; callers that must not wrap check
/// for the maximum value first.
pub fn increment_le(counter: &mut [u8]) {
    let mut carry = 1u16;
    for byte in counter.iter_mut() {
        carry += u16::from(*byte);
        *byte = carry as u8;
        carry >>= 8;
    }
}
