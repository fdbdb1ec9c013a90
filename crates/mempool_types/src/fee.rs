//! The `fee_priority` ordering key: `(fee - min_fee) / bytes_length`, computed on unsigned
//! big integers with truncating division. Floating point must never enter this computation —
//! fees and nonces are not bounded by a machine word.

use num_bigint::BigUint;
use num_traits::Zero;

/// Computes `fee_priority = (fee - min_fee) / bytes_length`.
///
/// `fee` is expected to be at least `min_fee`; if it is not, the transaction is not a valid
/// candidate for admission and a priority of zero is returned rather than underflowing.
///
/// # Panics
///
/// Panics if `bytes_length` is zero: every transaction has a non-empty serialized form, so a zero
/// length indicates a programmer error in the injected `bytes_of` function, not a data-dependent
/// failure.
pub fn fee_priority(fee: &BigUint, min_fee: &BigUint, bytes_length: usize) -> BigUint {
    assert!(bytes_length > 0, "bytes_of(tx) must not be empty");
    let surplus = if fee >= min_fee { fee - min_fee } else { BigUint::zero() };
    surplus / BigUint::from(bytes_length)
}

#[cfg(test)]
mod tests {
    use super::fee_priority;
    use num_bigint::BigUint;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    #[test]
    fn test_fee_priority_truncates() {
        // (100 - 10) / 10 = 9, not 9.0.
        assert_eq!(fee_priority(&big(100), &big(10), 10), big(9));
    }

    #[test]
    fn test_fee_priority_truncates_toward_zero() {
        // 9 / 10 truncates to 0, not 0.9.
        assert_eq!(fee_priority(&big(109), &big(100), 10), big(0));
    }

    #[test]
    fn test_fee_priority_below_min_fee_is_zero() {
        assert_eq!(fee_priority(&big(5), &big(10), 10), big(0));
    }

    #[test]
    #[should_panic(expected = "bytes_of(tx) must not be empty")]
    fn test_fee_priority_zero_bytes_length_panics() {
        fee_priority(&big(100), &big(10), 0);
    }
}
