// Grammeme bitmask helpers.
//
// A dictionary assigns each grammeme name (noun, plural, feminine, ...) a
// dense identifier in [0, 64). The identifier is the bit position in a
// 64-bit combined mask.

/// Maximum number of distinct grammemes a single dictionary can name.
pub const MAX_GRAMMEMES: usize = 64;

/// Convert a grammeme identifier into its single-bit mask.
///
/// Returns `None` for identifiers that do not fit in a 64-bit mask.
#[inline]
pub fn bit_for_identifier(id: u32) -> Option<u64> {
    1u64.checked_shl(id)
}

/// Convert a single-bit mask back into its grammeme identifier.
///
/// Returns `None` unless exactly one bit is set.
#[inline]
pub fn identifier_for_bit(bit: u64) -> Option<u32> {
    if bit.is_power_of_two() {
        Some(bit.trailing_zeros())
    } else {
        None
    }
}

/// `true` when every bit of `subset` is also set in `superset`.
#[inline]
pub fn contains_all(superset: u64, subset: u64) -> bool {
    superset & subset == subset
}

/// `true` when the two masks share at least one bit.
#[inline]
pub fn contains_any(mask: u64, other: u64) -> bool {
    mask & other != 0
}

/// Iterate over the single-bit components of a mask, lowest bit first.
pub fn single_bits(mask: u64) -> SingleBits {
    SingleBits { remaining: mask }
}

/// Iterator returned by [`single_bits`].
#[derive(Debug, Clone)]
pub struct SingleBits {
    remaining: u64,
}

impl Iterator for SingleBits {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }
        let lowest = self.remaining & self.remaining.wrapping_neg();
        self.remaining &= self.remaining - 1;
        Some(lowest)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SingleBits {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_bit_roundtrip() {
        for id in 0..64 {
            let bit = bit_for_identifier(id).unwrap();
            assert_eq!(identifier_for_bit(bit), Some(id));
        }
    }

    #[test]
    fn identifier_out_of_range() {
        assert_eq!(bit_for_identifier(64), None);
        assert_eq!(bit_for_identifier(200), None);
    }

    #[test]
    fn identifier_for_multi_bit_mask() {
        assert_eq!(identifier_for_bit(0), None);
        assert_eq!(identifier_for_bit(0b110), None);
        assert_eq!(identifier_for_bit(1 << 63), Some(63));
    }

    #[test]
    fn containment() {
        assert!(contains_all(0b1011, 0b0011));
        assert!(!contains_all(0b1001, 0b0011));
        assert!(contains_all(0b1001, 0));
        assert!(contains_any(0b1001, 0b0011));
        assert!(!contains_any(0b1000, 0b0011));
    }

    #[test]
    fn single_bits_lowest_first() {
        let bits: Vec<u64> = single_bits(0b1010_0101).collect();
        assert_eq!(bits, vec![0b1, 0b100, 0b10_0000, 0b1000_0000]);
        assert_eq!(single_bits(0).count(), 0);
        assert_eq!(single_bits(u64::MAX).len(), 64);
    }
}
