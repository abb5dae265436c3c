//! Property-based tests for the bit/byte sizing rule and the scratch
//! buffer growth invariant.

use fpgalink_core::{bits_to_bytes, ScratchBuffer};
use proptest::prelude::*;

proptest! {
    /// bits_to_bytes is exact ceiling division by 8 for any bit count.
    #[test]
    fn bits_to_bytes_matches_ceiling_division(bits in 0u32..=1_000_000) {
        let expected = (bits as usize + 7) / 8;
        prop_assert_eq!(bits_to_bytes(bits), expected);
    }

    /// A byte buffer sized by bits_to_bytes holds the bits with less than
    /// one byte of slack.
    #[test]
    fn sized_buffer_has_no_spare_byte(bits in 1u32..=1_000_000) {
        let bytes = bits_to_bytes(bits);
        prop_assert!(bytes as u64 * 8 >= bits as u64);
        prop_assert!((bytes as u64 - 1) * 8 < bits as u64);
    }

    /// Scratch capacity after any ensure sequence equals the high-water
    /// mark and never decreases along the way.
    #[test]
    fn scratch_capacity_is_monotone(requests in proptest::collection::vec(0usize..100_000, 1..50)) {
        let mut scratch = ScratchBuffer::new();
        let mut previous = 0;
        let mut high_water = 0;
        for request in requests {
            scratch.ensure(request);
            high_water = high_water.max(request);
            prop_assert!(scratch.capacity() >= previous);
            prop_assert_eq!(scratch.capacity(), high_water);
            previous = scratch.capacity();
        }
    }
}
