//! Bit widths for bounded value domains.

/// Minimum number of bits able to hold every value in `min..=max`.
///
/// An empty or single-value range needs 0 bits.
pub fn precision(min: i64, max: i64) -> u32 {
    if max <= min {
        return 0;
    }
    precision_for_span(max.wrapping_sub(min) as u64)
}

/// Minimum number of bits able to hold every value in `0..=span`.
pub fn precision_for_span(span: u64) -> u32 {
    u64::BITS - span.leading_zeros()
}

/// Upper bound on the UTF-8 size of a string of `chars` UTF-16 code units.
///
/// Matches the `(n + 1) * 3` bound used for string length prefixes on the
/// wire, so it must not be tightened.
pub fn max_utf8_bytes(chars: usize) -> u64 {
    (chars as u64).saturating_add(1).saturating_mul(3)
}

/// Width of the byte-length prefix for strings of at most `max_chars` units.
pub fn string_length_bits(max_chars: usize) -> u32 {
    precision_for_span(max_utf8_bytes(max_chars))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ones_span_needs_exactly_n_bits() {
        for n in 0..=64u32 {
            let span = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
            assert_eq!(precision_for_span(span), n, "n = {n}");
        }
    }

    #[test]
    fn span_just_above_power_of_two_needs_one_more_bit() {
        for n in 1..63u32 {
            assert_eq!(precision_for_span(1u64 << n), n + 1);
        }
    }

    #[test]
    fn signed_ranges() {
        assert_eq!(precision(0, 150), 8);
        assert_eq!(precision(-1, 0), 1);
        assert_eq!(precision(-128, 127), 8);
        assert_eq!(precision(i64::MIN, i64::MAX), 64);
        assert_eq!(precision(1000, 1003), 2);
    }

    #[test]
    fn degenerate_ranges_need_no_bits() {
        assert_eq!(precision(5, 5), 0);
        assert_eq!(precision(9, 3), 0);
    }

    #[test]
    fn string_prefix_widths() {
        assert_eq!(max_utf8_bytes(16), 51);
        assert_eq!(string_length_bits(16), 6);
        assert_eq!(string_length_bits(256), 10);
        assert_eq!(string_length_bits(1024), 12);
        assert_eq!(string_length_bits(32767), 17);
        assert_eq!(string_length_bits(1), 3);
    }
}
