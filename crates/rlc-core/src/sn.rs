//! 10-bit RLC AM sequence numbers.
//!
//! All ordering between SNs is relative to a window base: `x` lies before `y` when
//! `sn_diff(base, x) < sn_diff(base, y)`. Plain `<` on raw SNs is wrong across the wrap.

/// Number of distinct sequence numbers
pub const SN_MOD: u16 = 1024;

/// Largest allowed AM window
pub const MAX_WINDOW_SIZE: u16 = SN_MOD / 2;

/// Forward distance from `base` to `sn`, in `0..SN_MOD`
#[inline]
pub fn sn_diff(base: u16, sn: u16) -> u16 {
    (sn + SN_MOD - base % SN_MOD) % SN_MOD
}

/// `sn + n`, wrapped
#[inline]
pub fn sn_add(sn: u16, n: u16) -> u16 {
    (sn + n % SN_MOD) % SN_MOD
}

/// `sn - n`, wrapped
#[inline]
pub fn sn_sub(sn: u16, n: u16) -> u16 {
    (sn + SN_MOD - n % SN_MOD) % SN_MOD
}

/// True when `sn` lies in `[lo, lo + len)`
#[inline]
pub fn sn_in_range(lo: u16, len: u16, sn: u16) -> bool {
    sn_diff(lo, sn) < len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraparound_is_consecutive() {
        assert_eq!(sn_add(1023, 1), 0);
        assert_eq!(sn_diff(1023, 0), 1);
        assert_eq!(sn_sub(0, 1), 1023);
        assert_eq!(sn_diff(1020, 2), 6);
    }

    #[test]
    fn test_range_checks_across_wrap() {
        assert!(sn_in_range(1020, 8, 1023));
        assert!(sn_in_range(1020, 8, 3));
        assert!(!sn_in_range(1020, 8, 4));
        assert!(!sn_in_range(1020, 8, 1019));
        assert!(!sn_in_range(5, 0, 5));
        assert!(sn_in_range(1023, 2, 0));
    }
}
