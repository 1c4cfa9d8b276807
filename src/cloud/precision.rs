//! Float drift control.
//!
//! Coordinates and masses go through many blend/merge cycles. Rounding every
//! stored component to 15 significant decimal digits keeps values that are
//! "the same" in decimal terms bit-identical, which the exact-match lookup
//! relies on.

/// Significant decimal digits kept by [`round_to_precision`].
pub const SIGNIFICANT_DIGITS: i32 = 15;

/// Round `x` to the nearest value with [`SIGNIFICANT_DIGITS`] significant decimal digits.
///
/// Goes through the correctly rounded decimal formatter, so a value that
/// already has at most that many digits comes back bit-identical. Zero,
/// subnormal and non-finite values pass through unchanged, as does a value
/// whose rounded form would overflow.
#[inline]
pub fn round_to_precision(x: f64) -> f64 {
    if !x.is_normal() {
        return x;
    }
    let digits = (SIGNIFICANT_DIGITS - 1) as usize;
    format!("{:.*e}", digits, x)
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite())
        .unwrap_or(x)
}

/// Round every component of `point` in place.
#[inline]
pub fn round_point(point: &mut [f64]) {
    for v in point.iter_mut() {
        *v = round_to_precision(*v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::test_helpers::assert_exact;

    #[test]
    fn removes_classic_binary_noise() {
        assert_eq!(round_to_precision(0.1 + 0.2), 0.3);
        assert_eq!(round_to_precision(1.1 * 1.1), 1.21);
        assert_eq!(round_to_precision(-(0.1 + 0.2)), -0.3);
    }

    #[test]
    fn passes_through_special_values() {
        assert_eq!(round_to_precision(0.0), 0.0);
        assert!(round_to_precision(f64::NAN).is_nan());
        assert_eq!(round_to_precision(f64::INFINITY), f64::INFINITY);
        let tiny = f64::MIN_POSITIVE / 4.0;
        assert_eq!(round_to_precision(tiny), tiny);
    }

    #[test]
    fn keeps_short_values_bit_identical() {
        for x in [
            1.0,
            42.0,
            -7.0,
            123_456_789.0,
            1e20,
            1e100,
            1e200,
            2.5e250,
            -3.5e250,
            1e-200,
            -4.25e-300,
        ] {
            assert_exact(&format!("{x:e}"), x, round_to_precision(x));
        }
    }

    #[test]
    fn rounds_at_the_fifteenth_digit_at_any_magnitude() {
        assert_exact("large", 1.23456789012346e200, round_to_precision(1.234567890123456e200));
        assert_exact("small", 1.23456789012346e-200, round_to_precision(1.234567890123456e-200));
        assert_exact("max", f64::MAX, round_to_precision(f64::MAX));
    }

    #[test]
    fn stable_under_repetition() {
        let mut x = 1.0 / 3.0;
        let once = round_to_precision(x);
        for _ in 0..5 {
            x = round_to_precision(x);
        }
        assert_eq!(x, once);
    }

    #[test]
    fn rounds_each_component() {
        let mut p = [0.1 + 0.2, 2.0, 0.7 + 0.1];
        round_point(&mut p);
        assert_eq!(p, [0.3, 2.0, 0.8]);
    }
}
