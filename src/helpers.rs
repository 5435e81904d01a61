//! Shared helpers for f64 → Decimal conversions.
//!
//! Readings arrive from the remote APIs as `f64`. Persisted values are rounded
//! to one decimal place and carried as `Decimal` so the CSV store never shows
//! float noise such as `30.300000000000001`.
//!
//! Non-finite inputs (NaN, ±Inf) become `None`: a missing value, never a
//! sentinel number.

use rust_decimal::Decimal;

/// Convert an f64 to Decimal, rounded to 1 decimal place.
pub(crate) fn f64_to_decimal_1dp(v: f64) -> Option<Decimal> {
    if !v.is_finite() {
        tracing::warn!("f64_to_decimal_1dp received non-finite value {}, treating as missing", v);
        return None;
    }
    Decimal::from_str_exact(&format!("{:.1}", v)).ok()
}

/// Convert an optional f64 to Decimal (1 decimal place).
pub(crate) fn opt_f64_to_decimal_1dp(v: Option<f64>) -> Option<Decimal> {
    v.and_then(f64_to_decimal_1dp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_f64_to_decimal_1dp_normal() {
        let d = f64_to_decimal_1dp(3.14);
        assert_eq!(d, Some(Decimal::from_str("3.1").unwrap()));
    }

    #[test]
    fn test_f64_to_decimal_1dp_rounds() {
        // 3.16 rounded to 1dp → 3.2
        let d = f64_to_decimal_1dp(3.16);
        assert_eq!(d, Some(Decimal::from_str("3.2").unwrap()));
    }

    #[test]
    fn test_f64_to_decimal_1dp_negative() {
        let d = f64_to_decimal_1dp(-17.59);
        assert_eq!(d, Some(Decimal::from_str("-17.6").unwrap()));
    }

    #[test]
    fn test_f64_to_decimal_1dp_nan() {
        assert_eq!(f64_to_decimal_1dp(f64::NAN), None);
    }

    #[test]
    fn test_f64_to_decimal_1dp_infinity() {
        assert_eq!(f64_to_decimal_1dp(f64::INFINITY), None);
        assert_eq!(f64_to_decimal_1dp(f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_opt_f64_to_decimal_1dp() {
        assert_eq!(opt_f64_to_decimal_1dp(None), None);
        assert_eq!(
            opt_f64_to_decimal_1dp(Some(3.14)),
            Some(Decimal::from_str("3.1").unwrap())
        );
    }
}
