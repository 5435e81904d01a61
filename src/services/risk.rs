//! Risk derivation: wet-bulb temperature and the composite risk tier.
//!
//! Everything here is pure and total. Missing or undefined inputs produce a
//! missing value or `RiskTier::Unknown`, never an error.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::helpers::f64_to_decimal_1dp;
use crate::services::open_meteo::RawReading;

/// US AQI above this is "unhealthy for sensitive groups".
pub const AQI_WARNING: u32 = 100;
/// US AQI above this is "unhealthy".
pub const AQI_DANGER: u32 = 150;
/// Wet-bulb (°C) early-warning band starts above this.
pub const WET_BULB_WARNING_C: Decimal = Decimal::from_parts(30, 0, 0, false, 0);
/// Wet-bulb (°C) above this is dangerous; ~35 °C is the survivability limit.
pub const WET_BULB_DANGER_C: Decimal = Decimal::from_parts(32, 0, 0, false, 0);

/// Discrete risk classification of one reading, ordered by severity.
/// `Unknown` sorts lowest: it only occurs when there is nothing to classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Unknown,
    Safe,
    Warning,
    Danger,
}

/// Classification thresholds. Fixed at the published breakpoints; held as a
/// value so components receive them at construction instead of reading globals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub aqi_warning: u32,
    pub aqi_danger: u32,
    pub wet_bulb_warning_c: Decimal,
    pub wet_bulb_danger_c: Decimal,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            aqi_warning: AQI_WARNING,
            aqi_danger: AQI_DANGER,
            wet_bulb_warning_c: WET_BULB_WARNING_C,
            wet_bulb_danger_c: WET_BULB_DANGER_C,
        }
    }
}

/// A raw reading plus the derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedReading {
    pub raw: RawReading,
    pub wet_bulb_c: Option<Decimal>,
    pub risk_tier: RiskTier,
}

/// Wet-bulb temperature (°C) from Stull's 2011 empirical fit.
///
/// Validated for roughly -20 °C ≤ T ≤ 50 °C and 5% ≤ RH ≤ 99%; outside that
/// band the value is still computed but is not a physical estimate. It also
/// overshoots the dry-bulb temperature for very cold, dry air (below about
/// -15 °C at low humidity). Rounded to one decimal place; `None` if the
/// expression is undefined.
pub fn calculate_wet_bulb(temperature_c: f64, humidity_pct: f64) -> Option<Decimal> {
    let t = temperature_c;
    let rh = humidity_pct;

    let sqrt_arg = rh + 8.313659;
    if sqrt_arg < 0.0 || rh < 0.0 {
        return None;
    }

    let tw = t * (0.151977 * sqrt_arg.sqrt()).atan() + (t + rh).atan() - (rh - 1.676331).atan()
        + 0.00391838 * rh.powf(1.5) * (0.023101 * rh).atan()
        - 4.686035;

    f64_to_decimal_1dp(tw)
}

/// Classify by AQI and wet-bulb; the most severe matching condition wins.
///
/// | condition                              | tier    |
/// |----------------------------------------|---------|
/// | both inputs missing                    | UNKNOWN |
/// | AQI > 150 or wet-bulb > 32 °C          | DANGER  |
/// | AQI > 100 or wet-bulb > 30 °C          | WARNING |
/// | otherwise                              | SAFE    |
pub fn classify_risk(
    aqi_us: Option<u32>,
    wet_bulb_c: Option<Decimal>,
    thresholds: &RiskThresholds,
) -> RiskTier {
    if aqi_us.is_none() && wet_bulb_c.is_none() {
        return RiskTier::Unknown;
    }

    let aqi_above = |limit: u32| aqi_us.is_some_and(|aqi| aqi > limit);
    let wet_bulb_above = |limit: Decimal| wet_bulb_c.is_some_and(|wb| wb > limit);

    if aqi_above(thresholds.aqi_danger) || wet_bulb_above(thresholds.wet_bulb_danger_c) {
        RiskTier::Danger
    } else if aqi_above(thresholds.aqi_warning) || wet_bulb_above(thresholds.wet_bulb_warning_c) {
        RiskTier::Warning
    } else {
        RiskTier::Safe
    }
}

/// Compute secondary metrics for a reading. Never fails.
pub fn derive(raw: RawReading, thresholds: &RiskThresholds) -> DerivedReading {
    let wet_bulb_c = match (raw.temperature_c, raw.humidity_pct) {
        (Some(t), Some(rh)) => calculate_wet_bulb(t, rh),
        _ => None,
    };
    let risk_tier = classify_risk(raw.aqi_us, wet_bulb_c, thresholds);

    DerivedReading {
        raw,
        wet_bulb_c,
        risk_tier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn reading(t: Option<f64>, rh: Option<f64>, aqi: Option<u32>) -> RawReading {
        RawReading {
            temperature_c: t,
            humidity_pct: rh,
            wind_kmh: Some(10.0),
            aqi_us: aqi,
            pm25: None,
        }
    }

    #[test]
    fn test_threshold_constants() {
        assert_eq!(WET_BULB_WARNING_C, dec("30"));
        assert_eq!(WET_BULB_DANGER_C, dec("32"));
    }

    #[test]
    fn test_wet_bulb_known_values() {
        assert_eq!(calculate_wet_bulb(35.0, 70.0), Some(dec("30.3")));
        assert_eq!(calculate_wet_bulb(20.0, 50.0), Some(dec("13.7")));
        assert_eq!(calculate_wet_bulb(34.0, 90.0), Some(dec("32.6")));
    }

    #[test]
    fn test_wet_bulb_never_exceeds_dry_bulb() {
        // Half-degree / half-percent grid over the band where the fit holds.
        for t2 in -20..=100 {
            for rh2 in 10..=198 {
                let t = t2 as f64 / 2.0;
                let rh = rh2 as f64 / 2.0;
                let wb = calculate_wet_bulb(t, rh).unwrap();
                let dry = Decimal::from_str(&format!("{:.1}", t)).unwrap();
                assert!(wb <= dry, "wet-bulb {} > dry-bulb {} at RH {}", wb, t, rh);
            }
        }
    }

    #[test]
    fn test_wet_bulb_boundaries_are_total() {
        assert!(calculate_wet_bulb(50.0, 0.0).is_some());
        assert!(calculate_wet_bulb(-20.0, 100.0).is_some());
        assert!(calculate_wet_bulb(60.0, 100.0).is_some());
    }

    #[test]
    fn test_wet_bulb_undefined_is_missing() {
        assert_eq!(calculate_wet_bulb(25.0, -10.0), None);
        assert_eq!(calculate_wet_bulb(f64::NAN, 50.0), None);
        assert_eq!(calculate_wet_bulb(25.0, f64::INFINITY), None);
    }

    #[test]
    fn test_classify_both_missing_is_unknown() {
        let t = RiskThresholds::default();
        assert_eq!(classify_risk(None, None, &t), RiskTier::Unknown);
    }

    #[test]
    fn test_classify_aqi_alone_can_trigger_danger() {
        let t = RiskThresholds::default();
        assert_eq!(classify_risk(Some(200), None, &t), RiskTier::Danger);
        assert_eq!(classify_risk(Some(120), None, &t), RiskTier::Warning);
        assert_eq!(classify_risk(Some(40), None, &t), RiskTier::Safe);
    }

    #[test]
    fn test_classify_wet_bulb_alone() {
        let t = RiskThresholds::default();
        assert_eq!(classify_risk(None, Some(dec("32.1")), &t), RiskTier::Danger);
        assert_eq!(classify_risk(None, Some(dec("32.0")), &t), RiskTier::Warning);
        assert_eq!(classify_risk(None, Some(dec("30.0")), &t), RiskTier::Safe);
    }

    #[test]
    fn test_classify_boundaries_are_exclusive() {
        let t = RiskThresholds::default();
        assert_eq!(classify_risk(Some(100), Some(dec("30.0")), &t), RiskTier::Safe);
        assert_eq!(classify_risk(Some(101), Some(dec("20.0")), &t), RiskTier::Warning);
        assert_eq!(classify_risk(Some(150), Some(dec("20.0")), &t), RiskTier::Warning);
        assert_eq!(classify_risk(Some(151), Some(dec("20.0")), &t), RiskTier::Danger);
    }

    #[test]
    fn test_classify_most_severe_wins() {
        let t = RiskThresholds::default();
        // Mild air, lethal heat
        assert_eq!(classify_risk(Some(20), Some(dec("33.0")), &t), RiskTier::Danger);
        // Mild heat, bad air
        assert_eq!(classify_risk(Some(180), Some(dec("15.0")), &t), RiskTier::Danger);
    }

    #[test]
    fn test_classify_monotonic_in_aqi() {
        let t = RiskThresholds::default();
        for wb in [None, Some(dec("10.0")), Some(dec("31.0")), Some(dec("33.0"))] {
            let mut previous = RiskTier::Unknown;
            for aqi in 0..=500 {
                let tier = classify_risk(Some(aqi), wb, &t);
                assert!(tier >= previous, "AQI {} with wet-bulb {:?}", aqi, wb);
                previous = tier;
            }
        }
    }

    #[test]
    fn test_classify_monotonic_in_wet_bulb() {
        let t = RiskThresholds::default();
        for aqi in [None, Some(50), Some(120), Some(200)] {
            let mut previous = RiskTier::Unknown;
            for tenths in -200..=400 {
                let wb = Decimal::new(tenths, 1);
                let tier = classify_risk(aqi, Some(wb), &t);
                assert!(tier >= previous, "wet-bulb {} with AQI {:?}", wb, aqi);
                previous = tier;
            }
        }
    }

    #[test]
    fn test_derive_hot_humid_example() {
        let t = RiskThresholds::default();

        let low_aqi = derive(reading(Some(35.0), Some(70.0), Some(80)), &t);
        assert_eq!(low_aqi.wet_bulb_c, Some(dec("30.3")));
        assert_eq!(low_aqi.risk_tier, RiskTier::Warning);

        let high_aqi = derive(reading(Some(35.0), Some(70.0), Some(160)), &t);
        assert_eq!(high_aqi.risk_tier, RiskTier::Danger);
    }

    #[test]
    fn test_derive_missing_humidity() {
        let derived = derive(reading(Some(40.0), None, Some(200)), &RiskThresholds::default());
        assert_eq!(derived.wet_bulb_c, None);
        assert_eq!(derived.risk_tier, RiskTier::Danger);
    }

    #[test]
    fn test_derive_nothing_to_classify() {
        let derived = derive(reading(None, Some(50.0), None), &RiskThresholds::default());
        assert_eq!(derived.wet_bulb_c, None);
        assert_eq!(derived.risk_tier, RiskTier::Unknown);
    }

    #[test]
    fn test_derive_keeps_raw_values() {
        let raw = reading(Some(22.5), Some(40.0), Some(12));
        let derived = derive(raw.clone(), &RiskThresholds::default());
        assert_eq!(derived.raw, raw);
        assert_eq!(derived.risk_tier, RiskTier::Safe);
    }

    #[test]
    fn test_risk_tier_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&RiskTier::Danger).unwrap(), "\"DANGER\"");
        assert_eq!(serde_json::to_string(&RiskTier::Unknown).unwrap(), "\"UNKNOWN\"");
    }
}
