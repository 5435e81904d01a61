use chrono::{NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::helpers::opt_f64_to_decimal_1dp;
use crate::services::risk::{DerivedReading, RiskTier};

/// Local capture time, second precision. Zero-padded so rows sort lexicographically.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One persisted row: a target's derived reading at its capture instant.
/// Never mutated once written. Field order is the store's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Record {
    #[serde(rename = "Timestamp", with = "timestamp_format")]
    #[schema(value_type = String, example = "2026-07-01 14:05:00")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Temperature_C")]
    pub temperature_c: Option<Decimal>,
    #[serde(rename = "Humidity_Pct")]
    pub humidity_pct: Option<Decimal>,
    #[serde(rename = "AQI_US")]
    pub aqi_us: Option<u32>,
    #[serde(rename = "Wind_Speed_kmh")]
    pub wind_speed_kmh: Option<Decimal>,
    #[serde(rename = "PM25_ugm3")]
    pub pm25_ugm3: Option<Decimal>,
    #[serde(rename = "Wet_Bulb_C")]
    pub wet_bulb_c: Option<Decimal>,
    #[serde(rename = "Risk_Tier")]
    pub risk_tier: RiskTier,
}

impl Record {
    pub fn new(timestamp: NaiveDateTime, location: &str, reading: DerivedReading) -> Self {
        let raw = reading.raw;
        Self {
            timestamp: truncate_to_second(timestamp),
            location: location.to_string(),
            temperature_c: opt_f64_to_decimal_1dp(raw.temperature_c),
            humidity_pct: opt_f64_to_decimal_1dp(raw.humidity_pct),
            aqi_us: raw.aqi_us,
            wind_speed_kmh: opt_f64_to_decimal_1dp(raw.wind_kmh),
            pm25_ugm3: opt_f64_to_decimal_1dp(raw.pm25),
            wet_bulb_c: reading.wet_bulb_c,
            risk_tier: reading.risk_tier,
        }
    }
}

fn truncate_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Records produced by one cycle, in catalog order. Flushed once, then dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    records: Vec<Record>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}
