//! Open-Meteo client.
//!
//! Fetches current weather and air quality for a target from two independent
//! endpoints and normalizes them into a single `RawReading`.
//! See: https://open-meteo.com/en/docs and https://open-meteo.com/en/docs/air-quality-api

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::FetchError;
use crate::services::catalog::Target;
use crate::services::collector::TelemetrySource;

/// One target's readings for one cycle.
///
/// Every field is optional: a source may report `null` for a value it has no
/// data for. Absence is kept as `None` all the way to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReading {
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub wind_kmh: Option<f64>,
    pub aqi_us: Option<u32>,
    pub pm25: Option<f64>,
}

/// Fields read from the weather endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature_c: Option<f64>,
    pub wind_kmh: Option<f64>,
    /// First (current-hour) value of the hourly relative-humidity series.
    pub humidity_pct: Option<f64>,
}

/// Fields read from the air-quality endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct AirQualitySnapshot {
    pub aqi_us: Option<u32>,
    pub pm25: Option<f64>,
}

/// Client for the Open-Meteo forecast and air-quality APIs.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    weather_url: String,
    air_quality_url: String,
    /// Throttle awaited before every request (rate-limit courtesy, not a retry wait).
    pacing: Duration,
}

impl OpenMeteoClient {
    pub fn new(
        client: reqwest::Client,
        weather_url: &str,
        air_quality_url: &str,
        pacing: Duration,
    ) -> Self {
        Self {
            client,
            weather_url: weather_url.to_string(),
            air_quality_url: air_quality_url.to_string(),
            pacing,
        }
    }

    /// Build a client with one shared connection pool, the configured per-call
    /// timeout and User-Agent.
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        if let Ok(ua) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, ua);
        } else {
            tracing::warn!("Ignoring invalid User-Agent '{}'", config.user_agent);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self::new(
            client,
            &config.weather_api_url,
            &config.air_quality_api_url,
            config.request_pacing,
        ))
    }

    /// Fetch both sources for a target.
    ///
    /// The pair is atomic: if either call fails the whole fetch fails and no
    /// partial reading is produced. No retries; the next cycle tries again.
    pub async fn fetch_reading(&self, target: &Target) -> Result<RawReading, FetchError> {
        validate_coordinates(target)?;

        let weather = self.fetch_weather(target.latitude, target.longitude).await?;
        let air = self
            .fetch_air_quality(target.latitude, target.longitude)
            .await?;

        Ok(RawReading {
            temperature_c: weather.temperature_c,
            humidity_pct: weather.humidity_pct,
            wind_kmh: weather.wind_kmh,
            aqi_us: air.aqi_us,
            pm25: air.pm25,
        })
    }

    pub async fn fetch_weather(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, FetchError> {
        let url = format!(
            "{}?latitude={}&longitude={}&current_weather=true&hourly=relativehumidity_2m",
            self.weather_url, lat, lon
        );
        let response: ForecastResponse = self.get_json(&url).await?;
        parse_weather(response)
    }

    pub async fn fetch_air_quality(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<AirQualitySnapshot, FetchError> {
        let url = format!(
            "{}?latitude={}&longitude={}&current=us_aqi,pm2_5",
            self.air_quality_url, lat, lon
        );
        let response: AirQualityResponse = self.get_json(&url).await?;
        Ok(parse_air_quality(response))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        tokio::time::sleep(self.pacing).await;

        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(FetchError::Network(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        Ok(response.json::<T>().await?)
    }
}

impl TelemetrySource for OpenMeteoClient {
    async fn fetch(&self, target: &Target) -> Result<RawReading, FetchError> {
        self.fetch_reading(target).await
    }
}

/// Reject coordinates the APIs cannot answer for before spending a request on them.
pub fn validate_coordinates(target: &Target) -> Result<(), FetchError> {
    let lat_ok = target.latitude.is_finite() && (-90.0..=90.0).contains(&target.latitude);
    let lon_ok = target.longitude.is_finite() && (-180.0..=180.0).contains(&target.longitude);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(FetchError::TargetInvalid(format!(
            "'{}' has coordinates ({}, {}) outside [-90, 90] / [-180, 180]",
            target.name, target.latitude, target.longitude
        )))
    }
}

// --- Open-Meteo JSON response types ---
//
// Value fields carry `deserialize_with` and no `default`: a missing key fails
// decoding (a shape error) while an explicit `null` decodes to `None`.

#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    current_weather: CurrentWeather,
    hourly: Hourly,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    #[serde(deserialize_with = "nullable_f64")]
    temperature: Option<f64>,
    #[serde(deserialize_with = "nullable_f64")]
    windspeed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Hourly {
    relativehumidity_2m: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct AirQualityResponse {
    current: AirQualityCurrent,
}

#[derive(Debug, Deserialize)]
struct AirQualityCurrent {
    #[serde(deserialize_with = "nullable_f64")]
    us_aqi: Option<f64>,
    #[serde(deserialize_with = "nullable_f64")]
    pm2_5: Option<f64>,
}

fn nullable_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Option::<f64>::deserialize(deserializer)
}

/// Extract the current weather from a forecast response.
///
/// Humidity is the first (current-hour) entry of the hourly series; an empty
/// series is a shape error.
pub fn parse_weather(response: ForecastResponse) -> Result<WeatherSnapshot, FetchError> {
    let humidity_pct = *response
        .hourly
        .relativehumidity_2m
        .first()
        .ok_or_else(|| FetchError::ResponseShape("hourly.relativehumidity_2m is empty".to_string()))?;

    Ok(WeatherSnapshot {
        temperature_c: response.current_weather.temperature,
        wind_kmh: response.current_weather.windspeed,
        humidity_pct,
    })
}

/// Extract the current US AQI and PM2.5 from an air-quality response.
pub fn parse_air_quality(response: AirQualityResponse) -> AirQualitySnapshot {
    AirQualitySnapshot {
        aqi_us: response.current.us_aqi.map(|v| v.round().max(0.0) as u32),
        pm25: response.current.pm2_5,
    }
}
