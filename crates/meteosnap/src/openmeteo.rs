//! Open-Meteo forecast client.
//!
//! One fixed location, one-day hourly forecast window. The poller talks to
//! the provider through the [`WeatherFetcher`] trait so cycle logic is
//! testable with a canned response.

use crate::config::{FetchConfig, LocationConfig};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Abstraction over the weather provider.
///
/// The real implementation is [`OpenMeteoClient`]; tests substitute a stub
/// returning a fixed payload.
pub trait WeatherFetcher: Send + Sync + 'static {
    fn fetch_forecast(&self) -> impl Future<Output = Result<Value, FetchError>> + Send;
}

/// HTTP client for the Open-Meteo forecast endpoint.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: reqwest::Client,
    api_url: String,
    location: LocationConfig,
    fetch: FetchConfig,
}

impl OpenMeteoClient {
    pub fn new(location: LocationConfig, fetch: FetchConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_url: fetch.api_url.clone(),
            location,
            fetch,
        })
    }
}

impl WeatherFetcher for OpenMeteoClient {
    async fn fetch_forecast(&self) -> Result<Value, FetchError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("latitude", self.location.latitude.to_string()),
                ("longitude", self.location.longitude.to_string()),
                ("current_weather", "true".to_string()),
                ("hourly", self.fetch.hourly_fields.join(",")),
                ("timezone", self.fetch.timezone.clone()),
                ("forecast_days", self.fetch.forecast_days.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(response.json().await?)
    }
}
