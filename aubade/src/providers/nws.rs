//! National Weather Service forecast client.

use super::{check_status, http_client};
use crate::config::WeatherConfig;
use crate::errors::{AubadeError, Result};
use crate::greeting::{ForecastPeriod, HourlyConditions, WeatherReport, WeatherSource};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct Points {
    properties: PointProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointProperties {
    forecast: String,
    forecast_hourly: String,
}

#[derive(Debug, Deserialize)]
struct Forecast {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<Period>,
}

#[derive(Debug, Default, Deserialize)]
struct Measured {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Period {
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_daytime: bool,
    temperature: f64,
    #[serde(default)]
    probability_of_precipitation: Measured,
    #[serde(default)]
    relative_humidity: Measured,
    #[serde(default)]
    dewpoint: Measured,
    #[serde(default)]
    wind_speed: String,
    #[serde(default)]
    wind_direction: String,
    #[serde(default)]
    short_forecast: String,
    #[serde(default)]
    detailed_forecast: String,
}

impl Period {
    fn summary(&self) -> ForecastPeriod {
        ForecastPeriod {
            name: self.name.clone(),
            precipitation: self.probability_of_precipitation.value,
            description: self.detailed_forecast.clone(),
        }
    }

    fn conditions(&self) -> HourlyConditions {
        HourlyConditions {
            temperature: self.temperature,
            humidity: self.relative_humidity.value,
            dewpoint: self.dewpoint.value,
            wind_speed: self.wind_speed.clone(),
            wind_direction: self.wind_direction.clone(),
            precipitation: self.probability_of_precipitation.value,
            conditions: self.short_forecast.clone(),
        }
    }
}

/// Reads the two-period forecast and the first daylight hour for one point.
#[derive(Debug, Clone)]
pub struct NwsWeather {
    http: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

impl NwsWeather {
    /// Creates a client for the given coordinates.
    pub fn new(config: &WeatherConfig, latitude: f64, longitude: f64) -> Result<Self> {
        Ok(Self {
            http: http_client(&config.user_agent, Duration::from_secs(config.timeout_secs))?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            latitude,
            longitude,
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http.get(url).send().await?;
        Ok(check_status("weather", response).await?.json().await?)
    }
}

#[async_trait]
impl WeatherSource for NwsWeather {
    async fn report(&self) -> Result<WeatherReport> {
        info!(latitude = self.latitude, longitude = self.longitude, "Fetching weather");
        let points: Points = self
            .get(&format!("{}/points/{},{}", self.base_url, self.latitude, self.longitude))
            .await?;
        debug!(forecast = %points.properties.forecast, hourly = %points.properties.forecast_hourly, "Forecast URLs resolved");

        let (daily, hourly) = futures::try_join!(
            self.get::<Forecast>(&points.properties.forecast),
            self.get::<Forecast>(&points.properties.forecast_hourly),
        )?;

        let sunrise = hourly
            .properties
            .periods
            .iter()
            .find(|p| p.is_daytime)
            .ok_or_else(|| AubadeError::collaborator("weather", "no daytime hours in forecast"))?;

        let mut periods = daily.properties.periods.iter();
        let (Some(overnight), Some(today)) = (periods.next(), periods.next()) else {
            return Err(AubadeError::collaborator("weather", "forecast has fewer than two periods"));
        };

        info!("Weather fetched");
        Ok(WeatherReport {
            overnight: overnight.summary(),
            sunrise: sunrise.conditions(),
            today: today.summary(),
        })
    }
}
