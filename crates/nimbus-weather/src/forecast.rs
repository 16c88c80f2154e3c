//! Forecast lookup: fetch a city's forecast and reshape it for display.

use std::sync::Arc;

use tracing::instrument;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::types::{RawForecastResponse, ViewForecast, ViewWeatherBlock};

const UNEXPECTED_RESPONSE: &str = "Unexpected response from the weather service.";

/// Request path for a city's forecast.
pub fn forecast_path(city: &str) -> String {
    format!("/weather/{}", urlencoding::encode(city.trim()))
}

/// Convert a decoded API response into the view model.
pub fn to_view(raw: &RawForecastResponse) -> ViewForecast {
    let all: Vec<ViewWeatherBlock> = raw.days.iter().map(ViewWeatherBlock::from).collect();
    let today = all.clone();

    ViewForecast {
        city: raw.city_info.name.clone(),
        country: raw.city_info.country.clone(),
        current: ViewWeatherBlock::from(&raw.current),
        today,
        summary: ViewWeatherBlock::from(&raw.summary),
        all,
    }
}

/// Forecast lookups on top of a shared [`ApiClient`].
#[derive(Clone)]
pub struct ForecastService {
    client: Arc<ApiClient>,
}

impl ForecastService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Load the forecast for `city`. Client errors propagate unchanged.
    #[instrument(skip(self), level = "info")]
    pub async fn load_forecast(&self, city: &str) -> Result<ViewForecast, ApiError> {
        let data = self.client.fetch_json(&forecast_path(city)).await?;

        let raw: RawForecastResponse = serde_json::from_value(data)
            .map_err(|e| ApiError::unexpected(UNEXPECTED_RESPONSE, e))?;

        tracing::debug!(
            "Loaded forecast for {}, {} ({} slots)",
            raw.city_info.name,
            raw.city_info.country,
            raw.days.len()
        );

        Ok(to_view(&raw))
    }
}
