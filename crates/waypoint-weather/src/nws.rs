//! National Weather Service API client
//!
//! Every lookup degrades to a human-readable message instead of an error;
//! the model receives the message as the tool's answer.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

pub const NWS_API_BASE: &str = "https://api.weather.gov";

const NWS_USER_AGENT: &str = "weather-app/1.0";
const NWS_ACCEPT: &str = "application/geo+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const FORECAST_PERIODS: usize = 5;
const SEPARATOR: &str = "\n---\n";

pub const ALERTS_UNAVAILABLE: &str = "Unable to fetch alerts or no alerts found.";
pub const NO_ACTIVE_ALERTS: &str = "No active alerts for this state.";
pub const FORECAST_UNAVAILABLE: &str = "Unable to fetch forecast data for this location.";
pub const DETAILED_FORECAST_UNAVAILABLE: &str = "Unable to fetch detailed forecast.";

#[derive(Debug, Clone)]
pub struct NwsClient {
    client: reqwest::Client,
    base_url: String,
}

impl NwsClient {
    pub fn new() -> Self {
        Self::with_base_url(NWS_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(NWS_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(NWS_ACCEPT));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Active alerts for a US state, formatted for reading
    pub async fn alerts(&self, state: &str) -> String {
        let url = format!("{}/alerts/active/area/{}", self.base_url, state);
        let Some(data) = self.fetch(&url).await else {
            return ALERTS_UNAVAILABLE.to_string();
        };
        let Some(features) = data.get("features").and_then(Value::as_array) else {
            return ALERTS_UNAVAILABLE.to_string();
        };
        if features.is_empty() {
            return NO_ACTIVE_ALERTS.to_string();
        }

        features.iter().map(format_alert).collect::<Vec<_>>().join(SEPARATOR)
    }

    /// Forecast for a coordinate: resolves the grid point first, then
    /// follows its forecast link
    pub async fn forecast(&self, latitude: f64, longitude: f64) -> String {
        let points_url = format!("{}/points/{},{}", self.base_url, latitude, longitude);
        let Some(points) = self.fetch(&points_url).await else {
            return FORECAST_UNAVAILABLE.to_string();
        };
        let Some(forecast_url) = points.pointer("/properties/forecast").and_then(Value::as_str) else {
            return FORECAST_UNAVAILABLE.to_string();
        };

        let Some(forecast) = self.fetch(forecast_url).await else {
            return DETAILED_FORECAST_UNAVAILABLE.to_string();
        };
        let Some(periods) = forecast.pointer("/properties/periods").and_then(Value::as_array) else {
            return DETAILED_FORECAST_UNAVAILABLE.to_string();
        };

        periods
            .iter()
            .take(FORECAST_PERIODS)
            .map(format_period)
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }

    async fn fetch(&self, url: &str) -> Option<Value> {
        debug!(url, "NWS request");
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url, "NWS request failed: {}", e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url, %status, "NWS returned an error status");
            return None;
        }

        match response.json::<Value>().await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(url, "NWS response was not JSON: {}", e);
                None
            }
        }
    }
}

impl Default for NwsClient {
    fn default() -> Self {
        Self::new()
    }
}

fn field(props: &Value, key: &str, fallback: &str) -> String {
    match props.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => fallback.to_string(),
        Some(other) => other.to_string(),
    }
}

pub fn format_alert(feature: &Value) -> String {
    let props = &feature["properties"];
    format!(
        "\nEvent: {}\nArea: {}\nSeverity: {}\nDescription: {}\nInstructions: {}\n",
        field(props, "event", "Unknown"),
        field(props, "areaDesc", "Unknown"),
        field(props, "severity", "Unknown"),
        field(props, "description", "No description available"),
        field(props, "instruction", "No specific instructions provided"),
    )
}

pub fn format_period(period: &Value) -> String {
    format!(
        "\n{}:\nTemperature: {}°{}\nWind: {} {}\nForecast: {}\n",
        field(period, "name", ""),
        field(period, "temperature", ""),
        field(period, "temperatureUnit", ""),
        field(period, "windSpeed", ""),
        field(period, "windDirection", ""),
        field(period, "detailedForecast", ""),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_alert_fills_missing_fields() {
        let feature = json!({"properties": {"event": "Flood Watch", "areaDesc": "Sacramento Valley", "instruction": null}});
        let text = format_alert(&feature);
        assert_eq!(
            text,
            "\nEvent: Flood Watch\nArea: Sacramento Valley\nSeverity: Unknown\nDescription: No description available\nInstructions: No specific instructions provided\n"
        );
    }

    #[test]
    fn test_format_period() {
        let period = json!({
            "name": "Tonight",
            "temperature": 54,
            "temperatureUnit": "F",
            "windSpeed": "5 mph",
            "windDirection": "W",
            "detailedForecast": "Mostly clear."
        });
        assert_eq!(
            format_period(&period),
            "\nTonight:\nTemperature: 54°F\nWind: 5 mph W\nForecast: Mostly clear.\n"
        );
    }

    #[test]
    fn test_base_url_trims_slash() {
        assert_eq!(NwsClient::with_base_url("http://localhost:1/").base_url(), "http://localhost:1");
    }
}
