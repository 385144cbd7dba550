//! Amazon Location Service client (geo-places and geo-routes, v2 REST APIs)
//!
//! Requests are authenticated with an Amazon Location API key passed as the
//! `key` query parameter.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const API_KEY_ENV: &str = "AWS_LOCATION_API_KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("request to Amazon Location failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Amazon Location returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("invalid endpoint {0}")]
    Endpoint(String),
}

pub fn places_endpoint(region: &str) -> String {
    format!("https://places.geo.{}.amazonaws.com", region)
}

pub fn routes_endpoint(region: &str) -> String {
    format!("https://routes.geo.{}.amazonaws.com", region)
}

/// `[longitude, latitude]`, the order Amazon Location uses everywhere
pub type Position = [f64; 2];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReverseGeocodeBody {
    query_position: Position,
    max_results: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchNearbyRequest {
    pub query_position: Position,
    pub query_radius: u32,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<NearbyFilter>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NearbyFilter {
    pub include_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RouteRequest {
    pub origin: Position,
    pub destination: Position,
    pub travel_mode: String,
    pub travel_step_type: String,
    pub optimize_routing_for: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct PlacesResponse {
    result_items: Vec<Place>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Place {
    pub place_id: Option<String>,
    pub title: Option<String>,
    pub address: Option<Address>,
    pub position: Vec<f64>,
    pub distance: Option<f64>,
    pub categories: Vec<Category>,
    pub contacts: Option<Contacts>,
    pub opening_hours: Vec<OpeningHours>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Address {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Category {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Contacts {
    pub phones: Vec<ContactDetail>,
    pub websites: Vec<ContactDetail>,
    pub emails: Vec<ContactDetail>,
    pub faxes: Vec<ContactDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContactDetail {
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct OpeningHours {
    pub display: Vec<String>,
    pub open_now: Option<bool>,
    pub components: Vec<Value>,
    pub categories: Vec<Category>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RoutesResponse {
    routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Route {
    pub summary: Option<RouteSummary>,
    pub legs: Vec<RouteLeg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RouteSummary {
    pub distance: Option<f64>,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RouteLeg {
    pub vehicle_leg_details: Option<LegDetails>,
    pub pedestrian_leg_details: Option<LegDetails>,
}

impl RouteLeg {
    pub fn travel_steps(&self) -> &[TravelStep] {
        self.vehicle_leg_details
            .as_ref()
            .or(self.pedestrian_leg_details.as_ref())
            .map(|details| details.travel_steps.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LegDetails {
    pub travel_steps: Vec<TravelStep>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TravelStep {
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    #[serde(rename = "Type")]
    pub step_type: Option<String>,
    pub next_road: Option<Road>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Road {
    /// Either a plain string or a list of localized `{Value, Language}` names
    pub road_name: Value,
}

impl Road {
    pub fn name(&self) -> Option<String> {
        match &self.road_name {
            Value::String(name) => Some(name.clone()),
            Value::Array(names) => names
                .first()
                .and_then(|n| n.get("Value"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeoClient {
    client: reqwest::Client,
    places_url: String,
    routes_url: String,
    api_key: String,
}

impl GeoClient {
    /// Client for the regional public endpoints
    pub fn new(region: &str, api_key: impl Into<String>) -> Self {
        Self::with_endpoints(places_endpoint(region), routes_endpoint(region), api_key)
    }

    pub fn with_endpoints(places_url: impl Into<String>, routes_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            places_url: places_url.into().trim_end_matches('/').to_string(),
            routes_url: routes_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// The closest place to a position, if any
    pub async fn reverse_geocode(&self, position: Position) -> Result<Option<Place>, GeoError> {
        let body = ReverseGeocodeBody {
            query_position: position,
            max_results: 1,
        };
        let response: PlacesResponse = self
            .post(format!("{}/v2/reverse-geocode", self.places_url), &body)
            .await?;
        Ok(response.result_items.into_iter().next())
    }

    pub async fn search_nearby(&self, request: &SearchNearbyRequest) -> Result<Vec<Place>, GeoError> {
        let response: PlacesResponse = self
            .post(format!("{}/v2/search-nearby", self.places_url), request)
            .await?;
        Ok(response.result_items)
    }

    pub async fn calculate_routes(&self, request: &RouteRequest) -> Result<Vec<Route>, GeoError> {
        let response: RoutesResponse = self.post(format!("{}/v2/routes", self.routes_url), request).await?;
        Ok(response.routes)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, url: String, body: &B) -> Result<R, GeoError> {
        debug!(%url, "Amazon Location request");
        let mut endpoint = reqwest::Url::parse(&url).map_err(|e| GeoError::Endpoint(format!("{}: {}", url, e)))?;
        endpoint.query_pairs_mut().append_pair("key", &self.api_key);

        let response = self
            .client
            .post(endpoint)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GeoError::Service {
                status: status.as_u16(),
                message: service_message(&text),
            });
        }

        Ok(response.json::<R>().await?)
    }
}

/// Amazon services report errors as `{"Message": ...}` or `{"message": ...}`
fn service_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("Message")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
