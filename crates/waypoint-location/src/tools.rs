//! MCP tool handler for the location server

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use waypoint_mcp::{McpHandler, McpTool};

use crate::geo::{GeoClient, NearbyFilter, Place, Position, RouteRequest, SearchNearbyRequest};

pub const REVERSE_GEOCODE: &str = "reverse_geocode";
pub const SEARCH_NEARBY: &str = "search_nearby";
pub const CALCULATE_ROUTE: &str = "calculate_route";

pub const NO_ROUTE_FOUND: &str = "No route found";

pub const DEFAULT_MAX_RESULTS: u32 = 5;
pub const DEFAULT_RADIUS: u32 = 500;
/// Upper bound for both the requested radius and the expansion loop
pub const MAX_RADIUS: u32 = 50_000;
const MAX_RESULTS_LIMIT: u32 = 50;

pub const INSTRUCTIONS: &str = "Amazon Location Service MCP server. Reverse geocode coordinates into an address, \
search for places near a position (the search radius widens automatically when nothing is found), \
and calculate routes with turn-by-turn steps. All positions are [longitude, latitude].";

const REVERSE_GEOCODE_DESCRIPTION: &str = "Reverse geocode coordinates to an address.\n\n    Args:\n        longitude: Longitude of the location\n        latitude: Latitude of the location\n    ";

const SEARCH_NEARBY_DESCRIPTION: &str = "Search for places near a location, expanding the radius until results are found.\n\n    Args:\n        longitude: Longitude of the center point\n        latitude: Latitude of the center point\n        max_results: Maximum number of results to return\n        query: Optional search query\n        radius: Search radius in meters\n    ";

const CALCULATE_ROUTE_DESCRIPTION: &str = "Calculate a route and return summary info and turn-by-turn directions.\n\n    Args:\n        departure_position: Departure position as [longitude, latitude]\n        destination_position: Destination position as [longitude, latitude]\n        travel_mode: Travel mode: 'Car', 'Truck', 'Pedestrian' (or 'Walking'), or 'Scooter' (default: 'Car')\n        optimize_for: Optimize route for 'FastestRoute' or 'ShortestRoute' (default: 'FastestRoute')\n    ";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    fn from_position(position: &[f64]) -> Option<Self> {
        match position {
            [longitude, latitude, ..] => Some(Self {
                longitude: *longitude,
                latitude: *latitude,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeocodedPlace {
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub categories: Vec<String>,
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactSummary {
    pub phones: Vec<String>,
    pub websites: Vec<String>,
    pub emails: Vec<String>,
    pub faxes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoursSummary {
    pub display: Vec<String>,
    pub components: Vec<Value>,
    pub open_now: Option<bool>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyPlace {
    pub place_id: Option<String>,
    pub name: String,
    pub address: String,
    pub coordinates: Option<Coordinates>,
    pub categories: Vec<String>,
    pub contacts: ContactSummary,
    pub opening_hours: Vec<HoursSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyResults {
    pub places: Vec<NearbyPlace>,
    pub radius_used: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteStep {
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    #[serde(rename = "type")]
    pub step_type: Option<String>,
    pub road_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    pub distance_meters: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub turn_by_turn: Vec<RouteStep>,
}

fn category_names(categories: &[crate::geo::Category]) -> Vec<String> {
    categories.iter().filter_map(|c| c.name.clone()).collect()
}

fn place_name(place: &Place) -> String {
    place.title.clone().unwrap_or_else(|| "Unknown".to_string())
}

fn place_address(place: &Place) -> String {
    place
        .address
        .as_ref()
        .and_then(|a| a.label.clone())
        .or_else(|| place.title.clone())
        .unwrap_or_default()
}

impl From<&Place> for GeocodedPlace {
    fn from(place: &Place) -> Self {
        Self {
            name: place_name(place),
            coordinates: Coordinates::from_position(&place.position),
            categories: category_names(&place.categories),
            address: place_address(place),
        }
    }
}

impl From<&Place> for NearbyPlace {
    fn from(place: &Place) -> Self {
        let values =
            |details: &[crate::geo::ContactDetail]| -> Vec<String> { details.iter().map(|d| d.value.clone()).collect() };
        let contacts = place
            .contacts
            .as_ref()
            .map(|c| ContactSummary {
                phones: values(&c.phones),
                websites: values(&c.websites),
                emails: values(&c.emails),
                faxes: values(&c.faxes),
            })
            .unwrap_or_default();

        Self {
            place_id: place.place_id.clone(),
            name: place_name(place),
            address: place_address(place),
            coordinates: Coordinates::from_position(&place.position),
            categories: category_names(&place.categories),
            contacts,
            opening_hours: place
                .opening_hours
                .iter()
                .map(|h| HoursSummary {
                    display: h.display.clone(),
                    components: h.components.clone(),
                    open_now: h.open_now,
                    categories: category_names(&h.categories),
                })
                .collect(),
        }
    }
}

fn number_arg(arguments: &Value, key: &str) -> Result<f64, String> {
    match arguments.get(key) {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| format!("'{}' is not a finite number", key)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' must be a number, got {:?}", key, s)),
        Some(_) => Err(format!("'{}' must be a number", key)),
        None => Err(format!("Missing required argument '{}'", key)),
    }
}

fn bounded_arg(arguments: &Value, key: &str, default: u32, max: u32) -> Result<u32, String> {
    if arguments.get(key).is_none_or(Value::is_null) {
        return Ok(default);
    }
    let value = number_arg(arguments, key)?;
    if value.fract() != 0.0 || value < 1.0 || value > f64::from(max) {
        return Err(format!("'{}' must be a whole number between 1 and {}", key, max));
    }
    Ok(value as u32)
}

fn string_arg<'a>(arguments: &'a Value, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn checked_position(longitude: f64, latitude: f64) -> Result<Position, String> {
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("longitude {} is outside -180..180", longitude));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(format!("latitude {} is outside -90..90", latitude));
    }
    Ok([longitude, latitude])
}

fn position_arg(arguments: &Value, key: &str) -> Result<Position, String> {
    let pair = arguments
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| format!("'{}' must be [longitude, latitude]", key))?;
    match pair.as_slice() {
        [lon, lat] => match (lon.as_f64(), lat.as_f64()) {
            (Some(lon), Some(lat)) => checked_position(lon, lat),
            _ => Err(format!("'{}' must contain two numbers", key)),
        },
        _ => Err(format!("'{}' must be [longitude, latitude]", key)),
    }
}

/// Free-text queries become category ids: "coffee shop" -> "coffee_shop"
fn category_filter(query: &str) -> String {
    query.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

/// Routes API travel mode for a user-supplied name
pub fn travel_mode(name: &str) -> Result<&'static str, String> {
    match name.to_ascii_lowercase().as_str() {
        "car" => Ok("Car"),
        "truck" => Ok("Truck"),
        "pedestrian" | "walking" => Ok("Pedestrian"),
        "scooter" => Ok("Scooter"),
        _ => Err(format!(
            "Unsupported travel mode '{}'; use Car, Truck, Pedestrian or Scooter",
            name
        )),
    }
}

fn optimize_for(name: &str) -> Result<&'static str, String> {
    match name.to_ascii_lowercase().as_str() {
        "fastestroute" => Ok("FastestRoute"),
        "shortestroute" => Ok("ShortestRoute"),
        _ => Err(format!("optimize_for must be FastestRoute or ShortestRoute, got '{}'", name)),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("Failed to encode result: {}", e))
}

pub struct LocationHandler {
    geo: GeoClient,
}

impl LocationHandler {
    pub fn new(geo: GeoClient) -> Self {
        Self { geo }
    }

    pub async fn reverse_geocode(&self, longitude: f64, latitude: f64) -> Result<Option<GeocodedPlace>, String> {
        let position = checked_position(longitude, latitude)?;
        let place = self.geo.reverse_geocode(position).await.map_err(|e| e.to_string())?;
        Ok(place.as_ref().map(GeocodedPlace::from))
    }

    /// Searches outward from `radius`, doubling it until places turn up or
    /// the next step would pass [`MAX_RADIUS`].
    pub async fn search_nearby(
        &self,
        position: Position,
        max_results: u32,
        query: Option<&str>,
        radius: u32,
    ) -> Result<NearbyResults, String> {
        let filter = query.map(|q| NearbyFilter {
            include_categories: vec![category_filter(q)],
        });

        let mut current = radius;
        let mut radius_used = radius;
        while current <= MAX_RADIUS {
            let request = SearchNearbyRequest {
                query_position: position,
                query_radius: current,
                max_results,
                filter: filter.clone(),
            };
            let places = self.geo.search_nearby(&request).await.map_err(|e| e.to_string())?;
            radius_used = current;
            if !places.is_empty() {
                return Ok(NearbyResults {
                    places: places.iter().map(NearbyPlace::from).collect(),
                    radius_used,
                });
            }
            debug!(radius = current, "No places found, widening search");
            current = current.saturating_mul(2);
        }

        Ok(NearbyResults {
            places: Vec::new(),
            radius_used,
        })
    }

    /// `None` when the service found no route between the two positions
    pub async fn calculate_route(
        &self,
        departure: Position,
        destination: Position,
        mode: &str,
        optimize: &str,
    ) -> Result<Option<RouteResult>, String> {
        let request = RouteRequest {
            origin: departure,
            destination,
            travel_mode: travel_mode(mode)?.to_string(),
            travel_step_type: "TurnByTurn".to_string(),
            optimize_routing_for: optimize_for(optimize)?.to_string(),
        };
        let routes = self.geo.calculate_routes(&request).await.map_err(|e| e.to_string())?;
        let Some(route) = routes.first() else {
            return Ok(None);
        };

        let summary = route.summary.clone().unwrap_or_default();
        let turn_by_turn = route
            .legs
            .iter()
            .flat_map(|leg| leg.travel_steps())
            .map(|step| RouteStep {
                distance_meters: step.distance,
                duration_seconds: step.duration,
                step_type: step.step_type.clone(),
                road_name: step.next_road.as_ref().and_then(|road| road.name()),
            })
            .collect();

        Ok(Some(RouteResult {
            distance_meters: summary.distance,
            duration_seconds: summary.duration,
            turn_by_turn,
        }))
    }
}

#[async_trait]
impl McpHandler for LocationHandler {
    async fn list_tools(&self) -> Vec<McpTool> {
        vec![
            McpTool {
                name: REVERSE_GEOCODE.to_string(),
                description: Some(REVERSE_GEOCODE_DESCRIPTION.to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "longitude": {"type": "number", "description": "Longitude of the location"},
                        "latitude": {"type": "number", "description": "Latitude of the location"}
                    },
                    "required": ["longitude", "latitude"]
                }),
            },
            McpTool {
                name: SEARCH_NEARBY.to_string(),
                description: Some(SEARCH_NEARBY_DESCRIPTION.to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "longitude": {"type": "number", "description": "Longitude of the center point"},
                        "latitude": {"type": "number", "description": "Latitude of the center point"},
                        "max_results": {"type": "integer", "description": "Maximum number of results to return",
                                        "default": DEFAULT_MAX_RESULTS, "minimum": 1, "maximum": MAX_RESULTS_LIMIT},
                        "query": {"type": "string", "description": "Optional search query"},
                        "radius": {"type": "integer", "description": "Search radius in meters",
                                   "default": DEFAULT_RADIUS, "minimum": 1, "maximum": MAX_RADIUS}
                    },
                    "required": ["longitude", "latitude"]
                }),
            },
            McpTool {
                name: CALCULATE_ROUTE.to_string(),
                description: Some(CALCULATE_ROUTE_DESCRIPTION.to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "departure_position": {"type": "array", "items": {"type": "number"},
                                               "description": "Departure position as [longitude, latitude]"},
                        "destination_position": {"type": "array", "items": {"type": "number"},
                                                 "description": "Destination position as [longitude, latitude]"},
                        "travel_mode": {"type": "string", "default": "Car",
                                        "description": "Travel mode: 'Car', 'Truck', 'Pedestrian', or 'Scooter' (default: 'Car')"},
                        "optimize_for": {"type": "string", "default": "FastestRoute",
                                         "description": "Optimize route for 'FastestRoute' or 'ShortestRoute' (default: 'FastestRoute')"}
                    },
                    "required": ["departure_position", "destination_position"]
                }),
            },
        ]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, String> {
        info!(tool = name, %arguments, "Tool call");
        match name {
            REVERSE_GEOCODE => {
                let longitude = number_arg(&arguments, "longitude")?;
                let latitude = number_arg(&arguments, "latitude")?;
                match self.reverse_geocode(longitude, latitude).await? {
                    Some(place) => to_json(&place),
                    None => Err(format!("No address found for {}, {}", longitude, latitude)),
                }
            }
            SEARCH_NEARBY => {
                let position = checked_position(
                    number_arg(&arguments, "longitude")?,
                    number_arg(&arguments, "latitude")?,
                )?;
                let max_results = bounded_arg(&arguments, "max_results", DEFAULT_MAX_RESULTS, MAX_RESULTS_LIMIT)?;
                let radius = bounded_arg(&arguments, "radius", DEFAULT_RADIUS, MAX_RADIUS)?;
                let query = string_arg(&arguments, "query");
                to_json(&self.search_nearby(position, max_results, query, radius).await?)
            }
            CALCULATE_ROUTE => {
                let departure = position_arg(&arguments, "departure_position")?;
                let destination = position_arg(&arguments, "destination_position")?;
                let mode = string_arg(&arguments, "travel_mode").unwrap_or("Car");
                let optimize = string_arg(&arguments, "optimize_for").unwrap_or("FastestRoute");
                match self.calculate_route(departure, destination, mode, optimize).await? {
                    Some(route) => to_json(&route),
                    None => Err(NO_ROUTE_FOUND.to_string()),
                }
            }
            _ => Err(format!("Unknown tool: {}", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> LocationHandler {
        // Unroutable: argument validation must fail before any request goes out
        LocationHandler::new(GeoClient::with_endpoints("http://127.0.0.1:9", "http://127.0.0.1:9", "key"))
    }

    #[tokio::test]
    async fn test_catalog_names() {
        let tools = handler().list_tools().await;
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![REVERSE_GEOCODE, SEARCH_NEARBY, CALCULATE_ROUTE]);
        assert_eq!(tools[1].input_schema["properties"]["radius"]["default"], json!(500));
    }

    #[tokio::test]
    async fn test_argument_validation() {
        let h = handler();
        assert!(h.call_tool(REVERSE_GEOCODE, json!({"longitude": 1.0})).await.is_err());
        assert!(h.call_tool(REVERSE_GEOCODE, json!({"longitude": 200.0, "latitude": 1.0})).await.is_err());
        assert!(h
            .call_tool(SEARCH_NEARBY, json!({"longitude": 1.0, "latitude": 1.0, "radius": 60000}))
            .await
            .is_err());
        assert!(h
            .call_tool(SEARCH_NEARBY, json!({"longitude": 1.0, "latitude": 1.0, "max_results": 0}))
            .await
            .is_err());
        assert!(h
            .call_tool(CALCULATE_ROUTE, json!({"departure_position": [1.0], "destination_position": [1.0, 2.0]}))
            .await
            .is_err());
        let bicycle = h
            .call_tool(
                CALCULATE_ROUTE,
                json!({"departure_position": [1.0, 2.0], "destination_position": [1.0, 2.5], "travel_mode": "Bicycle"}),
            )
            .await
            .unwrap_err();
        assert!(bicycle.contains("Unsupported travel mode"));
        assert!(h.call_tool("geocode", json!({})).await.is_err());
    }

    #[test]
    fn test_travel_mode_aliases() {
        assert_eq!(travel_mode("walking"), Ok("Pedestrian"));
        assert_eq!(travel_mode("TRUCK"), Ok("Truck"));
        assert!(travel_mode("Bicycle").is_err());
        assert_eq!(optimize_for("shortestroute"), Ok("ShortestRoute"));
    }

    #[test]
    fn test_category_filter() {
        assert_eq!(category_filter("Coffee Shop"), "coffee_shop");
        assert_eq!(category_filter("  restaurant "), "restaurant");
    }
}
