//! MCP tool handler for the weather server

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;
use waypoint_mcp::{McpHandler, McpTool};

use crate::nws::NwsClient;

pub const GET_ALERTS: &str = "get_alerts";
pub const GET_FORECAST: &str = "get_forecast";
pub const EASTER_EGG: &str = "easter_egg";

const ALERTS_DESCRIPTION: &str =
    "Get weather alerts for a US state.\n\n    Args:\n        state: Two-letter US state code (e.g. CA, NY)\n    ";

const FORECAST_DESCRIPTION: &str = "Get weather forecast for a location.\n\n    Args:\n        latitude: Latitude of the location\n        longitude: Longitude of the location\n    ";

const EASTER_EGG_DESCRIPTION: &str = "easter egg function in the server that answers to the prompt timbuktu";

pub const TIMBUKTU_FACT: &str = r#"Fun fact: The actual Timbuktu in Mali was so legendary for being remote that Europeans didn't believe it existed for centuries. When they finally found it, they probably felt like someone who finally discovers that their parents weren't just making up that ice cream shop they kept talking about. Though I bet the residents of Timbuktu are pretty tired of being everyone's go-to reference for "middle of nowhere" when they've got this amazing historical city with centuries-old libraries and architecture. It's like their city is the geographical equivalent of "I walked to school uphill both ways!""#;

pub struct WeatherHandler {
    nws: NwsClient,
}

impl WeatherHandler {
    pub fn new(nws: NwsClient) -> Self {
        Self { nws }
    }
}

impl Default for WeatherHandler {
    fn default() -> Self {
        Self::new(NwsClient::new())
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

#[async_trait]
impl McpHandler for WeatherHandler {
    async fn list_tools(&self) -> Vec<McpTool> {
        vec![
            McpTool {
                name: GET_ALERTS.to_string(),
                description: Some(ALERTS_DESCRIPTION.to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {"state": {"type": "string"}},
                    "required": ["state"]
                }),
            },
            McpTool {
                name: GET_FORECAST.to_string(),
                description: Some(FORECAST_DESCRIPTION.to_string()),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "latitude": {"type": "number"},
                        "longitude": {"type": "number"}
                    },
                    "required": ["latitude", "longitude"]
                }),
            },
            McpTool {
                name: EASTER_EGG.to_string(),
                description: Some(EASTER_EGG_DESCRIPTION.to_string()),
                input_schema: json!({"type": "object", "properties": {}}),
            },
        ]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, String> {
        info!(tool = name, %arguments, "Tool call");
        match name {
            GET_ALERTS => {
                let state = arguments
                    .get("state")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| "Missing required argument 'state'".to_string())?;
                Ok(self.nws.alerts(&state.to_uppercase()).await)
            }
            GET_FORECAST => {
                let latitude = number_arg(&arguments, "latitude")?;
                let longitude = number_arg(&arguments, "longitude")?;
                Ok(self.nws.forecast(latitude, longitude).await)
            }
            EASTER_EGG => Ok(TIMBUKTU_FACT.to_string()),
            _ => Err(format!("Unknown tool: {}", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> WeatherHandler {
        // Unroutable: argument validation must fail before any request goes out
        WeatherHandler::new(NwsClient::with_base_url("http://127.0.0.1:9"))
    }

    #[tokio::test]
    async fn test_catalog_names_and_descriptions() {
        let tools = handler().list_tools().await;
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![GET_ALERTS, GET_FORECAST, EASTER_EGG]);
        assert!(tools[1].description.as_deref().unwrap().contains("longitude: Longitude of the location"));
    }

    #[tokio::test]
    async fn test_argument_validation() {
        let h = handler();
        assert!(h.call_tool(GET_ALERTS, json!({})).await.is_err());
        assert!(h.call_tool(GET_FORECAST, json!({"latitude": 1.0})).await.is_err());
        assert!(h.call_tool(GET_FORECAST, json!({"latitude": "north", "longitude": 1.0})).await.is_err());
        assert!(h.call_tool("get_tides", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_easter_egg() {
        let answer = handler().call_tool(EASTER_EGG, json!({})).await.unwrap();
        assert!(answer.starts_with("Fun fact: The actual Timbuktu"));
    }
}
