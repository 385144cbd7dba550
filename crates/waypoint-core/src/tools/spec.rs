//! Conversion from a provider's tool catalog to the tool specifications
//! handed to the model service.
//!
//! Conversion is pure: the same catalog always yields the same
//! specifications, so a session converts once and reuses the result for
//! every generation call.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

use super::ToolDescriptor;

/// Options controlling catalog conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpecOptions {
    /// Fill in missing parameter descriptions from the tool's free-text
    /// description.
    ///
    /// This is a heuristic: the first description line that mentions the
    /// parameter name is used verbatim (trimmed). It can pick an unrelated
    /// line when one parameter name is a substring of another, and it
    /// silently yields an empty description when nothing matches.
    pub backfill_descriptions: bool,
}

impl Default for ToolSpecOptions {
    fn default() -> Self {
        Self {
            backfill_descriptions: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    #[serde(rename = "type")]
    pub property_type: Value,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    pub properties: BTreeMap<String, PropertySpec>,
    pub required: Vec<String>,
}

/// A tool in the form the model service consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpecification {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl ToolSpecification {
    /// The input schema as a JSON-schema object
    pub fn json_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": self.input_schema.properties,
            "required": self.input_schema.required,
        })
    }
}

/// Convert every tool in a catalog, preserving catalog order
pub fn convert_catalog(tools: &[ToolDescriptor], options: ToolSpecOptions) -> Vec<ToolSpecification> {
    tools.iter().map(|tool| convert_tool(tool, options)).collect()
}

/// Convert one catalog entry
pub fn convert_tool(tool: &ToolDescriptor, options: ToolSpecOptions) -> ToolSpecification {
    let mut properties = BTreeMap::new();

    if let Some(props) = tool.input_schema.get("properties").and_then(Value::as_object) {
        for (name, details) in props {
            let property_type = details
                .get("type")
                .cloned()
                .unwrap_or_else(|| Value::String("string".to_string()));

            let own = details
                .get("description")
                .and_then(Value::as_str)
                .filter(|d| !d.trim().is_empty());

            let description = match own {
                Some(d) => d.to_string(),
                None if options.backfill_descriptions => describe_from_text(&tool.description, name),
                None => String::new(),
            };

            properties.insert(
                name.clone(),
                PropertySpec {
                    property_type,
                    description,
                },
            );
        }
    }

    let required = tool
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    ToolSpecification {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: InputSchema { properties, required },
    }
}

/// First line of `text` containing `property`, trimmed, or an empty string
pub fn describe_from_text(text: &str, property: &str) -> String {
    text.lines()
        .find(|line| line.contains(property))
        .map(|line| line.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast_tool() -> ToolDescriptor {
        ToolDescriptor {
            name: "get_forecast".to_string(),
            description: "Get weather forecast for a location.\n\n    Args:\n        latitude: Latitude of the location\n        longitude: East-west position\n    "
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "latitude": {"type": "number"},
                    "longitude": {"type": "number"}
                },
                "required": ["latitude", "longitude"]
            }),
        }
    }

    #[test]
    fn test_backfill_attaches_matching_line() {
        let spec = convert_tool(&forecast_tool(), ToolSpecOptions::default());
        let longitude = &spec.input_schema.properties["longitude"];
        assert_eq!(longitude.description, "longitude: East-west position");
        assert_eq!(longitude.property_type, json!("number"));
        assert_eq!(spec.input_schema.required, vec!["latitude", "longitude"]);
    }

    #[test]
    fn test_backfill_can_be_disabled() {
        let spec = convert_tool(
            &forecast_tool(),
            ToolSpecOptions {
                backfill_descriptions: false,
            },
        );
        assert!(spec.input_schema.properties.values().all(|p| p.description.is_empty()));
    }

    #[test]
    fn test_schema_description_wins_over_heuristic() {
        let tool = ToolDescriptor {
            name: "get_alerts".to_string(),
            description: "state: something else".to_string(),
            input_schema: json!({
                "properties": {"state": {"type": "string", "description": "Two-letter code"}}
            }),
        };
        let spec = convert_tool(&tool, ToolSpecOptions::default());
        assert_eq!(spec.input_schema.properties["state"].description, "Two-letter code");
    }

    #[test]
    fn test_missing_type_defaults_to_string() {
        let tool = ToolDescriptor {
            name: "t".to_string(),
            description: String::new(),
            input_schema: json!({"properties": {"q": {}}}),
        };
        let spec = convert_tool(&tool, ToolSpecOptions::default());
        assert_eq!(spec.input_schema.properties["q"].property_type, json!("string"));
        assert_eq!(spec.input_schema.properties["q"].description, "");
        assert!(spec.input_schema.required.is_empty());
    }

    #[test]
    fn test_json_schema_shape() {
        let spec = convert_tool(&forecast_tool(), ToolSpecOptions::default());
        let schema = spec.json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["latitude"]["type"], "number");
        assert_eq!(schema["required"], json!(["latitude", "longitude"]));
    }
}
