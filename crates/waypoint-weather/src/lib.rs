//! Waypoint Weather - an MCP server exposing National Weather Service lookups
//!
//! Tools:
//! - `get_alerts`: active alerts for a two-letter US state code
//! - `get_forecast`: the next five forecast periods for a coordinate
//! - `easter_egg`: answers to the prompt "timbuktu"

pub mod nws;
pub mod tools;

pub use nws::{NwsClient, NWS_API_BASE};
pub use tools::WeatherHandler;
