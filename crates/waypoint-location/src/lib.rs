//! Waypoint Location - an MCP server exposing Amazon Location Service lookups
//!
//! Tools:
//! - `reverse_geocode`: the address closest to a coordinate
//! - `search_nearby`: places around a coordinate, widening the radius until something is found
//! - `calculate_route`: distance, duration and turn-by-turn steps between two positions

pub mod geo;
pub mod tools;

pub use geo::{GeoClient, GeoError, API_KEY_ENV, DEFAULT_REGION};
pub use tools::{LocationHandler, INSTRUCTIONS};
