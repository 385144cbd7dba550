//! NWS client and handler tests against a mocked weather.gov

use serde_json::json;
use waypoint_mcp::McpHandler;
use waypoint_weather::nws::{
    ALERTS_UNAVAILABLE, DETAILED_FORECAST_UNAVAILABLE, FORECAST_UNAVAILABLE, NO_ACTIVE_ALERTS,
};
use waypoint_weather::{NwsClient, WeatherHandler};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn period(name: &str, temperature: i64) -> serde_json::Value {
    json!({
        "name": name,
        "temperature": temperature,
        "temperatureUnit": "F",
        "windSpeed": "10 mph",
        "windDirection": "NW",
        "detailedForecast": format!("{} forecast.", name)
    })
}

#[tokio::test]
async fn test_alerts_sends_nws_headers_and_formats() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alerts/active/area/CA"))
        .and(header("user-agent", "weather-app/1.0"))
        .and(header("accept", "application/geo+json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "features": [
                {"properties": {"event": "Heat Advisory", "areaDesc": "Fresno", "severity": "Moderate",
                                "description": "Hot.", "instruction": "Drink water."}},
                {"properties": {"event": "Wind Advisory"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = NwsClient::with_base_url(server.uri()).alerts("CA").await;
    let alerts: Vec<_> = text.split("\n---\n").collect();
    assert_eq!(alerts.len(), 2);
    assert!(alerts[0].contains("Event: Heat Advisory\nArea: Fresno\nSeverity: Moderate"));
    assert!(alerts[1].contains("Area: Unknown"));
}

#[tokio::test]
async fn test_alerts_empty_and_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alerts/active/area/NY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"features": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/alerts/active/area/ZZ"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = NwsClient::with_base_url(server.uri());
    assert_eq!(client.alerts("NY").await, NO_ACTIVE_ALERTS);
    assert_eq!(client.alerts("ZZ").await, ALERTS_UNAVAILABLE);
}

#[tokio::test]
async fn test_forecast_follows_points_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/points/37.7,-122.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {"forecast": format!("{}/gridpoints/MTR/85,105/forecast", server.uri())}
        })))
        .mount(&server)
        .await;

    let periods: Vec<_> = (0..7).map(|i| period(&format!("Period {}", i), 60 + i)).collect();
    Mock::given(method("GET"))
        .and(path("/gridpoints/MTR/85,105/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"properties": {"periods": periods}})))
        .mount(&server)
        .await;

    let text = NwsClient::with_base_url(server.uri()).forecast(37.7, -122.4).await;
    let sections: Vec<_> = text.split("\n---\n").collect();
    assert_eq!(sections.len(), 5);
    assert_eq!(
        sections[0],
        "\nPeriod 0:\nTemperature: 60°F\nWind: 10 mph NW\nForecast: Period 0 forecast.\n"
    );
    assert!(!text.contains("Period 5"));
}

#[tokio::test]
async fn test_forecast_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/points/1,1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {"forecast": format!("{}/gridpoints/broken", server.uri())}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gridpoints/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = NwsClient::with_base_url(server.uri());
    assert_eq!(client.forecast(1.0, 1.0).await, DETAILED_FORECAST_UNAVAILABLE);
    assert_eq!(client.forecast(2.0, 2.0).await, FORECAST_UNAVAILABLE);
}

#[tokio::test]
async fn test_handler_uppercases_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/alerts/active/area/TX"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"features": []})))
        .expect(1)
        .mount(&server)
        .await;

    let handler = WeatherHandler::new(NwsClient::with_base_url(server.uri()));
    let answer = handler.call_tool("get_alerts", json!({"state": " tx "})).await.unwrap();
    assert_eq!(answer, NO_ACTIVE_ALERTS);
}
