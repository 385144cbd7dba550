//! Session driver integration tests
//!
//! Runs the driver against scripted model services and stub tool providers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use waypoint_core::session::{SessionConfig, SessionDriver};
use waypoint_core::tools::spec::convert_catalog;
use waypoint_core::tools::{ToolCallOutput, ToolDescriptor, ToolProvider, ToolRegistry, ToolSpecOptions, ToolSpecification};
use waypoint_core::{
    Calculator, ContentBlock, Error, Message, ModelService, ModelTurn, Result, Role, TokenUsage, ToolError,
    ToolResultStatus, ToolUse,
};

type Responder = Box<dyn Fn(&[Message]) -> Result<ModelTurn> + Send + Sync>;

/// What the model saw on one call
#[derive(Clone)]
struct Call {
    transcript: Vec<Message>,
    specs: Vec<ToolSpecification>,
    system_prompt: String,
}

/// Model service replaying scripted responses in order
struct ScriptedModel {
    responses: Mutex<VecDeque<Responder>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedModel {
    fn new(responses: Vec<Responder>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelService for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn generate_turn(
        &self,
        transcript: &[Message],
        tools: &[ToolSpecification],
        system_prompt: &str,
    ) -> Result<ModelTurn> {
        self.calls.lock().unwrap().push(Call {
            transcript: transcript.to_vec(),
            specs: tools.to_vec(),
            system_prompt: system_prompt.to_string(),
        });
        let responder = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("model called more times than scripted");
        responder(transcript)
    }
}

fn respond(f: impl Fn(&[Message]) -> Result<ModelTurn> + Send + Sync + 'static) -> Responder {
    Box::new(f)
}

fn reply(blocks: Vec<ContentBlock>) -> Responder {
    respond(move |_| Ok(ModelTurn::new(Message::assistant(blocks.clone())).with_usage(TokenUsage::new(10, 5))))
}

fn text(s: &str) -> ContentBlock {
    ContentBlock::Text(s.to_string())
}

fn tool_use(id: &str, name: &str, args: Value) -> ContentBlock {
    let arguments = match args {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ContentBlock::ToolUse(ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    })
}

/// Provider that echoes the tool name, failing the first `fail_first` calls
struct StubProvider {
    catalog: Vec<ToolDescriptor>,
    fail_first: usize,
    calls: AtomicUsize,
    report_error: bool,
}

impl StubProvider {
    fn new(catalog: Vec<ToolDescriptor>) -> Self {
        Self {
            catalog,
            fail_first: 0,
            calls: AtomicUsize::new(0),
            report_error: false,
        }
    }
}

#[async_trait]
impl ToolProvider for StubProvider {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.catalog.clone())
    }

    async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> std::result::Result<ToolCallOutput, ToolError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(ToolError::ExecutionFailed("connection reset".to_string()));
        }
        if self.report_error {
            return Ok(ToolCallOutput::error(format!("{} rejected the request", name)));
        }
        Ok(ToolCallOutput::text(format!("{} ok {}", name, Value::Object(arguments.clone()))))
    }
}

struct BrokenCatalog;

#[async_trait]
impl ToolProvider for BrokenCatalog {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Err(Error::Io(std::io::Error::other("server unreachable")))
    }

    async fn call_tool(&self, _: &str, _: &Map<String, Value>) -> std::result::Result<ToolCallOutput, ToolError> {
        unreachable!("no tools were discovered")
    }
}

fn weather_catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: "get_alerts".to_string(),
            description: "Get weather alerts for a US state.\n\nArgs:\n    state: Two-letter US state code (e.g. CA, NY)".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"state": {"type": "string"}},
                "required": ["state"]
            }),
        },
        ToolDescriptor {
            name: "get_forecast".to_string(),
            description: "Get weather forecast for a location.\n\nArgs:\n    latitude: North-south position\n    longitude: East-west position".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"latitude": {"type": "number"}, "longitude": {"type": "number"}},
                "required": ["latitude", "longitude"]
            }),
        },
    ]
}

#[test]
fn test_catalog_conversion_is_idempotent() {
    for backfill_descriptions in [true, false] {
        let options = ToolSpecOptions { backfill_descriptions };
        let first = convert_catalog(&weather_catalog(), options);
        let second = convert_catalog(&weather_catalog(), options);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    let with = convert_catalog(&weather_catalog(), ToolSpecOptions { backfill_descriptions: true });
    let without = convert_catalog(&weather_catalog(), ToolSpecOptions { backfill_descriptions: false });
    assert_eq!(with[1].input_schema.properties["longitude"].description, "longitude: East-west position");
    assert_eq!(without[1].input_schema.properties["longitude"].description, "");
}

#[tokio::test]
async fn test_prepare_tools_is_stable_across_calls() {
    let model = ScriptedModel::new(Vec::new());
    let driver = driver(model, Arc::new(StubProvider::new(weather_catalog())));
    let first = driver.prepare_tools().await.unwrap();
    let second = driver.prepare_tools().await.unwrap();
    assert_eq!(first, second);
}

fn driver(model: Arc<ScriptedModel>, tools: Arc<dyn ToolProvider>) -> SessionDriver {
    SessionDriver::new(model, tools, SessionConfig::default())
}

#[tokio::test]
async fn test_single_turn_without_tools() {
    let model = ScriptedModel::new(vec![reply(vec![text("Hello there.")])]);
    let outcome = driver(model.clone(), Arc::new(StubProvider::new(weather_catalog())))
        .run("Say hello")
        .await
        .unwrap();

    assert_eq!(outcome.turns, 1);
    assert_eq!(outcome.output, "Hello there.");
    assert_eq!(outcome.transcript.len(), 2);
    assert_eq!(outcome.transcript[0], Message::user_text("Say hello"));
    assert_eq!(model.calls().len(), 1);
    assert_eq!(model.calls()[0].system_prompt, SessionConfig::default().system_prompt);
}

#[tokio::test]
async fn test_tool_results_follow_assistant_turn_in_order() {
    let model = ScriptedModel::new(vec![
        reply(vec![
            text("Checking both."),
            tool_use("t-1", "get_alerts", json!({"state": "CA"})),
            tool_use("t-2", "get_forecast", json!({"latitude": 37.7, "longitude": -122.4})),
        ]),
        reply(vec![text("All quiet.")]),
    ]);
    let outcome = driver(model.clone(), Arc::new(StubProvider::new(weather_catalog())))
        .run("Weather in SF?")
        .await
        .unwrap();

    assert_eq!(outcome.turns, 2);
    assert_eq!(outcome.output, "Checking both.\nAll quiet.");

    let t = &outcome.transcript;
    assert_eq!(t.len(), 5);
    assert_eq!(t[1].role, Role::Assistant);
    assert!(t[1].has_tool_use());
    for (index, id) in [(2, "t-1"), (3, "t-2")] {
        assert_eq!(t[index].role, Role::User);
        let result = t[index].tool_results().next().unwrap();
        assert_eq!(result.tool_use_id, id);
        assert_eq!(result.status, ToolResultStatus::Success);
    }
    assert!(t[2].tool_results().next().unwrap().joined_text().starts_with("get_alerts ok"));
    assert_eq!(t[4].joined_text(), "All quiet.");

    // Second generation sees the whole history so far
    assert_eq!(model.calls()[1].transcript.len(), 4);
}

#[tokio::test]
async fn test_specs_are_identical_across_turns() {
    let model = ScriptedModel::new(vec![
        reply(vec![tool_use("t-1", "get_alerts", json!({"state": "TX"}))]),
        reply(vec![text("done")]),
    ]);
    driver(model.clone(), Arc::new(StubProvider::new(weather_catalog())))
        .run("alerts")
        .await
        .unwrap();

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].specs, calls[1].specs);
    assert_eq!(calls[0].specs.len(), 2);
}

#[tokio::test]
async fn test_longitude_description_is_backfilled() {
    let model = ScriptedModel::new(vec![reply(vec![text("ok")])]);
    driver(model.clone(), Arc::new(StubProvider::new(weather_catalog())))
        .run("forecast")
        .await
        .unwrap();

    let specs = &model.calls()[0].specs;
    let forecast = specs.iter().find(|s| s.name == "get_forecast").unwrap();
    assert_eq!(
        forecast.input_schema.properties["longitude"].description,
        "longitude: East-west position"
    );
}

#[tokio::test]
async fn test_failed_call_then_success() {
    let model = ScriptedModel::new(vec![
        reply(vec![tool_use("t-1", "get_alerts", json!({"state": "CA"}))]),
        reply(vec![tool_use("t-2", "get_alerts", json!({"state": "CA"}))]),
        reply(vec![text("Got it on the second try.")]),
    ]);
    let provider = StubProvider {
        fail_first: 1,
        ..StubProvider::new(weather_catalog())
    };
    let outcome = driver(model, Arc::new(provider)).run("alerts for CA").await.unwrap();

    let results: Vec<_> = outcome
        .transcript
        .iter()
        .flat_map(|m| m.tool_results())
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, ToolResultStatus::Error);
    assert!(results[0].joined_text().contains("connection reset"));
    assert!(results[0].joined_text().contains("get_alerts"));
    assert_eq!(results[1].status, ToolResultStatus::Success);
    assert_eq!(outcome.output, "Got it on the second try.");

    let alerts = outcome.metrics.tool("get_alerts").unwrap();
    assert_eq!(alerts.call_count, 2);
    assert_eq!(alerts.error_count, 1);
}

#[tokio::test]
async fn test_error_flagged_output_becomes_error_result() {
    let model = ScriptedModel::new(vec![
        reply(vec![tool_use("t-1", "get_alerts", json!({"state": "ZZ"}))]),
        reply(vec![text("That state does not exist.")]),
    ]);
    let provider = StubProvider {
        report_error: true,
        ..StubProvider::new(weather_catalog())
    };
    let outcome = driver(model, Arc::new(provider)).run("alerts for ZZ").await.unwrap();

    let result = outcome.transcript[2].tool_results().next().unwrap();
    assert!(result.is_error());
    assert_eq!(result.joined_text(), "get_alerts rejected the request");
}

#[tokio::test]
async fn test_calculator_scenario() {
    let model = ScriptedModel::new(vec![
        reply(vec![tool_use(
            "calc-1",
            "calculator",
            json!({"number1": 245, "number2": 25645, "operation": "add"}),
        )]),
        respond(|transcript: &[Message]| {
            let last = transcript.last().and_then(|m| m.tool_results().next()).unwrap();
            Ok(ModelTurn::new(Message::assistant_text(format!(
                "245 + 25645 = {}",
                last.joined_text()
            ))))
        }),
    ]);
    let registry = ToolRegistry::new().with_tool(Arc::new(Calculator::new()));
    let outcome = driver(model.clone(), Arc::new(registry))
        .run("Add 245 and 25645")
        .await
        .unwrap();

    assert_eq!(outcome.turns, 2);
    assert!(outcome.output.contains("25890"));
    assert_eq!(outcome.metrics.tools_used(), vec!["calculator"]);
    assert_eq!(model.calls()[0].specs[0].name, "calculator");
}

#[tokio::test]
async fn test_tool_only_turn_continues() {
    let model = ScriptedModel::new(vec![
        reply(vec![tool_use("t-1", "get_alerts", json!({"state": "WA"}))]),
        reply(vec![text("No alerts in WA.")]),
    ]);
    let outcome = driver(model, Arc::new(StubProvider::new(weather_catalog())))
        .run("alerts WA")
        .await
        .unwrap();

    assert_eq!(outcome.turns, 2);
    assert_eq!(outcome.output, "No alerts in WA.");
}

#[tokio::test]
async fn test_announce_tool_calls() {
    let model = ScriptedModel::new(vec![
        reply(vec![tool_use("t-1", "get_alerts", json!({"state": "WA"}))]),
        reply(vec![text("Done.")]),
    ]);
    let config = SessionConfig::default().with_announce_tool_calls(true);
    let outcome = SessionDriver::new(model, Arc::new(StubProvider::new(weather_catalog())), config)
        .run("alerts WA")
        .await
        .unwrap();

    assert_eq!(
        outcome.output,
        "Obtaining information from get_alerts with args {\"state\":\"WA\"}\nDone."
    );
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let model = ScriptedModel::new(vec![
        reply(vec![tool_use("t-1", "get_alerts", json!({"state": "CA"}))]),
        respond(|_| Err(Error::Model("throttled".to_string()))),
    ]);
    let err = driver(model.clone(), Arc::new(StubProvider::new(weather_catalog())))
        .run("alerts")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Model(m) if m == "throttled"));
    assert_eq!(model.calls().len(), 2);
}

#[tokio::test]
async fn test_non_assistant_turn_is_model_error() {
    let model = ScriptedModel::new(vec![respond(|_| Ok(ModelTurn::new(Message::user_text("echo"))))]);
    let err = driver(model, Arc::new(StubProvider::new(vec![])))
        .run("hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Model(_)));
}

#[tokio::test]
async fn test_discovery_failure_is_fatal() {
    let model = ScriptedModel::new(vec![]);
    let err = driver(model.clone(), Arc::new(BrokenCatalog)).run("hi").await.unwrap_err();

    assert!(matches!(err, Error::ToolDiscovery(m) if m.contains("server unreachable")));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_turn_limit() {
    let looping: Vec<Responder> = (0..3)
        .map(|i| reply(vec![tool_use(&format!("t-{}", i), "get_alerts", json!({"state": "CA"}))]))
        .collect();
    let model = ScriptedModel::new(looping);
    let config = SessionConfig::default().with_max_turns(Some(3));
    let err = SessionDriver::new(model.clone(), Arc::new(StubProvider::new(weather_catalog())), config)
        .run("loop forever")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MaxTurnsExceeded(3)));
    assert_eq!(model.calls().len(), 3);
}

#[tokio::test]
async fn test_empty_query_rejected() {
    let model = ScriptedModel::new(vec![]);
    let err = driver(model.clone(), Arc::new(StubProvider::new(vec![])))
        .run("   ")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_metrics_accumulate_across_turns() {
    let model = ScriptedModel::new(vec![
        reply(vec![tool_use("t-1", "get_alerts", json!({"state": "CA"}))]),
        reply(vec![text("done")]),
    ]);
    let outcome = driver(model, Arc::new(StubProvider::new(weather_catalog())))
        .run("alerts")
        .await
        .unwrap();

    let summary = outcome.metrics.summary();
    assert_eq!(summary.total_tokens, 30);
    assert_eq!(summary.tools_used, vec!["get_alerts"]);
    assert_eq!(outcome.metrics.cycle_durations.len(), 2);
}

/// Model that answers with the text of the first user message
struct EchoModel;

#[async_trait]
impl ModelService for EchoModel {
    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo"
    }

    async fn generate_turn(&self, transcript: &[Message], _: &[ToolSpecification], _: &str) -> Result<ModelTurn> {
        tokio::task::yield_now().await;
        Ok(ModelTurn::new(Message::assistant_text(transcript[0].joined_text())))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sessions_are_independent() {
    let driver = Arc::new(SessionDriver::new(
        Arc::new(EchoModel),
        Arc::new(StubProvider::new(vec![])),
        SessionConfig::default(),
    ));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let driver = driver.clone();
            tokio::spawn(async move { driver.run(&format!("query {}", i)).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.output, format!("query {}", i));
        assert_eq!(outcome.transcript.len(), 2);
    }
}
