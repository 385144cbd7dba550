//! Session module - the tool-calling session driver
//!
//! ```text
//!   query ──▶ [user msg] ──▶ ModelService::generate_turn ──▶ assistant msg
//!                 ▲                                              │
//!                 │                          text ──▶ output     │
//!                 │                                              ▼
//!           tool results ◀── ToolProvider::call_tool ◀── tool uses?
//!                                                                │ none
//!                                                                ▼
//!                                                          SessionOutcome
//! ```

mod agent_loop;
pub mod metrics;
mod types;

pub use agent_loop::SessionDriver;
pub use metrics::{MetricsSummary, SessionMetrics, ToolMetrics};
pub use types::{DEFAULT_MAX_TURNS, SessionConfig, SessionOutcome, SessionState};
