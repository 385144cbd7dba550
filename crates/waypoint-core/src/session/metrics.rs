//! Per-session accounting: tokens, generation time, tool usage

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::provider::TokenUsage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolMetrics {
    pub call_count: u32,
    pub success_count: u32,
    pub error_count: u32,
    pub total_time: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionMetrics {
    pub usage: TokenUsage,
    /// Wall-clock time of each generation call, in order
    pub cycle_durations: Vec<Duration>,
    /// Tools in order of first use
    tool_metrics: Vec<(String, ToolMetrics)>,
}

impl SessionMetrics {
    pub fn record_generation(&mut self, usage: &TokenUsage, elapsed: Duration) {
        self.usage.add(usage);
        self.cycle_durations.push(elapsed);
    }

    pub fn record_tool_call(&mut self, name: &str, is_error: bool, elapsed: Duration) {
        let index = match self.tool_metrics.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.tool_metrics.push((name.to_string(), ToolMetrics::default()));
                self.tool_metrics.len() - 1
            }
        };

        let metrics = &mut self.tool_metrics[index].1;
        metrics.call_count += 1;
        if is_error {
            metrics.error_count += 1;
        } else {
            metrics.success_count += 1;
        }
        metrics.total_time += elapsed;
    }

    pub fn total_tokens(&self) -> u64 {
        self.usage.total_tokens
    }

    /// Cumulative wall-clock time across generation calls
    pub fn execution_time(&self) -> Duration {
        self.cycle_durations.iter().sum()
    }

    pub fn tools_used(&self) -> Vec<&str> {
        self.tool_metrics.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn tool(&self, name: &str) -> Option<&ToolMetrics> {
        self.tool_metrics
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, metrics)| metrics)
    }

    pub fn summary(&self) -> MetricsSummary {
        let seconds = self.execution_time().as_secs_f64();
        MetricsSummary {
            total_tokens: self.total_tokens(),
            execution_time: (seconds * 100.0).round() / 100.0,
            tools_used: self.tools_used().into_iter().map(str::to_string).collect(),
        }
    }
}

/// Compact report for callers (`/ask` responses, CLI output)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_tokens: u64,
    /// Seconds, rounded to two decimals
    pub execution_time: f64,
    pub tools_used: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let mut metrics = SessionMetrics::default();
        metrics.record_generation(&TokenUsage::new(100, 20), Duration::from_millis(1234));
        metrics.record_tool_call("get_forecast", false, Duration::from_millis(10));
        metrics.record_tool_call("get_alerts", true, Duration::from_millis(5));
        metrics.record_tool_call("get_forecast", false, Duration::from_millis(10));
        metrics.record_generation(&TokenUsage::new(150, 30), Duration::from_millis(1000));

        let summary = metrics.summary();
        assert_eq!(summary.total_tokens, 300);
        assert_eq!(summary.execution_time, 2.23);
        assert_eq!(summary.tools_used, vec!["get_forecast", "get_alerts"]);

        let forecast = metrics.tool("get_forecast").unwrap();
        assert_eq!(forecast.call_count, 2);
        assert_eq!(forecast.success_count, 2);
        assert_eq!(metrics.tool("get_alerts").unwrap().error_count, 1);
        assert!(metrics.tool("easter_egg").is_none());
    }
}
