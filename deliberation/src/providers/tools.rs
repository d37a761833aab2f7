//! Tool execution interface, analyst toolsets, and a canned executor.
//!
//! Tool failures are non-fatal: the sub-loop encodes them as ordinary
//! message content so the model can self-correct or work around them.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::AnalystKind;

/// Declaration of a tool offered to the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Error from a tool execution. Never aborts the run.
#[derive(Debug, Clone, Error)]
#[error("tool '{tool}' failed: {message}")]
pub struct ToolError {
    pub tool: String,
    pub message: String,
}

impl ToolError {
    pub fn new(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Executes tool calls requested by the completion service.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: &serde_json::Value) -> Result<String, ToolError>;
}

fn ticker_date_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "ticker": { "type": "string", "description": "Ticker symbol" },
            "date": { "type": "string", "description": "Trade date, YYYY-MM-DD" }
        },
        "required": ["ticker"]
    })
}

/// The toolset offered to each analyst stage.
pub fn analyst_toolset(kind: AnalystKind) -> Vec<ToolSpec> {
    match kind {
        AnalystKind::Market => vec![
            ToolSpec::new(
                "price_history",
                "Daily OHLCV price history for the ticker up to the trade date",
                ticker_date_schema(),
            ),
            ToolSpec::new(
                "technical_indicators",
                "Technical indicator report (moving averages, MACD, RSI, Bollinger bands, ATR, VWMA)",
                ticker_date_schema(),
            ),
        ],
        AnalystKind::Sentiment => vec![ToolSpec::new(
            "social_sentiment",
            "Aggregated social media sentiment and discussion volume for the ticker",
            ticker_date_schema(),
        )],
        AnalystKind::News => vec![
            ToolSpec::new(
                "company_news",
                "Recent news coverage of the company",
                ticker_date_schema(),
            ),
            ToolSpec::new(
                "global_news",
                "Recent macroeconomic and world-affairs news relevant to trading",
                ticker_date_schema(),
            ),
        ],
        AnalystKind::Fundamentals => vec![
            ToolSpec::new(
                "fundamentals_report",
                "Company fundamentals: financial statements, cash flow, key ratios",
                ticker_date_schema(),
            ),
            ToolSpec::new(
                "insider_activity",
                "Recent insider transactions and insider sentiment",
                ticker_date_schema(),
            ),
        ],
    }
}

/// Canned tool executor: returns fixed text per tool name. Unknown tools
/// and explicitly-marked tools fail, which the sub-loop surfaces as
/// message content.
#[derive(Debug, Default)]
pub struct StaticToolExecutor {
    outputs: HashMap<String, String>,
    failing: HashSet<String>,
}

impl StaticToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned output for a tool.
    pub fn with_output(mut self, name: impl Into<String>, output: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), output.into());
        self
    }

    /// Mark a tool as always failing.
    pub fn with_failure(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }
}

#[async_trait]
impl ToolExecutor for StaticToolExecutor {
    async fn execute(&self, name: &str, _args: &serde_json::Value) -> Result<String, ToolError> {
        if self.failing.contains(name) {
            return Err(ToolError::new(name, "simulated failure"));
        }
        self.outputs
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::new(name, "unknown tool"))
    }
}

/// A canned executor covering every analyst toolset, for offline runs.
pub fn offline_toolkit(ticker: &str) -> StaticToolExecutor {
    StaticToolExecutor::new()
        .with_output(
            "price_history",
            format!("{}: 60 trading days of OHLCV, closing in a mild uptrend.", ticker),
        )
        .with_output(
            "technical_indicators",
            format!(
                "{}: price above the 50-day SMA, RSI 58, MACD histogram flattening.",
                ticker
            ),
        )
        .with_output(
            "social_sentiment",
            format!("{}: discussion volume elevated, tone mildly positive.", ticker),
        )
        .with_output(
            "company_news",
            format!("{}: quarterly results beat consensus; guidance unchanged.", ticker),
        )
        .with_output(
            "global_news",
            "Macro backdrop stable; rate expectations unchanged this week.".to_string(),
        )
        .with_output(
            "fundamentals_report",
            format!(
                "{}: revenue growth steady, gross margin flat, net cash position.",
                ticker
            ),
        )
        .with_output(
            "insider_activity",
            format!("{}: no notable insider transactions in the last quarter.", ticker),
        )
}
