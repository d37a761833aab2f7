//! Run configuration, supplied by the caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::state::{AnalystKind, ANALYST_PRIORITY};

/// Configuration for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Which analyst stages to run. Executed in fixed priority order
    /// regardless of the order given here; analysts not listed are skipped
    /// and their report sections stay absent.
    pub selected_analysts: Vec<AnalystKind>,
    /// Research debate rounds. One round is one bull turn plus one bear turn.
    pub max_debate_rounds: u32,
    /// Risk debate rounds. One round is one turn from each of the three roles.
    pub max_risk_discuss_rounds: u32,
    /// Cap on tool-request cycles within a single analyst stage.
    pub max_tool_iterations: u32,
    /// How many past reflections to recall per prompt.
    pub recall_matches: usize,
    /// Deadline for each completion-service or tool call, in seconds.
    pub call_timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            selected_analysts: ANALYST_PRIORITY.to_vec(),
            max_debate_rounds: 1,
            max_risk_discuss_rounds: 1,
            max_tool_iterations: 8,
            recall_matches: 2,
            call_timeout_secs: 120,
        }
    }
}

impl RunConfig {
    /// Check the configuration before a run starts.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_tool_iterations == 0 {
            return Err(PipelineError::config(
                "max_tool_iterations must be at least 1",
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(PipelineError::config("call_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    /// The selected analysts, deduplicated and in scheduling priority order.
    pub fn normalized_analysts(&self) -> Vec<AnalystKind> {
        ANALYST_PRIORITY
            .into_iter()
            .filter(|kind| self.selected_analysts.contains(kind))
            .collect()
    }

    /// The per-call deadline as a `Duration`.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
