//! Pipeline scheduler — total ordering of an analysis run.
//!
//! ```text
//! [selected analysts, priority order]
//!   Market ─► Sentiment ─► News ─► Fundamentals      (tool sub-loop each)
//!                                        │
//!                                        ▼
//!                               Research Debate ─► investment_plan
//!                                        │
//!                                        ▼
//!                                     Trader ─► trader_plan
//!                                        │
//!                                        ▼
//!                                  Risk Debate ─► final_decision
//! ```
//!
//! Execution is strictly staged: the scheduler owns the shared state and
//! lends it to exactly one stage at a time, blocking on each external call
//! before the next routing decision. Persistence and presentation are the
//! caller's concern; the scheduler only mutates `SharedState`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::debate::{ResearchDebate, RiskDebate};
use crate::error::PipelineResult;
use crate::prompts;
use crate::providers::completion::{complete_text, CompletionClient};
use crate::providers::memory::{format_reflections, recall_or_empty, MemoryRecall};
use crate::providers::tools::{analyst_toolset, ToolExecutor};
use crate::state::{AnalystKind, Message, ReportSection, SharedState};
use crate::toolloop::ToolLoop;

/// One unit of scheduled work, as recorded in the run's stage trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analyst(AnalystKind),
    ResearchDebate,
    Trader,
    RiskDebate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyst(kind) => write!(f, "{} analyst", kind),
            Self::ResearchDebate => write!(f, "research debate"),
            Self::Trader => write!(f, "trader"),
            Self::RiskDebate => write!(f, "risk debate"),
        }
    }
}

/// The completed run: final state plus the executed stage sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub state: SharedState,
    pub stages: Vec<Stage>,
}

/// Sequences analyst stages, the two debate controllers, and the two
/// decision stages into one end-to-end run.
pub struct Pipeline {
    completion: Arc<dyn CompletionClient>,
    tools: Arc<dyn ToolExecutor>,
    memory: Arc<dyn MemoryRecall>,
    config: RunConfig,
}

impl Pipeline {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        tools: Arc<dyn ToolExecutor>,
        memory: Arc<dyn MemoryRecall>,
        config: RunConfig,
    ) -> Self {
        Self {
            completion,
            tools,
            memory,
            config,
        }
    }

    /// Execute a full run for the given ticker and trade date.
    pub async fn run(&self, ticker: &str, trade_date: &str) -> PipelineResult<RunOutcome> {
        self.config.validate()?;

        let mut state = SharedState::new(ticker, trade_date);
        let mut stages = Vec::new();
        tracing::info!(run_id = %state.run_id, ticker, trade_date, "run started");

        for kind in self.config.normalized_analysts() {
            self.run_analyst(kind, &mut state).await?;
            stages.push(Stage::Analyst(kind));
        }

        ResearchDebate::new(
            self.completion.as_ref(),
            self.memory.as_ref(),
            self.config.max_debate_rounds,
            self.config.recall_matches,
            self.config.call_timeout(),
        )
        .run(&mut state)
        .await?;
        stages.push(Stage::ResearchDebate);

        self.run_trader(&mut state).await?;
        stages.push(Stage::Trader);

        RiskDebate::new(
            self.completion.as_ref(),
            self.memory.as_ref(),
            self.config.max_risk_discuss_rounds,
            self.config.recall_matches,
            self.config.call_timeout(),
        )
        .run(&mut state)
        .await?;
        stages.push(Stage::RiskDebate);

        tracing::info!(run_id = %state.run_id, stages = stages.len(), "run complete");
        Ok(RunOutcome { state, stages })
    }

    /// Run one analyst through its tool sub-loop on a fresh message context.
    async fn run_analyst(&self, kind: AnalystKind, state: &mut SharedState) -> PipelineResult<()> {
        let stage = format!("{} analyst", kind);
        tracing::info!(stage = %stage, "stage started");

        let toolset = analyst_toolset(kind);
        let system = prompts::analyst_system(kind, &state.ticker, &state.trade_date, &toolset);
        let opening = prompts::analyst_opening(&state.ticker, &state.trade_date);
        state.reset_messages();
        state.messages.push(Message::system(system));
        state.messages.push(Message::user(opening));

        let sub_loop = ToolLoop::new(
            self.completion.as_ref(),
            self.tools.as_ref(),
            self.config.max_tool_iterations,
            self.config.call_timeout(),
        );
        let report = sub_loop.run(&stage, &mut state.messages, &toolset).await?;

        state.reports.set(kind.report_section(), report);
        Ok(())
    }

    /// The trader proposes a concrete transaction from the investment plan.
    async fn run_trader(&self, state: &mut SharedState) -> PipelineResult<()> {
        tracing::info!(stage = "trader", "stage started");
        let reflections = format_reflections(
            &recall_or_empty(
                self.memory.as_ref(),
                &state.situation(),
                self.config.recall_matches,
            )
            .await,
        );

        let messages = vec![
            Message::system(prompts::trader_system(&reflections)),
            Message::user(prompts::trader_user(state)),
        ];
        let plan = complete_text(
            self.completion.as_ref(),
            "trader",
            &messages,
            self.config.call_timeout(),
        )
        .await?;

        state.reports.set(ReportSection::TraderPlan, plan);
        Ok(())
    }
}
