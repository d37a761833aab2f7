//! Staged deliberation engine for multi-agent trading analysis.
//!
//! A run walks one shared state object through a fixed sequence of stages:
//! selected analysts (each wrapped in a bounded tool-invocation sub-loop),
//! a bull/bear research debate, a trade proposal, and a three-way risk
//! debate ending in a final decision. The completion service, tools, and
//! memory recall are narrow trait interfaces with deterministic in-process
//! implementations, so the whole engine runs and tests offline.
//!
//! ```text
//! Pipeline ─► analysts (tool sub-loop) ─► research debate ─► trader ─► risk debate
//!                   │                            │               │           │
//!                   ▼                            ▼               ▼           ▼
//!              reports.{market,…}       investment_plan     trader_plan  final_decision
//! ```

pub mod config;
pub mod debate;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod state;
pub mod toolloop;

pub use config::RunConfig;
pub use debate::{ResearchDebate, RiskDebate};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{Pipeline, RunOutcome, Stage};
pub use providers::completion::{
    CompletionClient, CompletionError, CompletionResponse, OfflineCompletionClient,
    ScriptedCompletionClient,
};
pub use providers::memory::{
    format_reflections, recall_or_empty, MemoryRecall, NoopRecall, RecallError, RecallRecord,
    SituationMemory,
};
pub use providers::tools::{
    analyst_toolset, offline_toolkit, StaticToolExecutor, ToolError, ToolExecutor, ToolSpec,
};
pub use state::{
    AnalystKind, InvestmentDebateState, Message, ReportSection, Reports, ResearchSpeaker,
    RiskDebateState, RiskRole, RiskSpeaker, Role, SharedState, ToolCallRequest, ANALYST_PRIORITY,
};
pub use toolloop::ToolLoop;
