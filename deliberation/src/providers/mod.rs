//! External collaborator interfaces.
//!
//! The orchestration core talks to the outside world through three narrow
//! traits — completion service, tool execution, and memory recall — each
//! shipped with deterministic in-process implementations so every run path
//! is exercisable offline.

pub mod completion;
pub mod memory;
pub mod tools;

pub use completion::{
    CompletionClient, CompletionError, CompletionResponse, OfflineCompletionClient,
    ScriptedCompletionClient,
};
pub use memory::{MemoryRecall, NoopRecall, RecallError, RecallRecord, SituationMemory};
pub use tools::{analyst_toolset, offline_toolkit, StaticToolExecutor, ToolError, ToolExecutor, ToolSpec};
