//! Tool-invocation sub-loop — drives one analyst stage to a final report.
//!
//! ```text
//! invoke ──► FinalAnswer(text) ──► report, stage advances
//!    ▲
//!    │       ToolRequest(calls) ──► execute each call,
//!    └────── append results as messages, re-invoke
//! ```
//!
//! Tool failures are encoded as message content rather than raised, so the
//! model can self-correct. The cycle is bounded: exceeding the iteration
//! cap fails the stage instead of looping forever.

use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};
use crate::providers::completion::{complete_with_deadline, CompletionClient, CompletionResponse};
use crate::providers::tools::{ToolExecutor, ToolSpec};
use crate::state::Message;

/// Bounded request/respond/execute cycle around a single analyst stage.
pub struct ToolLoop<'a> {
    completion: &'a dyn CompletionClient,
    tools: &'a dyn ToolExecutor,
    max_iterations: u32,
    call_timeout: Duration,
}

impl<'a> ToolLoop<'a> {
    pub fn new(
        completion: &'a dyn CompletionClient,
        tools: &'a dyn ToolExecutor,
        max_iterations: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            completion,
            tools,
            max_iterations,
            call_timeout,
        }
    }

    /// Run the stage to a final report. `messages` is the stage's working
    /// context; every completion response and tool result is appended to it.
    pub async fn run(
        &self,
        stage: &str,
        messages: &mut Vec<Message>,
        toolset: &[ToolSpec],
    ) -> PipelineResult<String> {
        let mut tool_rounds: u32 = 0;

        loop {
            let response = complete_with_deadline(
                self.completion,
                stage,
                messages,
                toolset,
                self.call_timeout,
            )
            .await?;

            match response {
                CompletionResponse::FinalAnswer(text) => {
                    messages.push(Message::assistant(text.clone()));
                    tracing::debug!(stage, tool_rounds, "analyst produced final report");
                    return Ok(text);
                }
                CompletionResponse::ToolRequest(calls) => {
                    if tool_rounds >= self.max_iterations {
                        return Err(PipelineError::tool_loop_exceeded(
                            stage,
                            self.max_iterations,
                        ));
                    }
                    tool_rounds += 1;
                    tracing::debug!(
                        stage,
                        round = tool_rounds,
                        calls = calls.len(),
                        "executing requested tools"
                    );

                    messages.push(Message::assistant_with_calls(calls.clone()));
                    for call in calls {
                        let content = self.execute_call(&call.name, &call.args).await;
                        messages.push(Message::tool(call.id, content));
                    }
                }
            }
        }
    }

    /// Execute one tool call under the per-call deadline, encoding any
    /// failure (including a deadline elapse) as result text.
    async fn execute_call(&self, name: &str, args: &serde_json::Value) -> String {
        match tokio::time::timeout(self.call_timeout, self.tools.execute(name, args)).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                tracing::warn!(tool = name, error = %err, "tool execution failed");
                err.to_string()
            }
            Err(_) => {
                tracing::warn!(tool = name, "tool execution timed out");
                format!(
                    "tool '{}' failed: timed out after {}s",
                    name,
                    self.call_timeout.as_secs()
                )
            }
        }
    }
}
