//! Completion-service interface and deterministic implementations.
//!
//! A completion call either yields a final answer or requests tool
//! invocations; the two outcomes are modeled as an explicit two-variant
//! type rather than an attribute-presence check. Completion failures are
//! fatal to the run and propagate to the caller.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{PipelineError, PipelineResult};
use crate::state::{Message, Role, ToolCallRequest};
use crate::providers::tools::ToolSpec;

/// Outcome of one completion-service invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompletionResponse {
    /// The model produced its final text; the stage can conclude.
    FinalAnswer(String),
    /// The model wants one or more tools run before it answers.
    ToolRequest(Vec<ToolCallRequest>),
}

/// Error from a completion provider. Always fatal to the run.
#[derive(Debug, Clone, Error)]
#[error("completion provider '{provider}' failed: {message}")]
pub struct CompletionError {
    pub provider: String,
    pub message: String,
}

impl CompletionError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// The completion service. Called synchronously (awaited) once per turn;
/// the orchestration never runs two invocations concurrently.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<CompletionResponse, CompletionError>;
}

/// Invoke the completion service under the per-call deadline, mapping
/// provider failures and elapsed deadlines to fatal pipeline errors.
pub(crate) async fn complete_with_deadline(
    client: &dyn CompletionClient,
    stage: &str,
    messages: &[Message],
    tools: &[ToolSpec],
    deadline: Duration,
) -> PipelineResult<CompletionResponse> {
    match tokio::time::timeout(deadline, client.invoke(messages, tools)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) => Err(PipelineError::completion(stage, err.to_string())),
        Err(_) => Err(PipelineError::timeout(stage, deadline)),
    }
}

/// Invoke a tool-less completion and require a final answer. Debate turns
/// and decision stages have no toolset, so a tool request from them is a
/// protocol violation.
pub(crate) async fn complete_text(
    client: &dyn CompletionClient,
    stage: &str,
    messages: &[Message],
    deadline: Duration,
) -> PipelineResult<String> {
    match complete_with_deadline(client, stage, messages, &[], deadline).await? {
        CompletionResponse::FinalAnswer(text) => Ok(text),
        CompletionResponse::ToolRequest(calls) => Err(PipelineError::completion(
            stage,
            format!(
                "unexpected tool request ({} calls) from a tool-less invocation",
                calls.len()
            ),
        )),
    }
}

/// Scripted completion client for tests: pops canned responses in FIFO
/// order. An exhausted script is an error so miscounted tests fail loudly.
pub struct ScriptedCompletionClient {
    script: Mutex<VecDeque<CompletionResponse>>,
    fail: bool,
}

impl ScriptedCompletionClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            fail: false,
        }
    }

    /// Convenience: a script of plain final answers.
    pub fn from_texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|t| CompletionResponse::FinalAnswer(t.to_string()))
                .collect(),
        )
    }

    /// A client whose every invocation fails.
    pub fn failing() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fail: true,
        }
    }

    /// Responses left in the script.
    pub fn remaining(&self) -> usize {
        self.script.lock().expect("script mutex poisoned").len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn invoke(
        &self,
        _messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<CompletionResponse, CompletionError> {
        if self.fail {
            return Err(CompletionError::new("scripted", "simulated failure"));
        }
        self.script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .ok_or_else(|| CompletionError::new("scripted", "script exhausted"))
    }
}

/// Deterministic offline completion client for credential-less runs.
///
/// Analyst invocations get one round of tool calls (one per tool in the
/// stage's toolset) followed by a digest of the gathered results; tool-less
/// invocations get a digest of the prompt. When the prompt demands the
/// trader's closing marker, the answer carries it.
#[derive(Debug, Clone, Default)]
pub struct OfflineCompletionClient;

impl OfflineCompletionClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionClient for OfflineCompletionClient {
    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<CompletionResponse, CompletionError> {
        let has_tool_results = messages.iter().any(|m| m.role == Role::Tool);
        if !tools.is_empty() && !has_tool_results {
            let calls = tools
                .iter()
                .enumerate()
                .map(|(i, spec)| ToolCallRequest {
                    id: format!("call-{}", i),
                    name: spec.name.clone(),
                    args: serde_json::json!({}),
                })
                .collect();
            return Ok(CompletionResponse::ToolRequest(calls));
        }

        let source = messages
            .iter()
            .rev()
            .find(|m| m.role != Role::Tool && !m.content.is_empty())
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let tool_results = messages.iter().filter(|m| m.role == Role::Tool).count();

        let mut text = if tool_results > 0 {
            format!(
                "Synthesized from {} tool result(s). Basis: {}",
                tool_results,
                head(source, 160)
            )
        } else {
            format!("Offline assessment. Basis: {}", head(source, 160))
        };

        if messages
            .iter()
            .any(|m| m.content.contains("FINAL TRANSACTION PROPOSAL"))
        {
            text.push_str("\n\nFINAL TRANSACTION PROPOSAL: **HOLD**");
        }

        Ok(CompletionResponse::FinalAnswer(text))
    }
}

fn head(s: &str, max_chars: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let clipped: String = flat.chars().take(max_chars).collect();
        format!("{}...", clipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tools::analyst_toolset;
    use crate::state::AnalystKind;

    #[tokio::test]
    async fn test_scripted_pops_in_order() {
        let client = ScriptedCompletionClient::from_texts(&["one", "two"]);
        let first = client.invoke(&[], &[]).await.unwrap();
        assert!(matches!(first, CompletionResponse::FinalAnswer(t) if t == "one"));
        assert_eq!(client.remaining(), 1);
        let second = client.invoke(&[], &[]).await.unwrap();
        assert!(matches!(second, CompletionResponse::FinalAnswer(t) if t == "two"));
    }

    #[tokio::test]
    async fn test_scripted_exhaustion_is_an_error() {
        let client = ScriptedCompletionClient::from_texts(&[]);
        let err = client.invoke(&[], &[]).await.unwrap_err();
        assert!(err.to_string().contains("script exhausted"));
    }

    #[tokio::test]
    async fn test_scripted_failing_client() {
        let client = ScriptedCompletionClient::failing();
        let err = client.invoke(&[], &[]).await.unwrap_err();
        assert!(err.to_string().contains("simulated failure"));
    }

    #[tokio::test]
    async fn test_offline_requests_tools_once_then_answers() {
        let client = OfflineCompletionClient::new();
        let toolset = analyst_toolset(AnalystKind::Market);
        let mut messages = vec![Message::user("Analyze NVDA")];

        let response = client.invoke(&messages, &toolset).await.unwrap();
        let calls = match response {
            CompletionResponse::ToolRequest(calls) => calls,
            other => panic!("expected tool request, got {:?}", other),
        };
        assert_eq!(calls.len(), toolset.len());

        for call in &calls {
            messages.push(Message::tool(call.id.clone(), "canned output"));
        }
        let response = client.invoke(&messages, &toolset).await.unwrap();
        match response {
            CompletionResponse::FinalAnswer(text) => {
                assert!(text.contains("tool result"));
            }
            other => panic!("expected final answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_offline_adds_trader_marker() {
        let client = OfflineCompletionClient::new();
        let messages = vec![Message::system(
            "Always conclude with 'FINAL TRANSACTION PROPOSAL: **BUY/HOLD/SELL**'.",
        )];
        let response = client.invoke(&messages, &[]).await.unwrap();
        match response {
            CompletionResponse::FinalAnswer(text) => {
                assert!(text.contains("FINAL TRANSACTION PROPOSAL"));
            }
            other => panic!("expected final answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_text_rejects_tool_request() {
        let client = ScriptedCompletionClient::new(vec![CompletionResponse::ToolRequest(vec![
            ToolCallRequest {
                id: "call-0".to_string(),
                name: "price_history".to_string(),
                args: serde_json::json!({}),
            },
        ])]);
        let err = complete_text(&client, "trader", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Completion { .. }));
        assert!(err.to_string().contains("unexpected tool request"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses_as_timeout_error() {
        struct StalledClient;

        #[async_trait]
        impl CompletionClient for StalledClient {
            async fn invoke(
                &self,
                _messages: &[Message],
                _tools: &[ToolSpec],
            ) -> Result<CompletionResponse, CompletionError> {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(CompletionResponse::FinalAnswer("too late".to_string()))
            }
        }

        let err = complete_text(&StalledClient, "trader", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::Timeout {
                stage: "trader".to_string(),
                timeout_secs: 1
            }
        );
    }

    #[test]
    fn test_head_clips_and_flattens() {
        assert_eq!(head("a  b\nc", 10), "a b c");
        let long = "word ".repeat(100);
        assert!(head(&long, 20).ends_with("..."));
    }
}
