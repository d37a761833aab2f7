//! Risk debate controller — rotates three risk stances to a final ruling.

use std::time::Duration;

use crate::error::PipelineResult;
use crate::prompts;
use crate::providers::completion::{complete_text, CompletionClient};
use crate::providers::memory::{format_reflections, recall_or_empty, MemoryRecall};
use crate::state::{Message, ReportSection, RiskRole, RiskSpeaker, SharedState};

/// Runs the three-way (Risky/Safe/Neutral) risk debate to completion, then
/// has the risk judge write the final decision.
pub struct RiskDebate<'a> {
    completion: &'a dyn CompletionClient,
    memory: &'a dyn MemoryRecall,
    max_rounds: u32,
    recall_matches: usize,
    call_timeout: Duration,
}

impl<'a> RiskDebate<'a> {
    pub fn new(
        completion: &'a dyn CompletionClient,
        memory: &'a dyn MemoryRecall,
        max_rounds: u32,
        recall_matches: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            completion,
            memory,
            max_rounds,
            recall_matches,
            call_timeout,
        }
    }

    /// Explicit rotation: Risky → Safe → Neutral → Risky. Any speaker other
    /// than Risky or Safe — including the initial unset state — routes to
    /// Risky.
    pub fn next_role(latest: RiskSpeaker) -> RiskRole {
        match latest {
            RiskSpeaker::Risky => RiskRole::Safe,
            RiskSpeaker::Safe => RiskRole::Neutral,
            _ => RiskRole::Risky,
        }
    }

    /// Run debate turns until the round limit, then the judge's ruling.
    /// Writes `reports.final_decision` and returns once the ruling is set.
    pub async fn run(&self, state: &mut SharedState) -> PipelineResult<()> {
        let turn_limit = 3 * self.max_rounds;

        while state.risk_debate.count < turn_limit {
            let role = Self::next_role(state.risk_debate.latest_speaker);
            let prompt = prompts::risk_debator(role, state);

            let answer = complete_text(
                self.completion,
                role.label(),
                &[Message::user(prompt)],
                self.call_timeout,
            )
            .await?;

            let argument = format!("{}: {}", role.label(), answer);
            state.risk_debate.apply_turn(role, &argument);
            tracing::debug!(
                role = %role,
                turn = state.risk_debate.count,
                of = turn_limit,
                "risk debate turn complete"
            );
        }

        self.judge(state).await
    }

    /// The risk judge reads the trader's plan and the whole debate, then
    /// rules Buy, Sell, or Hold.
    async fn judge(&self, state: &mut SharedState) -> PipelineResult<()> {
        let reflections = format_reflections(
            &recall_or_empty(self.memory, &state.situation(), self.recall_matches).await,
        );
        let prompt = prompts::risk_judge(state, &reflections);
        let decision = complete_text(
            self.completion,
            "risk judge",
            &[Message::user(prompt)],
            self.call_timeout,
        )
        .await?;

        state.risk_debate.judge_decision = decision.clone();
        state.risk_debate.latest_speaker = RiskSpeaker::Judge;
        state.reports.set(ReportSection::FinalDecision, decision);
        tracing::info!(turns = state.risk_debate.count, "risk debate resolved");
        Ok(())
    }
}
