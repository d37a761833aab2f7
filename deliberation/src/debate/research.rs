//! Research debate controller — alternates bull and bear to a verdict.

use std::time::Duration;

use crate::error::PipelineResult;
use crate::prompts;
use crate::providers::completion::{complete_text, CompletionClient};
use crate::providers::memory::{format_reflections, recall_or_empty, MemoryRecall};
use crate::state::{InvestmentDebateState, Message, ReportSection, ResearchSpeaker, SharedState};

/// Runs the bull/bear investment debate to completion, then has the
/// research manager synthesize the investment plan.
pub struct ResearchDebate<'a> {
    completion: &'a dyn CompletionClient,
    memory: &'a dyn MemoryRecall,
    max_rounds: u32,
    recall_matches: usize,
    call_timeout: Duration,
}

impl<'a> ResearchDebate<'a> {
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

    /// Select the next speaker from the transcript lengths: Bear speaks
    /// when the bull transcript is at least as long as the bear transcript.
    ///
    /// Note this keys on argument length, not turn order. With both sides
    /// producing one argument per turn the effect is plain alternation
    /// starting at Bear.
    pub fn next_speaker(debate: &InvestmentDebateState) -> ResearchSpeaker {
        if debate.bull_history.len() >= debate.bear_history.len() {
            ResearchSpeaker::Bear
        } else {
            ResearchSpeaker::Bull
        }
    }

    /// Run debate turns until the round limit, then the manager synthesis.
    /// Writes `reports.investment_plan` and returns once the plan is set.
    pub async fn run(&self, state: &mut SharedState) -> PipelineResult<()> {
        let turn_limit = 2 * self.max_rounds;

        while state.investment_debate.count < turn_limit {
            let speaker = Self::next_speaker(&state.investment_debate);
            let reflections = format_reflections(
                &recall_or_empty(self.memory, &state.situation(), self.recall_matches).await,
            );
            let prompt = match speaker {
                ResearchSpeaker::Bull => prompts::bull_researcher(state, &reflections),
                ResearchSpeaker::Bear => prompts::bear_researcher(state, &reflections),
            };

            let answer = complete_text(
                self.completion,
                speaker.label(),
                &[Message::user(prompt)],
                self.call_timeout,
            )
            .await?;

            let argument = format!("{}: {}", speaker.label(), answer);
            state.investment_debate.apply_turn(speaker, &argument);
            tracing::debug!(
                speaker = %speaker,
                turn = state.investment_debate.count,
                of = turn_limit,
                "research debate turn complete"
            );
        }

        self.synthesize(state).await
    }

    /// The research manager reads the whole debate and commits to a plan.
    async fn synthesize(&self, state: &mut SharedState) -> PipelineResult<()> {
        let reflections = format_reflections(
            &recall_or_empty(self.memory, &state.situation(), self.recall_matches).await,
        );
        let prompt = prompts::research_manager(state, &reflections);
        let plan = complete_text(
            self.completion,
            "research manager",
            &[Message::user(prompt)],
            self.call_timeout,
        )
        .await?;

        state.investment_debate.judge_decision = plan.clone();
        state.investment_debate.current_response = plan.clone();
        state.reports.set(ReportSection::InvestmentPlan, plan);
        tracing::info!(
            turns = state.investment_debate.count,
            "research debate resolved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::completion::ScriptedCompletionClient;
    use crate::providers::memory::NoopRecall;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn scripted_turns(turns: u32) -> ScriptedCompletionClient {
        // One response per debate turn plus the manager synthesis.
        let mut texts: Vec<String> = (0..turns).map(|i| format!("argument {}", i)).collect();
        texts.push("plan: buy".to_string());
        ScriptedCompletionClient::from_texts(
            &texts.iter().map(String::as_str).collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_first_speaker_is_bear_on_empty_histories() {
        let debate = InvestmentDebateState::default();
        assert_eq!(ResearchDebate::next_speaker(&debate), ResearchSpeaker::Bear);
    }

    #[test]
    fn test_speaker_flips_when_bear_history_longer() {
        let mut debate = InvestmentDebateState::default();
        debate.apply_turn(ResearchSpeaker::Bear, "Bear Researcher: a long opening argument");
        assert_eq!(ResearchDebate::next_speaker(&debate), ResearchSpeaker::Bull);
    }

    #[test]
    fn test_length_heuristic_follows_length_not_turn_order() {
        // A bear turn shorter than the existing bull transcript keeps the
        // next turn at Bear.
        let mut debate = InvestmentDebateState::default();
        debate.apply_turn(
            ResearchSpeaker::Bull,
            "Bull Researcher: an extremely long and thorough argument about growth",
        );
        debate.apply_turn(ResearchSpeaker::Bear, "Bear Researcher: no");
        assert_eq!(ResearchDebate::next_speaker(&debate), ResearchSpeaker::Bear);
    }

    #[tokio::test]
    async fn test_zero_rounds_goes_straight_to_manager() {
        let completion = scripted_turns(0);
        let controller = ResearchDebate::new(&completion, &NoopRecall, 0, 2, TIMEOUT);
        let mut state = SharedState::new("NVDA", "2026-08-07");

        controller.run(&mut state).await.unwrap();

        assert_eq!(state.investment_debate.count, 0);
        assert_eq!(state.reports.get(ReportSection::InvestmentPlan), "plan: buy");
        assert_eq!(state.investment_debate.judge_decision, "plan: buy");
        assert_eq!(completion.remaining(), 0);
    }

    #[tokio::test]
    async fn test_terminates_with_exactly_two_turns_per_round() {
        for rounds in [1u32, 3] {
            let completion = scripted_turns(2 * rounds);
            let controller = ResearchDebate::new(&completion, &NoopRecall, rounds, 2, TIMEOUT);
            let mut state = SharedState::new("NVDA", "2026-08-07");

            controller.run(&mut state).await.unwrap();

            assert_eq!(state.investment_debate.count, 2 * rounds);
            assert_eq!(completion.remaining(), 0);
            assert!(state.reports.is_set(ReportSection::InvestmentPlan));
        }
    }

    #[tokio::test]
    async fn test_turns_alternate_bear_then_bull() {
        let completion = scripted_turns(2);
        let controller = ResearchDebate::new(&completion, &NoopRecall, 1, 2, TIMEOUT);
        let mut state = SharedState::new("NVDA", "2026-08-07");

        controller.run(&mut state).await.unwrap();

        // First turn is Bear (equal empty histories), second is Bull.
        assert!(state.investment_debate.bear_history.contains("argument 0"));
        assert!(state.investment_debate.bull_history.contains("argument 1"));
        assert!(state
            .investment_debate
            .history
            .contains("Bear Researcher: argument 0"));
    }

    #[tokio::test]
    async fn test_transcripts_grow_monotonically() {
        let completion = scripted_turns(4);
        let controller = ResearchDebate::new(&completion, &NoopRecall, 2, 2, TIMEOUT);
        let mut state = SharedState::new("NVDA", "2026-08-07");
        controller.run(&mut state).await.unwrap();

        // All four turn arguments present in order.
        let history = &state.investment_debate.history;
        let positions: Vec<usize> = (0..4)
            .map(|i| history.find(&format!("argument {}", i)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_completion_failure_propagates() {
        let completion = ScriptedCompletionClient::failing();
        let controller = ResearchDebate::new(&completion, &NoopRecall, 1, 2, TIMEOUT);
        let mut state = SharedState::new("NVDA", "2026-08-07");
        let err = controller.run(&mut state).await.unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::Completion { .. }));
    }

    #[tokio::test]
    async fn test_recall_failure_does_not_abort_debate() {
        use async_trait::async_trait;
        use crate::providers::memory::{MemoryRecall, RecallError, RecallRecord};

        struct BrokenRecall;

        #[async_trait]
        impl MemoryRecall for BrokenRecall {
            async fn recall(
                &self,
                _situation: &str,
                _max_matches: usize,
            ) -> Result<Vec<RecallRecord>, RecallError> {
                Err(RecallError::new("backend down"))
            }
        }

        let completion = scripted_turns(2);
        let controller = ResearchDebate::new(&completion, &BrokenRecall, 1, 2, TIMEOUT);
        let mut state = SharedState::new("NVDA", "2026-08-07");
        controller.run(&mut state).await.unwrap();
        assert_eq!(state.investment_debate.count, 2);
    }
}
