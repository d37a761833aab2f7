//! Shared run state — the single mutable record threaded through every stage.
//!
//! One `SharedState` exists per analysis run. The pipeline scheduler owns it
//! exclusively and lends it to one stage at a time; all mutation goes through
//! the `apply_*` methods so the transcript and counter invariants hold by
//! construction:
//!
//! - debate `count` fields only ever increase, by exactly 1 per turn
//! - transcripts are append-only (strict superstrings after each turn)
//! - a report section that was never written reads as the empty string

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message in a stage's working context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A structured tool invocation requested by the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Caller-assigned identifier, echoed back on the result message.
    pub id: String,
    /// Name of the tool to run.
    pub name: String,
    /// Free-form JSON arguments.
    pub args: serde_json::Value,
}

/// One turn in the working message context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Tool calls attached to an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// For tool turns: the id of the call this message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            call_id: None,
        }
    }

    /// Assistant turn that carries tool-call requests.
    pub fn assistant_with_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: calls,
            call_id: None,
        }
    }

    /// Tool-result turn answering the call with the given id.
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            call_id: Some(call_id.into()),
        }
    }
}

/// The analyst stages available to a run, in fixed priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalystKind {
    Market,
    Sentiment,
    News,
    Fundamentals,
}

/// Scheduling priority: market before sentiment before news before fundamentals.
pub const ANALYST_PRIORITY: [AnalystKind; 4] = [
    AnalystKind::Market,
    AnalystKind::Sentiment,
    AnalystKind::News,
    AnalystKind::Fundamentals,
];

impl AnalystKind {
    /// The report section this analyst writes.
    pub fn report_section(self) -> ReportSection {
        match self {
            Self::Market => ReportSection::Market,
            Self::Sentiment => ReportSection::Sentiment,
            Self::News => ReportSection::News,
            Self::Fundamentals => ReportSection::Fundamentals,
        }
    }
}

impl fmt::Display for AnalystKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Sentiment => write!(f, "sentiment"),
            Self::News => write!(f, "news"),
            Self::Fundamentals => write!(f, "fundamentals"),
        }
    }
}

impl FromStr for AnalystKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(Self::Market),
            "sentiment" | "social" => Ok(Self::Sentiment),
            "news" => Ok(Self::News),
            "fundamentals" => Ok(Self::Fundamentals),
            other => Err(format!(
                "unknown analyst '{}' (expected market, sentiment, news, or fundamentals)",
                other
            )),
        }
    }
}

/// The named report sections a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    Market,
    Sentiment,
    News,
    Fundamentals,
    InvestmentPlan,
    TraderPlan,
    FinalDecision,
}

impl ReportSection {
    /// Whether later writes may refine an already-written section.
    /// Only the final decision is progressively refined; every other
    /// section is written at most once per run.
    pub fn is_refinable(self) -> bool {
        matches!(self, Self::FinalDecision)
    }
}

impl fmt::Display for ReportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Sentiment => write!(f, "sentiment"),
            Self::News => write!(f, "news"),
            Self::Fundamentals => write!(f, "fundamentals"),
            Self::InvestmentPlan => write!(f, "investment_plan"),
            Self::TraderPlan => write!(f, "trader_plan"),
            Self::FinalDecision => write!(f, "final_decision"),
        }
    }
}

/// The per-run report map. Sections are absent until their stage runs;
/// an absent section reads as the empty string, never as an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reports {
    sections: BTreeMap<ReportSection, String>,
}

impl Reports {
    /// Read a section, treating absence as empty.
    pub fn get(&self, section: ReportSection) -> &str {
        self.sections
            .get(&section)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Whether a section has been written.
    pub fn is_set(&self, section: ReportSection) -> bool {
        self.sections.contains_key(&section)
    }

    /// Write a section. Set-once sections keep their first value; a second
    /// write is dropped with a warning. The final decision may be refined.
    pub fn set(&mut self, section: ReportSection, text: impl Into<String>) {
        if self.sections.contains_key(&section) && !section.is_refinable() {
            tracing::warn!(section = %section, "ignoring second write to set-once report section");
            return;
        }
        self.sections.insert(section, text.into());
    }

    /// Iterate the written sections in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (ReportSection, &str)> + '_ {
        self.sections.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Participant in the bull/bear investment debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchSpeaker {
    Bull,
    Bear,
}

impl ResearchSpeaker {
    /// Display label prefixed onto every argument this speaker produces.
    pub fn label(self) -> &'static str {
        match self {
            Self::Bull => "Bull Researcher",
            Self::Bear => "Bear Researcher",
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Self::Bull => Self::Bear,
            Self::Bear => Self::Bull,
        }
    }
}

impl fmt::Display for ResearchSpeaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// State of the bull/bear investment debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestmentDebateState {
    /// Full debate transcript, both sides interleaved.
    pub history: String,
    /// Bull-side transcript.
    pub bull_history: String,
    /// Bear-side transcript.
    pub bear_history: String,
    /// The most recent argument from either side.
    pub current_response: String,
    /// The research manager's synthesized verdict, once the debate ends.
    pub judge_decision: String,
    /// Completed debate turns. Increases by exactly 1 per turn.
    pub count: u32,
}

impl InvestmentDebateState {
    /// Record one completed debate turn for the given speaker.
    pub fn apply_turn(&mut self, speaker: ResearchSpeaker, argument: &str) {
        append_line(&mut self.history, argument);
        match speaker {
            ResearchSpeaker::Bull => append_line(&mut self.bull_history, argument),
            ResearchSpeaker::Bear => append_line(&mut self.bear_history, argument),
        }
        self.current_response = argument.to_string();
        self.count += 1;
    }
}

/// Active participant in the three-way risk debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRole {
    Risky,
    Safe,
    Neutral,
}

impl RiskRole {
    /// Display label prefixed onto every argument this role produces.
    pub fn label(self) -> &'static str {
        match self {
            Self::Risky => "Risky Analyst",
            Self::Safe => "Safe Analyst",
            Self::Neutral => "Neutral Analyst",
        }
    }
}

impl fmt::Display for RiskRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Who spoke last in the risk debate. `None` until the first turn;
/// `Judge` once the portfolio manager has ruled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSpeaker {
    #[default]
    None,
    Risky,
    Safe,
    Neutral,
    Judge,
}

impl From<RiskRole> for RiskSpeaker {
    fn from(role: RiskRole) -> Self {
        match role {
            RiskRole::Risky => Self::Risky,
            RiskRole::Safe => Self::Safe,
            RiskRole::Neutral => Self::Neutral,
        }
    }
}

impl fmt::Display for RiskSpeaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Risky => write!(f, "risky"),
            Self::Safe => write!(f, "safe"),
            Self::Neutral => write!(f, "neutral"),
            Self::Judge => write!(f, "judge"),
        }
    }
}

/// State of the three-way risk debate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskDebateState {
    /// Full debate transcript, all roles interleaved.
    pub history: String,
    pub risky_history: String,
    pub safe_history: String,
    pub neutral_history: String,
    /// Latest argument per role.
    pub current_risky_response: String,
    pub current_safe_response: String,
    pub current_neutral_response: String,
    /// Who spoke last; drives the rotation.
    pub latest_speaker: RiskSpeaker,
    /// The risk judge's verdict, once the debate ends.
    pub judge_decision: String,
    /// Completed debate turns. Increases by exactly 1 per turn.
    pub count: u32,
}

impl RiskDebateState {
    /// Record one completed debate turn for the given role.
    pub fn apply_turn(&mut self, role: RiskRole, argument: &str) {
        append_line(&mut self.history, argument);
        match role {
            RiskRole::Risky => {
                append_line(&mut self.risky_history, argument);
                self.current_risky_response = argument.to_string();
            }
            RiskRole::Safe => {
                append_line(&mut self.safe_history, argument);
                self.current_safe_response = argument.to_string();
            }
            RiskRole::Neutral => {
                append_line(&mut self.neutral_history, argument);
                self.current_neutral_response = argument.to_string();
            }
        }
        self.latest_speaker = role.into();
        self.count += 1;
    }
}

/// The single mutable record threaded through every stage of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedState {
    /// Unique identifier for this run.
    pub run_id: Uuid,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// Ticker under analysis. Immutable after creation.
    pub ticker: String,
    /// Trade date under analysis (YYYY-MM-DD). Immutable after creation.
    pub trade_date: String,
    /// Working message context of the currently active analyst stage.
    /// Reset to fresh at each analyst stage boundary.
    pub messages: Vec<Message>,
    /// Report sections produced so far.
    pub reports: Reports,
    pub investment_debate: InvestmentDebateState,
    pub risk_debate: RiskDebateState,
}

impl SharedState {
    /// Create the state for a fresh run.
    pub fn new(ticker: impl Into<String>, trade_date: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ticker: ticker.into(),
            trade_date: trade_date.into(),
            messages: Vec::new(),
            reports: Reports::default(),
            investment_debate: InvestmentDebateState::default(),
            risk_debate: RiskDebateState::default(),
        }
    }

    /// Drop the working message context ahead of a new analyst stage.
    pub fn reset_messages(&mut self) {
        self.messages.clear();
    }

    /// The situation descriptor used as the memory-recall key: the four
    /// analyst reports concatenated, absent sections reading as empty.
    pub fn situation(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\n{}",
            self.reports.get(ReportSection::Market),
            self.reports.get(ReportSection::Sentiment),
            self.reports.get(ReportSection::News),
            self.reports.get(ReportSection::Fundamentals),
        )
    }
}

fn append_line(transcript: &mut String, line: &str) {
    transcript.push('\n');
    transcript.push_str(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_empty() {
        let state = SharedState::new("NVDA", "2026-08-07");
        assert_eq!(state.ticker, "NVDA");
        assert_eq!(state.trade_date, "2026-08-07");
        assert!(state.messages.is_empty());
        assert_eq!(state.investment_debate.count, 0);
        assert_eq!(state.risk_debate.count, 0);
        assert_eq!(state.risk_debate.latest_speaker, RiskSpeaker::None);
    }

    #[test]
    fn test_absent_report_reads_empty() {
        let reports = Reports::default();
        assert_eq!(reports.get(ReportSection::Market), "");
        assert!(!reports.is_set(ReportSection::Market));
    }

    #[test]
    fn test_set_once_section_keeps_first_value() {
        let mut reports = Reports::default();
        reports.set(ReportSection::Market, "first");
        reports.set(ReportSection::Market, "second");
        assert_eq!(reports.get(ReportSection::Market), "first");
    }

    #[test]
    fn test_final_decision_is_refinable() {
        let mut reports = Reports::default();
        reports.set(ReportSection::FinalDecision, "draft");
        reports.set(ReportSection::FinalDecision, "refined");
        assert_eq!(reports.get(ReportSection::FinalDecision), "refined");
    }

    #[test]
    fn test_reports_iterate_in_stable_order() {
        let mut reports = Reports::default();
        reports.set(ReportSection::FinalDecision, "d");
        reports.set(ReportSection::Market, "m");
        let keys: Vec<ReportSection> = reports.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![ReportSection::Market, ReportSection::FinalDecision]
        );
    }

    #[test]
    fn test_investment_turn_appends_and_counts() {
        let mut debate = InvestmentDebateState::default();
        debate.apply_turn(ResearchSpeaker::Bear, "Bear Researcher: overvalued");
        assert_eq!(debate.count, 1);
        assert!(debate.history.contains("overvalued"));
        assert!(debate.bear_history.contains("overvalued"));
        assert!(debate.bull_history.is_empty());
        assert_eq!(debate.current_response, "Bear Researcher: overvalued");

        let before = debate.history.clone();
        debate.apply_turn(ResearchSpeaker::Bull, "Bull Researcher: growth ahead");
        assert_eq!(debate.count, 2);
        assert!(debate.history.starts_with(&before));
        assert!(debate.history.len() > before.len());
        assert!(debate.bull_history.contains("growth ahead"));
    }

    #[test]
    fn test_risk_turn_updates_role_fields() {
        let mut debate = RiskDebateState::default();
        debate.apply_turn(RiskRole::Risky, "Risky Analyst: go big");
        assert_eq!(debate.latest_speaker, RiskSpeaker::Risky);
        assert_eq!(debate.current_risky_response, "Risky Analyst: go big");
        assert!(debate.current_safe_response.is_empty());
        assert_eq!(debate.count, 1);

        debate.apply_turn(RiskRole::Safe, "Safe Analyst: hedge");
        assert_eq!(debate.latest_speaker, RiskSpeaker::Safe);
        assert_eq!(debate.count, 2);
        assert!(debate.history.contains("go big"));
        assert!(debate.history.contains("hedge"));
        assert!(debate.safe_history.contains("hedge"));
        assert!(!debate.risky_history.contains("hedge"));
    }

    #[test]
    fn test_risk_transcripts_are_superstrings() {
        let mut debate = RiskDebateState::default();
        let mut previous = String::new();
        for (role, text) in [
            (RiskRole::Risky, "a"),
            (RiskRole::Safe, "b"),
            (RiskRole::Neutral, "c"),
            (RiskRole::Risky, "d"),
        ] {
            debate.apply_turn(role, text);
            assert!(debate.history.starts_with(&previous));
            assert!(debate.history.len() > previous.len());
            previous = debate.history.clone();
        }
        assert_eq!(debate.count, 4);
    }

    #[test]
    fn test_situation_concatenates_reports_with_absent_as_empty() {
        let mut state = SharedState::new("NVDA", "2026-08-07");
        state.reports.set(ReportSection::Market, "uptrend");
        state.reports.set(ReportSection::News, "earnings beat");
        let situation = state.situation();
        assert!(situation.contains("uptrend"));
        assert!(situation.contains("earnings beat"));
        // Absent sentiment/fundamentals collapse to empty segments.
        assert_eq!(situation, "uptrend\n\n\n\nearnings beat\n\n");
    }

    #[test]
    fn test_reset_messages_clears_context() {
        let mut state = SharedState::new("NVDA", "2026-08-07");
        state.messages.push(Message::system("analyze"));
        state.messages.push(Message::user("NVDA"));
        state.reset_messages();
        assert!(state.messages.is_empty());
    }

    #[test]
    fn test_analyst_kind_parse_and_display() {
        assert_eq!("market".parse::<AnalystKind>().unwrap(), AnalystKind::Market);
        assert_eq!(
            "social".parse::<AnalystKind>().unwrap(),
            AnalystKind::Sentiment
        );
        assert_eq!(
            " Fundamentals ".parse::<AnalystKind>().unwrap(),
            AnalystKind::Fundamentals
        );
        assert!("quant".parse::<AnalystKind>().is_err());
        assert_eq!(AnalystKind::News.to_string(), "news");
        assert_eq!(AnalystKind::News.report_section(), ReportSection::News);
    }

    #[test]
    fn test_message_constructors() {
        let msg = Message::tool("call-1", "price: 182.44");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.call_id.as_deref(), Some("call-1"));

        let call = ToolCallRequest {
            id: "call-2".to_string(),
            name: "price_history".to_string(),
            args: serde_json::json!({"ticker": "NVDA"}),
        };
        let msg = Message::assistant_with_calls(vec![call]);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.tool_calls.len(), 1);
    }

    #[test]
    fn test_shared_state_serde_roundtrip() {
        let mut state = SharedState::new("NVDA", "2026-08-07");
        state.reports.set(ReportSection::Market, "uptrend");
        state
            .investment_debate
            .apply_turn(ResearchSpeaker::Bear, "Bear Researcher: stretched");
        state.risk_debate.apply_turn(RiskRole::Risky, "Risky Analyst: lever up");

        let json = serde_json::to_string(&state).unwrap();
        let restored: SharedState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.ticker, "NVDA");
        assert_eq!(restored.reports.get(ReportSection::Market), "uptrend");
        assert_eq!(restored.investment_debate.count, 1);
        assert_eq!(restored.risk_debate.latest_speaker, RiskSpeaker::Risky);
    }

    #[test]
    fn test_speaker_labels() {
        assert_eq!(ResearchSpeaker::Bull.label(), "Bull Researcher");
        assert_eq!(ResearchSpeaker::Bull.opponent(), ResearchSpeaker::Bear);
        assert_eq!(RiskRole::Neutral.label(), "Neutral Analyst");
        assert_eq!(RiskSpeaker::Judge.to_string(), "judge");
    }
}
