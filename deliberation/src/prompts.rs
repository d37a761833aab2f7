//! Prompt construction for every stage.
//!
//! Builders only assemble text; routing and state mutation live in the
//! controllers. Absent report sections read as empty strings here, never
//! as errors.

use crate::providers::tools::ToolSpec;
use crate::state::{AnalystKind, ReportSection, RiskRole, SharedState};

/// System prompt for an analyst stage.
pub fn analyst_system(
    kind: AnalystKind,
    ticker: &str,
    trade_date: &str,
    toolset: &[ToolSpec],
) -> String {
    let role = match kind {
        AnalystKind::Market => {
            "You are a market analyst. Select the most relevant technical indicators for the \
             current conditions, explain what each says about price action, and write a detailed, \
             nuanced report on the trend. Avoid a bare 'mixed signals' verdict."
        }
        AnalystKind::Sentiment => {
            "You are a social media sentiment analyst. Assess recent discussion volume and tone \
             around the company and write a detailed report on what public mood implies for \
             traders."
        }
        AnalystKind::News => {
            "You are a news analyst. Review recent company coverage and the macroeconomic \
             backdrop, and write a detailed report on developments relevant to trading decisions."
        }
        AnalystKind::Fundamentals => {
            "You are a fundamentals analyst. Review the company's financial statements, ratios, \
             and insider activity, and write a detailed report on its financial health."
        }
    };

    let tool_names: Vec<&str> = toolset.iter().map(|t| t.name.as_str()).collect();
    format!(
        "{}\n\nYou have access to the following tools: {}. Gather the data you need before \
         writing the report, then end with a Markdown table summarizing the key points.\n\n\
         The company under analysis is {}. The trade date is {}.",
        role,
        tool_names.join(", "),
        ticker,
        trade_date,
    )
}

/// Opening user message for an analyst stage's fresh context.
pub fn analyst_opening(ticker: &str, trade_date: &str) -> String {
    format!("Analyze {} as of {}.", ticker, trade_date)
}

fn report_block(state: &SharedState) -> String {
    format!(
        "Market research report: {}\nSocial media sentiment report: {}\nNews report: {}\n\
         Fundamentals report: {}",
        state.reports.get(ReportSection::Market),
        state.reports.get(ReportSection::Sentiment),
        state.reports.get(ReportSection::News),
        state.reports.get(ReportSection::Fundamentals),
    )
}

/// Prompt for the bull researcher's next argument.
pub fn bull_researcher(state: &SharedState, reflections: &str) -> String {
    let debate = &state.investment_debate;
    format!(
        "You are the Bull Researcher advocating investment in {ticker}. Build an evidence-based \
         case around growth potential, competitive advantages, and positive indicators. Engage \
         the bear's points directly and show why the bull view holds stronger merit; debate \
         conversationally rather than listing data.\n\n{reports}\n\nConversation history of the \
         debate: {history}\nLast bear argument: {opponent}\nReflections from similar situations \
         and lessons learned: {reflections}",
        ticker = state.ticker,
        reports = report_block(state),
        history = debate.history,
        opponent = debate.current_response,
        reflections = reflections,
    )
}

/// Prompt for the bear researcher's next argument.
pub fn bear_researcher(state: &SharedState, reflections: &str) -> String {
    let debate = &state.investment_debate;
    format!(
        "You are the Bear Researcher making the case against investing in {ticker}. Emphasize \
         risks, overvaluation, competitive threats, and negative indicators. Engage the bull's \
         points directly with specific data and reasoning; debate conversationally rather than \
         listing data.\n\n{reports}\n\nConversation history of the debate: {history}\nLast bull \
         argument: {opponent}\nReflections from similar situations and lessons learned: \
         {reflections}",
        ticker = state.ticker,
        reports = report_block(state),
        history = debate.history,
        opponent = debate.current_response,
        reflections = reflections,
    )
}

/// Prompt for the research manager's synthesis of the bull/bear debate.
pub fn research_manager(state: &SharedState, reflections: &str) -> String {
    format!(
        "As the research manager, summarize the key points of the bull/bear debate and commit to \
         a clear recommendation: Buy, Sell, or Hold. Do not default to Hold merely because both \
         sides have valid points. Then develop a detailed investment plan for the trader: the \
         recommendation, the rationale behind it, and concrete strategic actions. Take your past \
         mistakes on similar situations into account.\n\nPast reflections:\n\"{reflections}\"\n\n\
         Debate history:\n{history}",
        reflections = reflections,
        history = state.investment_debate.history,
    )
}

/// System prompt for the trader stage.
pub fn trader_system(reflections: &str) -> String {
    format!(
        "You are a trading agent. Analyze the proposed investment plan together with the analyst \
         reports and commit to a specific recommendation. End with a firm decision and always \
         conclude your response with 'FINAL TRANSACTION PROPOSAL: **BUY/HOLD/SELL**' to confirm \
         it. Use lessons from past decisions to avoid repeating mistakes. Reflections from \
         similar situations: {}",
        reflections,
    )
}

/// User message for the trader stage.
pub fn trader_user(state: &SharedState) -> String {
    format!(
        "Based on a comprehensive analysis by the analyst team, here is an investment plan for \
         {ticker}. Use it as the foundation for your next trading decision.\n\nProposed \
         investment plan: {plan}\n\n{reports}",
        ticker = state.ticker,
        plan = state.reports.get(ReportSection::InvestmentPlan),
        reports = report_block(state),
    )
}

/// Prompt for one risk-debate turn by the given role.
pub fn risk_debator(role: RiskRole, state: &SharedState) -> String {
    let debate = &state.risk_debate;
    let (stance, others) = match role {
        RiskRole::Risky => (
            "You are the Risky Analyst: champion high-reward opportunities and bold strategies. \
             Focus on upside and growth potential, and challenge where the cautious views miss \
             critical opportunities.",
            format!(
                "Last safe-analyst argument: {}\nLast neutral-analyst argument: {}",
                debate.current_safe_response, debate.current_neutral_response
            ),
        ),
        RiskRole::Safe => (
            "You are the Safe Analyst: protect assets, minimize volatility, and prioritize \
             stability. Scrutinize where the aggressive view underestimates downside exposure.",
            format!(
                "Last risky-analyst argument: {}\nLast neutral-analyst argument: {}",
                debate.current_risky_response, debate.current_neutral_response
            ),
        ),
        RiskRole::Neutral => (
            "You are the Neutral Analyst: weigh both upside and downside and argue for a \
             balanced, sustainable position. Challenge overreach on both sides.",
            format!(
                "Last risky-analyst argument: {}\nLast safe-analyst argument: {}",
                debate.current_risky_response, debate.current_safe_response
            ),
        ),
    };

    format!(
        "{stance} Respond directly to the other analysts' latest points; if they have not spoken \
         yet, present your own case without inventing their positions. Output conversationally, \
         without special formatting.\n\nHere is the trader's decision:\n{plan}\n\n{reports}\n\n\
         Current debate history: {history}\n{others}",
        stance = stance,
        plan = state.reports.get(ReportSection::TraderPlan),
        reports = report_block(state),
        history = debate.history,
        others = others,
    )
}

/// Prompt for the risk judge's final ruling.
pub fn risk_judge(state: &SharedState, reflections: &str) -> String {
    format!(
        "As the Risk Management Judge, evaluate the debate between the three risk analysts and \
         decide the best course of action: a clear Buy, Sell, or Hold recommendation — choose \
         Hold only if strongly justified, never as a fallback. Summarize the strongest points \
         from each analyst, support your ruling with direct quotes from the debate, and refine \
         the trader's plan accordingly. Learn from past mistakes so a wrong call is not \
         repeated.\n\nTrader's plan:\n{plan}\n\nPast reflections:\n\"{reflections}\"\n\n\
         Analysts' debate history:\n{history}",
        plan = state.reports.get(ReportSection::TraderPlan),
        reflections = reflections,
        history = state.risk_debate.history,
    )
}
