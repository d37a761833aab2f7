//! Memory recall — past decisions retrieved by similarity to the current
//! situation.
//!
//! Recall is a read-only side query: it enriches prompts and never touches
//! run state. Failures degrade to an empty result, equivalent to "no
//! reflections found". The in-process store scores by token overlap, a
//! deterministic stand-in for an embedding backend, so the orchestration is
//! fully testable without external services.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A recalled past decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallRecord {
    /// The stored situation that matched.
    pub situation: String,
    /// The recommendation recorded for that situation.
    pub recommendation: String,
    /// Similarity score in [0, 1].
    pub score: f64,
}

/// Error from a recall backend. Callers degrade this to an empty result.
#[derive(Debug, Clone, Error)]
#[error("memory recall failed: {message}")]
pub struct RecallError {
    pub message: String,
}

impl RecallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Read-only recall interface.
#[async_trait]
pub trait MemoryRecall: Send + Sync {
    /// Return up to `max_matches` records most similar to `situation`,
    /// best first, in stable order. An unknown situation yields an empty
    /// list, not an error.
    async fn recall(
        &self,
        situation: &str,
        max_matches: usize,
    ) -> Result<Vec<RecallRecord>, RecallError>;
}

/// Recall with the non-fatal degrade applied: a backend failure becomes an
/// empty result with a warning.
pub async fn recall_or_empty(
    memory: &dyn MemoryRecall,
    situation: &str,
    max_matches: usize,
) -> Vec<RecallRecord> {
    match memory.recall(situation, max_matches).await {
        Ok(records) => records,
        Err(err) => {
            tracing::warn!(error = %err, "memory recall failed; continuing without reflections");
            Vec::new()
        }
    }
}

/// Render recalled records for prompt inclusion.
pub fn format_reflections(records: &[RecallRecord]) -> String {
    if records.is_empty() {
        return "No past reflections found.".to_string();
    }
    records
        .iter()
        .map(|r| r.recommendation.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// In-process situation memory scored by token overlap (Jaccard).
///
/// Stores (situation, recommendation) pairs; recall ranks by overlap with
/// the query, dropping zero-overlap entries. Ties keep insertion order.
#[derive(Debug, Default)]
pub struct SituationMemory {
    entries: Vec<(String, String)>,
}

impl SituationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add situation/recommendation pairs.
    pub fn add_situations(&mut self, pairs: Vec<(String, String)>) {
        self.entries.extend(pairs);
    }

    /// Number of stored situations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A store seeded with a small playbook of market regimes, for
    /// offline demo runs.
    pub fn with_default_playbook() -> Self {
        let mut memory = Self::new();
        memory.add_situations(vec![
            (
                "High inflation with rising interest rates and declining consumer spending"
                    .to_string(),
                "Favor defensive sectors; review fixed-income duration.".to_string(),
            ),
            (
                "Tech sector volatility with institutional selling pressure".to_string(),
                "Trim high-growth tech exposure; prefer established names with strong cash flow."
                    .to_string(),
            ),
            (
                "Strong dollar pressuring emerging markets with forex volatility".to_string(),
                "Hedge currency exposure; reduce emerging-market debt allocation.".to_string(),
            ),
            (
                "Sector rotation under rising yields".to_string(),
                "Rebalance toward rate-beneficiary sectors; keep target allocations.".to_string(),
            ),
        ]);
        memory
    }
}

#[async_trait]
impl MemoryRecall for SituationMemory {
    async fn recall(
        &self,
        situation: &str,
        max_matches: usize,
    ) -> Result<Vec<RecallRecord>, RecallError> {
        let query = tokenize(situation);
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f64, &(String, String))> = self
            .entries
            .iter()
            .map(|entry| (overlap_score(&query, &tokenize(&entry.0)), entry))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_matches);

        Ok(scored
            .into_iter()
            .map(|(score, (situation, recommendation))| RecallRecord {
                situation: situation.clone(),
                recommendation: recommendation.clone(),
                score,
            })
            .collect())
    }
}

/// Recall that always returns nothing. Selected when no memory backend is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecall;

#[async_trait]
impl MemoryRecall for NoopRecall {
    async fn recall(
        &self,
        _situation: &str,
        _max_matches: usize,
    ) -> Result<Vec<RecallRecord>, RecallError> {
        Ok(Vec::new())
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

fn overlap_score(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}
