//! Records flowing through the answer and judge stages.

use crate::llm::{
    COMPLETENESS_WEIGHT, CONTENT_ACCURACY_WEIGHT, RELEVANCE_WEIGHT, SOURCE_ACCURACY_WEIGHT,
};
use serde::{Deserialize, Serialize};

/// Maximum agent answer length kept, in characters.
pub const MAX_ANSWER_CHARS: usize = 1000;

/// A benchmark question with its reference answer and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub standard_answer: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub page_range: String,
    #[serde(default)]
    pub question_type: String,
}

/// A question together with the agent's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredRecord {
    #[serde(flatten)]
    pub question: QuestionRecord,
    #[serde(default)]
    pub agent_answer: String,
}

impl AnsweredRecord {
    /// Attach an answer, truncating it to [`MAX_ANSWER_CHARS`].
    pub fn new(question: QuestionRecord, agent_answer: impl Into<String>) -> Self {
        Self {
            question,
            agent_answer: truncate_chars(agent_answer.into(), MAX_ANSWER_CHARS),
        }
    }
}

/// Cut `text` down to at most `max` characters on a char boundary.
pub fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max) {
        text.truncate(byte_idx);
    }
    text
}

/// Scores and reasoning produced by the judge for one answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub source_accuracy_score: f64,
    pub content_accuracy_score: f64,
    pub completeness_score: f64,
    pub relevance_score: f64,
    pub final_score: f64,
    #[serde(default)]
    pub source_accuracy_reasoning: String,
    #[serde(default)]
    pub content_accuracy_reasoning: String,
    #[serde(default)]
    pub completeness_reasoning: String,
    #[serde(default)]
    pub relevance_reasoning: String,
    #[serde(default)]
    pub overall_reasoning: String,
}

impl ScoreRecord {
    /// Zero-score record carrying the failure cause in `source_accuracy_reasoning`.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            source_accuracy_reasoning: reason.into(),
            ..Default::default()
        }
    }

    /// Composite score from the four sub-scores.
    pub fn weighted_final(&self) -> f64 {
        self.source_accuracy_score * SOURCE_ACCURACY_WEIGHT
            + self.content_accuracy_score * CONTENT_ACCURACY_WEIGHT
            + self.completeness_score * COMPLETENESS_WEIGHT
            + self.relevance_score * RELEVANCE_WEIGHT
    }

    /// Replace the judge's self-reported final score with the weighted sum.
    pub fn with_recomputed_final(mut self) -> Self {
        let computed = self.weighted_final();
        if (computed - self.final_score).abs() > 0.05 {
            tracing::debug!(
                reported = self.final_score,
                computed,
                "Judge final score disagrees with weighted sum"
            );
        }
        self.final_score = computed;
        self
    }
}

/// Persisted unit: answered record plus its scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub query: String,
    pub standard_answer: String,
    #[serde(rename = "standard_page_range")]
    pub page_range: String,
    pub agent_answer: String,
    pub source_accuracy_score: f64,
    pub content_accuracy_score: f64,
    pub completeness_score: f64,
    pub relevance_score: f64,
    pub final_score: f64,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub question_type: String,
    #[serde(default)]
    pub source_accuracy_reasoning: String,
    #[serde(default)]
    pub content_accuracy_reasoning: String,
    #[serde(default)]
    pub completeness_reasoning: String,
    #[serde(default)]
    pub relevance_reasoning: String,
    #[serde(default)]
    pub overall_reasoning: String,
}

impl EvaluationRecord {
    /// Flatten an answered record and its scores, carrying provenance verbatim.
    pub fn merge(answered: AnsweredRecord, score: ScoreRecord) -> Self {
        let AnsweredRecord {
            question,
            agent_answer,
        } = answered;

        Self {
            query: question.query,
            standard_answer: question.standard_answer,
            page_range: question.page_range,
            agent_answer,
            source_accuracy_score: score.source_accuracy_score,
            content_accuracy_score: score.content_accuracy_score,
            completeness_score: score.completeness_score,
            relevance_score: score.relevance_score,
            final_score: score.final_score,
            course: question.course,
            material: question.material,
            question_type: question.question_type,
            source_accuracy_reasoning: score.source_accuracy_reasoning,
            content_accuracy_reasoning: score.content_accuracy_reasoning,
            completeness_reasoning: score.completeness_reasoning,
            relevance_reasoning: score.relevance_reasoning,
            overall_reasoning: score.overall_reasoning,
        }
    }

    /// Zero-score record for an item whose pipeline failed.
    pub fn fallback(answered: AnsweredRecord, reason: impl Into<String>) -> Self {
        Self::merge(answered, ScoreRecord::fallback(reason))
    }

    /// Whether this record reaches the pass threshold.
    pub fn passed(&self, threshold: f64) -> bool {
        self.final_score >= threshold
    }
}
