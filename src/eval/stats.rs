//! Batch statistics over evaluation records.

use super::record::EvaluationRecord;
use crate::llm::{
    COMPLETENESS_WEIGHT, CONTENT_ACCURACY_WEIGHT, RELEVANCE_WEIGHT, SOURCE_ACCURACY_WEIGHT,
};
use serde::{Deserialize, Serialize};

/// Final score at or above which a record counts as passed.
pub const PASS_THRESHOLD: f64 = 6.0;

/// Summary of one evaluated batch. Recomputed from the records, never stored alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total: usize,
    pub avg_source_accuracy: f64,
    pub avg_content_accuracy: f64,
    pub avg_completeness: f64,
    pub avg_relevance: f64,
    pub avg_final_score: f64,
    pub pass_count: usize,
    /// Percentage of records with `final_score >= PASS_THRESHOLD`.
    pub pass_rate: f64,
}

impl BatchStatistics {
    /// Compute statistics for a batch. An empty batch yields zeroed statistics.
    pub fn summarize(records: &[EvaluationRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let total = records.len();
        let n = total as f64;
        let mean = |f: fn(&EvaluationRecord) -> f64| records.iter().map(f).sum::<f64>() / n;
        let pass_count = records.iter().filter(|r| r.passed(PASS_THRESHOLD)).count();

        Self {
            total,
            avg_source_accuracy: mean(|r| r.source_accuracy_score),
            avg_content_accuracy: mean(|r| r.content_accuracy_score),
            avg_completeness: mean(|r| r.completeness_score),
            avg_relevance: mean(|r| r.relevance_score),
            avg_final_score: mean(|r| r.final_score),
            pass_count,
            pass_rate: pass_count as f64 / n * 100.0,
        }
    }

    /// Each dimension's share of the average composite score (`mean * weight`).
    pub fn weight_contributions(&self) -> [(&'static str, f64); 4] {
        [
            (
                "Source Accuracy",
                self.avg_source_accuracy * SOURCE_ACCURACY_WEIGHT,
            ),
            (
                "Content Accuracy",
                self.avg_content_accuracy * CONTENT_ACCURACY_WEIGHT,
            ),
            ("Completeness", self.avg_completeness * COMPLETENESS_WEIGHT),
            ("Relevance", self.avg_relevance * RELEVANCE_WEIGHT),
        ]
    }

    /// Print summary to stdout.
    pub fn print_summary(&self, title: &str) {
        println!("\n========== {} ==========", title);
        if self.total == 0 {
            println!("No evaluation results");
            println!("========================================\n");
            return;
        }
        println!("Total questions: {}", self.total);
        println!("----------------------------------------");
        println!("Avg final score:      {:.2}/10", self.avg_final_score);
        println!("Avg source accuracy:  {:.2}/10 (weight 60%)", self.avg_source_accuracy);
        println!("Avg content accuracy: {:.2}/10 (weight 20%)", self.avg_content_accuracy);
        println!("Avg completeness:     {:.2}/10 (weight 15%)", self.avg_completeness);
        println!("Avg relevance:        {:.2}/10 (weight 5%)", self.avg_relevance);
        println!("----------------------------------------");
        for (name, contribution) in self.weight_contributions() {
            println!("  {:<18} contributes {:.2}", name, contribution);
        }
        println!("----------------------------------------");
        println!(
            "Pass rate (>= {:.1}): {:.1}% ({}/{})",
            PASS_THRESHOLD, self.pass_rate, self.pass_count, self.total
        );
        println!("========================================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::record::{AnsweredRecord, QuestionRecord, ScoreRecord};

    fn record(final_score: f64) -> EvaluationRecord {
        let answered = AnsweredRecord::new(
            QuestionRecord {
                query: format!("q{final_score}"),
                standard_answer: String::new(),
                course: String::new(),
                material: String::new(),
                page_range: String::new(),
                question_type: String::new(),
            },
            "a",
        );
        EvaluationRecord::merge(
            answered,
            ScoreRecord {
                source_accuracy_score: final_score,
                content_accuracy_score: 10.0,
                completeness_score: 4.0,
                relevance_score: 2.0,
                final_score,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_summary_statistics() {
        let stats = BatchStatistics::summarize(&[record(5.0), record(7.0), record(9.0)]);

        assert_eq!(stats.total, 3);
        assert!((stats.avg_final_score - 7.0).abs() < 1e-9);
        assert!((stats.avg_source_accuracy - 7.0).abs() < 1e-9);
        assert!((stats.avg_content_accuracy - 10.0).abs() < 1e-9);
        assert_eq!(stats.pass_count, 2);
        assert!((stats.pass_rate - 66.666_666).abs() < 1e-3);
        assert_eq!(format!("{:.1}", stats.pass_rate), "66.7");
    }

    #[test]
    fn test_empty_batch_is_zeroed() {
        let stats = BatchStatistics::summarize(&[]);
        assert_eq!(stats, BatchStatistics::default());
        assert_eq!(stats.pass_rate, 0.0);
    }

    #[test]
    fn test_pass_threshold_is_inclusive() {
        let stats = BatchStatistics::summarize(&[record(6.0), record(5.99)]);
        assert_eq!(stats.pass_count, 1);
        assert!((stats.pass_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_weight_contributions() {
        let stats = BatchStatistics::summarize(&[record(5.0)]);
        let contributions = stats.weight_contributions();
        assert!((contributions[0].1 - 3.0).abs() < 1e-9);
        assert!((contributions[1].1 - 2.0).abs() < 1e-9);
        assert!((contributions[2].1 - 0.6).abs() < 1e-9);
        assert!((contributions[3].1 - 0.1).abs() < 1e-9);
    }
}
