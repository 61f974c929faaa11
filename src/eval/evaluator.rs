//! Concurrent judge evaluation of answered records.

use super::judge::JudgeClient;
use super::parser::parse_judge_response;
use super::pool::{PoolOptions, run_bounded};
use super::progress::ProgressObserver;
use super::record::{AnsweredRecord, EvaluationRecord, ScoreRecord};
use crate::config::JudgeEvaluationConfig;
use crate::error::Result;
use crate::llm::{ChatModel, build_judge_prompt};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a judge batch.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Concurrent judge calls.
    pub workers: usize,
    /// Replace the judge's final score with the weighted sum of sub-scores.
    pub recompute_final_score: bool,
    /// Deadline for the whole batch.
    pub batch_timeout: Option<Duration>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            recompute_final_score: true,
            batch_timeout: None,
        }
    }
}

impl From<&JudgeEvaluationConfig> for EvaluatorConfig {
    fn from(config: &JudgeEvaluationConfig) -> Self {
        Self {
            workers: config.workers,
            recompute_final_score: config.recompute_final_score,
            batch_timeout: config.batch_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Fans answered records out to the judge and collects one evaluation per record.
pub struct Evaluator<M> {
    judge: Arc<JudgeClient<M>>,
    config: EvaluatorConfig,
}

impl<M: ChatModel + 'static> Evaluator<M> {
    pub fn new(judge: JudgeClient<M>, config: EvaluatorConfig) -> Self {
        Self {
            judge: Arc::new(judge),
            config,
        }
    }

    /// Judge a single record. Never fails: errors become a fallback record.
    pub async fn evaluate_one(&self, record: AnsweredRecord) -> EvaluationRecord {
        evaluate_record(&self.judge, record, self.config.recompute_final_score).await
    }

    /// Judge every record, returning exactly one evaluation per input in
    /// completion order.
    pub async fn evaluate_batch(
        &self,
        records: Vec<AnsweredRecord>,
        observer: &dyn ProgressObserver<EvaluationRecord>,
    ) -> Vec<EvaluationRecord> {
        self.evaluate_indexed(records, observer)
            .await
            .into_iter()
            .map(|(_, record)| record)
            .collect()
    }

    /// Like [`Evaluator::evaluate_batch`], but in input order.
    pub async fn evaluate_batch_ordered(
        &self,
        records: Vec<AnsweredRecord>,
        observer: &dyn ProgressObserver<EvaluationRecord>,
    ) -> Vec<EvaluationRecord> {
        let mut indexed = self.evaluate_indexed(records, observer).await;
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, record)| record).collect()
    }

    async fn evaluate_indexed(
        &self,
        records: Vec<AnsweredRecord>,
        observer: &dyn ProgressObserver<EvaluationRecord>,
    ) -> Vec<(usize, EvaluationRecord)> {
        tracing::info!(
            records = records.len(),
            workers = self.config.workers,
            model = self.judge.model().model_id(),
            "Starting judge evaluation"
        );

        let judge = Arc::clone(&self.judge);
        let recompute = self.config.recompute_final_score;
        let work = move |record: AnsweredRecord| {
            let judge = Arc::clone(&judge);
            async move { evaluate_record(&judge, record, recompute).await }
        };
        let recover = |record: AnsweredRecord, reason: String| {
            EvaluationRecord::fallback(record, format!("Evaluation failed: {}", reason))
        };

        let results = run_bounded(
            records,
            PoolOptions {
                workers: self.config.workers,
                deadline: self.config.batch_timeout,
            },
            work,
            recover,
            observer,
        )
        .await;

        if !results.is_empty() {
            let total: f64 = results.iter().map(|(_, r)| r.final_score).sum();
            let avg = total / results.len() as f64;
            tracing::info!(
                evaluated = results.len(),
                avg_final_score = %format!("{:.2}", avg),
                "Judge evaluation complete"
            );
        }

        results
    }
}

async fn evaluate_record<M: ChatModel>(
    judge: &JudgeClient<M>,
    record: AnsweredRecord,
    recompute: bool,
) -> EvaluationRecord {
    match score_record(judge, &record, recompute).await {
        Ok(score) => EvaluationRecord::merge(record, score),
        Err(e) => {
            let query: String = record.question.query.chars().take(50).collect();
            tracing::error!(%query, error = %e, "Evaluation failed");
            EvaluationRecord::fallback(record, format!("Evaluation failed: {}", e))
        }
    }
}

async fn score_record<M: ChatModel>(
    judge: &JudgeClient<M>,
    record: &AnsweredRecord,
    recompute: bool,
) -> Result<ScoreRecord> {
    let question = &record.question;
    let prompt = build_judge_prompt(
        &question.query,
        &question.standard_answer,
        &record.agent_answer,
        &question.material,
        &question.page_range,
    );

    let response = judge.call(&prompt).await?;
    let score = parse_judge_response(&response);

    Ok(if recompute {
        score.with_recomputed_final()
    } else {
        score
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BenchError;
    use crate::eval::judge::RetryPolicy;
    use crate::eval::pool::DEADLINE_EXCEEDED;
    use crate::eval::progress::NoopObserver;
    use crate::eval::record::QuestionRecord;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Judge whose reply depends on markers in the question text.
    struct MarkerModel;

    fn query_number(user: &str) -> u32 {
        user.split("**Question:** q")
            .nth(1)
            .and_then(|rest| rest.split(|c: char| !c.is_ascii_digit()).next())
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    #[async_trait]
    impl ChatModel for MarkerModel {
        async fn complete(&self, _system: Option<&str>, user: &str) -> Result<String> {
            if user.contains("SLOW") {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            if user.contains("FAIL") {
                return Err(BenchError::JudgeTransport("connection reset".to_string()));
            }
            if user.contains("GARBAGE") {
                return Ok("I cannot score this.".to_string());
            }
            if user.contains("PANIC") {
                panic!("judge exploded");
            }

            let n = query_number(user) % 11;
            Ok(format!(
                "```json\n{{\"source_accuracy_score\": {n}, \"content_accuracy_score\": 5, \"completeness_score\": 5, \"relevance_score\": 5, \"final_score\": 9.9, \"overall_reasoning\": \"q{n}\"}}\n```"
            ))
        }

        fn model_id(&self) -> &str {
            "marker"
        }
    }

    fn evaluator(workers: usize) -> Evaluator<MarkerModel> {
        Evaluator::new(
            JudgeClient::new(
                MarkerModel,
                RetryPolicy {
                    max_attempts: 2,
                    backoff: Duration::ZERO,
                },
            ),
            EvaluatorConfig {
                workers,
                ..Default::default()
            },
        )
    }

    fn answered(query: &str) -> AnsweredRecord {
        AnsweredRecord::new(
            QuestionRecord {
                query: query.to_string(),
                standard_answer: "standard".to_string(),
                course: "course".to_string(),
                material: "material".to_string(),
                page_range: "1-2".to_string(),
                question_type: "type".to_string(),
            },
            "agent answer",
        )
    }

    fn batch(n: usize) -> Vec<AnsweredRecord> {
        (0..n)
            .map(|i| match i % 10 {
                3 => answered(&format!("q{i} FAIL")),
                7 => answered(&format!("q{i} GARBAGE")),
                _ => answered(&format!("q{i}")),
            })
            .collect()
    }

    fn sorted(mut records: Vec<EvaluationRecord>) -> Vec<EvaluationRecord> {
        records.sort_by(|a, b| a.query.cmp(&b.query));
        records
    }

    #[tokio::test]
    async fn test_every_record_yields_one_evaluation() {
        let results = evaluator(4).evaluate_batch(batch(20), &NoopObserver).await;
        assert_eq!(results.len(), 20);

        let failed = results.iter().find(|r| r.query == "q3 FAIL").unwrap();
        assert_eq!(failed.final_score, 0.0);
        assert!(failed.source_accuracy_reasoning.contains("Evaluation failed"));
        assert!(failed.source_accuracy_reasoning.contains("connection reset"));

        let garbage = results.iter().find(|r| r.query == "q7 GARBAGE").unwrap();
        assert_eq!(garbage.final_score, 0.0);
        assert!(garbage.source_accuracy_reasoning.contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_final_score_recomputed_from_sub_scores() {
        let record = evaluator(1).evaluate_one(answered("q10")).await;
        assert_eq!(record.source_accuracy_score, 10.0);
        assert!((record.final_score - 8.0).abs() < 1e-9);
        assert_eq!(record.course, "course");
        assert_eq!(record.material, "material");
        assert_eq!(record.question_type, "type");
        assert_eq!(record.page_range, "1-2");
    }

    #[tokio::test]
    async fn test_judge_final_score_kept_when_not_recomputing() {
        let evaluator = Evaluator::new(
            JudgeClient::new(MarkerModel, RetryPolicy::default()),
            EvaluatorConfig {
                workers: 1,
                recompute_final_score: false,
                batch_timeout: None,
            },
        );
        let record = evaluator.evaluate_one(answered("q10")).await;
        assert!((record.final_score - 9.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_same_results_across_worker_counts() {
        let one = sorted(evaluator(1).evaluate_batch(batch(50), &NoopObserver).await);
        let four = sorted(evaluator(4).evaluate_batch(batch(50), &NoopObserver).await);
        let sixteen = sorted(evaluator(16).evaluate_batch(batch(50), &NoopObserver).await);

        assert_eq!(one.len(), 50);
        assert_eq!(one, four);
        assert_eq!(one, sixteen);
    }

    #[tokio::test]
    async fn test_ordered_batch_follows_input() {
        let input = batch(12);
        let queries: Vec<String> = input.iter().map(|r| r.question.query.clone()).collect();
        let results = evaluator(8)
            .evaluate_batch_ordered(input, &NoopObserver)
            .await;
        let got: Vec<String> = results.into_iter().map(|r| r.query).collect();
        assert_eq!(got, queries);
    }

    #[tokio::test]
    async fn test_panicking_item_is_isolated() {
        let input = vec![answered("q1"), answered("q2 PANIC"), answered("q3")];
        let results = evaluator(3).evaluate_batch(input, &NoopObserver).await;

        assert_eq!(results.len(), 3);
        let panicked = results.iter().find(|r| r.query == "q2 PANIC").unwrap();
        assert_eq!(panicked.final_score, 0.0);
        assert!(panicked.source_accuracy_reasoning.contains("judge exploded"));
        assert!(results.iter().filter(|r| r.final_score > 0.0).count() == 2);
    }

    #[tokio::test]
    async fn test_batch_deadline_produces_fallbacks() {
        let evaluator = Evaluator::new(
            JudgeClient::new(MarkerModel, RetryPolicy::default()),
            EvaluatorConfig {
                workers: 4,
                recompute_final_score: true,
                batch_timeout: Some(Duration::from_millis(200)),
            },
        );
        let input = vec![answered("q1"), answered("q2 SLOW"), answered("q3")];
        let results = evaluator.evaluate_batch(input, &NoopObserver).await;

        assert_eq!(results.len(), 3);
        let slow = results.iter().find(|r| r.query == "q2 SLOW").unwrap();
        assert_eq!(slow.final_score, 0.0);
        assert!(slow.source_accuracy_reasoning.contains(DEADLINE_EXCEEDED));
    }

    #[derive(Default)]
    struct RecordingObserver {
        started: Mutex<Option<usize>>,
        seen: Mutex<HashSet<usize>>,
        finished: Mutex<Option<usize>>,
    }

    impl ProgressObserver<EvaluationRecord> for RecordingObserver {
        fn on_batch_start(&self, total: usize) {
            *self.started.lock().unwrap() = Some(total);
        }

        fn on_item_complete(&self, index: usize, _item: &EvaluationRecord) {
            assert!(self.seen.lock().unwrap().insert(index), "index reported twice");
        }

        fn on_batch_finish(&self, completed: usize) {
            *self.finished.lock().unwrap() = Some(completed);
        }
    }

    #[tokio::test]
    async fn test_observer_sees_each_item_once() {
        let observer = RecordingObserver::default();
        evaluator(4).evaluate_batch(batch(15), &observer).await;

        assert_eq!(*observer.started.lock().unwrap(), Some(15));
        assert_eq!(observer.seen.lock().unwrap().len(), 15);
        assert_eq!(*observer.finished.lock().unwrap(), Some(15));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let results = evaluator(4).evaluate_batch(Vec::new(), &NoopObserver).await;
        assert!(results.is_empty());
    }
}
