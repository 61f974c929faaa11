//! Benchmark runner: answer, judge and summarize every configured split.

use super::answer::{RagAgent, answer_batch};
use super::evaluator::Evaluator;
use super::progress::{NoopObserver, ProgressBarObserver};
use super::record::{AnsweredRecord, EvaluationRecord, QuestionRecord};
use super::stats::{BatchStatistics, PASS_THRESHOLD};
use crate::config::Config;
use crate::dataset;
use crate::error::{BenchError, Result};
use crate::llm::ChatModel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Result of running one split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitOutcome {
    pub split_name: String,
    pub success: bool,
    pub stats: Option<BatchStatistics>,
    pub output_file: Option<PathBuf>,
    pub error: Option<String>,
}

impl SplitOutcome {
    fn failed(split_name: &str, error: impl Into<String>) -> Self {
        Self {
            split_name: split_name.to_string(),
            success: false,
            stats: None,
            output_file: None,
            error: Some(error.into()),
        }
    }
}

/// All split outcomes of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// Timestamped directory holding this run's result files.
    pub run_dir: PathBuf,
    pub outcomes: Vec<SplitOutcome>,
    /// Total run time (seconds).
    pub total_time_secs: f64,
}

impl BenchmarkReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.success_count() == self.outcomes.len()
    }

    /// Print the per-split overview to stdout.
    pub fn print_summary(&self) {
        println!("\n========== Overall Summary ==========");
        for outcome in &self.outcomes {
            match (&outcome.stats, outcome.success) {
                (Some(stats), true) => println!(
                    "[ok]     {}: avg={:.2}, pass={:.1}% (>= {:.1})",
                    outcome.split_name, stats.avg_final_score, stats.pass_rate, PASS_THRESHOLD
                ),
                _ => println!(
                    "[failed] {}: {}",
                    outcome.split_name,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
        println!("----------------------------------------");
        println!(
            "Total: {}/{} splits completed successfully",
            self.success_count(),
            self.outcomes.len()
        );
        println!("Results directory: {}", self.run_dir.display());
        println!("Total time: {:.1}s", self.total_time_secs);
        println!("========================================\n");
    }
}

/// Drives the agent and the judge over the configured QA splits.
pub struct BenchmarkRunner<A, M> {
    config: Config,
    agent: Arc<A>,
    evaluator: Evaluator<M>,
    show_progress: bool,
}

impl<A, M> BenchmarkRunner<A, M>
where
    A: RagAgent + 'static,
    M: ChatModel + 'static,
{
    pub fn new(config: Config, agent: Arc<A>, evaluator: Evaluator<M>) -> Self {
        Self {
            config,
            agent,
            evaluator,
            show_progress: false,
        }
    }

    /// Show terminal progress bars for each stage.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run every available split into a fresh timestamped directory.
    ///
    /// Fails only when the split selection is invalid or no split has data;
    /// a failing split is reported in its [`SplitOutcome`].
    pub async fn run(&self) -> Result<BenchmarkReport> {
        let start = Instant::now();
        let bench = &self.config.benchmark;

        let splits = bench.splits.resolve()?;
        let available = dataset::check_splits(&bench.qa_data_dir, &splits);
        if available.is_empty() {
            return Err(BenchError::DatasetNotFound(bench.qa_data_dir.clone()));
        }

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let run_dir = self.config.judge_evaluation.output.directory.join(&timestamp);
        std::fs::create_dir_all(&run_dir).map_err(|e| BenchError::io(&run_dir, e))?;

        tracing::info!(
            splits = ?splits,
            available = available.len(),
            limit = ?bench.question_limit(),
            run_dir = %run_dir.display(),
            "Starting benchmark run"
        );

        let mut outcomes = Vec::with_capacity(available.len());
        for split in &splits {
            let Some(questions_path) = available.get(split) else {
                continue;
            };
            outcomes.push(self.run_split(split, questions_path, &run_dir).await);
        }

        Ok(BenchmarkReport {
            run_dir,
            outcomes,
            total_time_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Run one split end to end. Never fails; errors are carried in the outcome.
    pub async fn run_split(
        &self,
        split: &str,
        questions_path: &Path,
        run_dir: &Path,
    ) -> SplitOutcome {
        match self.process_split(split, questions_path, run_dir).await {
            Ok((stats, output_file)) => {
                stats.print_summary(&format!("Statistics for {}", split));
                SplitOutcome {
                    split_name: split.to_string(),
                    success: true,
                    stats: Some(stats),
                    output_file: Some(output_file),
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(split, error = %e, "Split failed");
                SplitOutcome::failed(split, e.to_string())
            }
        }
    }

    async fn process_split(
        &self,
        split: &str,
        questions_path: &Path,
        run_dir: &Path,
    ) -> Result<(BatchStatistics, PathBuf)> {
        let judge_config = &self.config.judge_evaluation;
        let questions =
            dataset::load_questions_csv(questions_path, self.config.benchmark.question_limit())?;
        tracing::info!(split, questions = questions.len(), "Loaded questions");

        let answered = self.answer(split, questions).await;
        if answered.is_empty() {
            return Err(BenchError::ItemProcessing(format!(
                "no questions with a non-empty query in {}",
                questions_path.display()
            )));
        }

        let evaluations = self.evaluate(split, answered).await;

        let output_file = run_dir.join(format!(
            "{}.{}",
            split,
            judge_config.output.format.extension()
        ));
        dataset::save_evaluations(
            &output_file,
            &evaluations,
            judge_config.output.format,
            judge_config.detailed_reasoning,
        )?;

        Ok((BatchStatistics::summarize(&evaluations), output_file))
    }

    async fn answer(
        &self,
        split: &str,
        questions: Vec<QuestionRecord>,
    ) -> Vec<AnsweredRecord> {
        let workers = self.config.judge_evaluation.workers;
        if self.show_progress {
            let observer = ProgressBarObserver::new(format!("{} answers", split));
            answer_batch(Arc::clone(&self.agent), questions, workers, &observer).await
        } else {
            answer_batch(Arc::clone(&self.agent), questions, workers, &NoopObserver).await
        }
    }

    async fn evaluate(&self, split: &str, answered: Vec<AnsweredRecord>) -> Vec<EvaluationRecord> {
        if self.show_progress {
            let observer = ProgressBarObserver::new(format!("{} judge", split));
            self.evaluator.evaluate_batch_ordered(answered, &observer).await
        } else {
            self.evaluator.evaluate_batch_ordered(answered, &NoopObserver).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OutputFormat, SplitSelection};
    use crate::eval::evaluator::EvaluatorConfig;
    use crate::eval::judge::{JudgeClient, RetryPolicy};
    use crate::llm::Message;
    use async_trait::async_trait;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const HEADER: &str = "query,standard_answer,course,material,page_range,question_type\n";
    const MAO: &str = "Mao_Zedong_Thought";
    const MARXISM: &str = "Principles_of_Marxism";
    const HISTORY: &str = "Outline_of_Modern_and_Contemporary_Chinese_History";

    fn write_split(qa: &Path, split: &str, rows: &str) {
        fs::create_dir_all(qa).unwrap();
        fs::write(qa.join(format!("{split}.csv")), format!("{HEADER}{rows}")).unwrap();
    }

    struct FixedAgent;

    #[async_trait]
    impl RagAgent for FixedAgent {
        async fn answer_question(
            &self,
            query: &str,
            _chat_history: Option<&[Message]>,
        ) -> Result<String> {
            Ok(format!("Per the notes, {}", query))
        }
    }

    /// Judge that passes answers to "good" questions and fails the rest.
    struct KeywordJudge;

    #[async_trait]
    impl ChatModel for KeywordJudge {
        async fn complete(&self, _system: Option<&str>, user: &str) -> Result<String> {
            let score = if user.contains("**Question:** good") { 9.0 } else { 2.0 };
            Ok(format!(
                "```json\n{{\"source_accuracy_score\": {s}, \"content_accuracy_score\": {s}, \
                 \"completeness_score\": {s}, \"relevance_score\": {s}, \"final_score\": {s}, \
                 \"overall_reasoning\": \"ok\"}}\n```",
                s = score
            ))
        }

        fn model_id(&self) -> &str {
            "keyword-judge"
        }
    }

    fn runner(config: Config) -> BenchmarkRunner<FixedAgent, KeywordJudge> {
        let judge = JudgeClient::new(
            KeywordJudge,
            RetryPolicy {
                max_attempts: 1,
                backoff: Duration::ZERO,
            },
        );
        BenchmarkRunner::new(
            config,
            Arc::new(FixedAgent),
            Evaluator::new(judge, EvaluatorConfig::default()),
        )
    }

    fn config_for(dir: &TempDir, splits: SplitSelection) -> Config {
        let mut config = Config::default();
        config.benchmark.qa_data_dir = dir.path().join("QA_data");
        config.benchmark.splits = splits;
        config.judge_evaluation.output.directory = dir.path().join("results");
        config
    }

    #[tokio::test]
    async fn test_run_available_splits() {
        let dir = TempDir::new().unwrap();
        write_split(
            &dir.path().join("QA_data"),
            MAO,
            "good one,a,c,m,1,t\nbad one,a,c,m,2,t\n  ,a,c,m,3,t\ngood two,a,c,m,4,t\n",
        );

        let config = config_for(
            &dir,
            SplitSelection::Many(vec![MAO.to_string(), MARXISM.to_string()]),
        );
        let report = runner(config).run().await.unwrap();

        // The second split has no file and is skipped.
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.all_succeeded());
        assert!(report.run_dir.starts_with(dir.path().join("results")));

        let outcome = &report.outcomes[0];
        let stats = outcome.stats.as_ref().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.pass_count, 2);

        let output_file = outcome.output_file.as_ref().unwrap();
        assert_eq!(output_file, &report.run_dir.join(format!("{MAO}.csv")));
        let saved = dataset::load_evaluations(output_file).unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved[0].query, "good one");
        assert_eq!(saved[0].agent_answer, "Per the notes, good one");
    }

    #[tokio::test]
    async fn test_question_limit_and_json_output() {
        let dir = TempDir::new().unwrap();
        write_split(
            &dir.path().join("QA_data"),
            HISTORY,
            "good a,x,c,m,1,t\ngood b,x,c,m,1,t\nbad c,x,c,m,1,t\n",
        );

        let mut config = config_for(&dir, SplitSelection::One(HISTORY.to_string()));
        config.benchmark.max_questions_per_split = Some(2);
        config.judge_evaluation.output.format = OutputFormat::Json;

        let report = runner(config).run().await.unwrap();
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.stats.as_ref().unwrap().total, 2);
        assert_eq!(
            outcome.output_file.as_ref().unwrap().extension().unwrap(),
            "json"
        );
    }

    #[tokio::test]
    async fn test_split_with_only_empty_queries_fails_alone() {
        let dir = TempDir::new().unwrap();
        let qa = dir.path().join("QA_data");
        write_split(&qa, MAO, "good,a,c,m,1,t\n");
        write_split(&qa, MARXISM, "   ,a,c,m,1,t\n");

        let config = config_for(
            &dir,
            SplitSelection::Many(vec![MAO.to_string(), MARXISM.to_string()]),
        );
        let report = runner(config).run().await.unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.success_count(), 1);
        let empty = report
            .outcomes
            .iter()
            .find(|o| o.split_name == MARXISM)
            .unwrap();
        assert!(!empty.success);
        assert!(empty.error.as_deref().unwrap().contains("non-empty query"));
    }

    #[tokio::test]
    async fn test_no_datasets_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, SplitSelection::default());
        let err = runner(config).run().await.unwrap_err();
        assert!(matches!(err, BenchError::DatasetNotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_split_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = config_for(&dir, SplitSelection::One("medium".to_string()));
        let err = runner(config).run().await.unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }
}
