//! RAG Judge Bench - LLM-as-judge evaluation for retrieval-augmented agents.
//!
//! A RAG agent answers benchmark questions; a judge model scores each answer
//! against a reference answer and its source citation on four weighted
//! dimensions; the scores are aggregated into per-split statistics.
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_judge_bench::{
//!     config::Config,
//!     dataset::{load_answered_csv, save_evaluations},
//!     eval::{BatchStatistics, Evaluator, EvaluatorConfig, JudgeClient, NoopObserver},
//! };
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     let judge = JudgeClient::from_config(config.api.clone());
//!     let evaluator = Evaluator::new(judge, EvaluatorConfig::from(&config.judge_evaluation));
//!
//!     let answered = load_answered_csv(Path::new("answers.csv"))?;
//!     let results = evaluator.evaluate_batch(answered, &NoopObserver).await;
//!
//!     save_evaluations(
//!         Path::new("evaluation.csv"),
//!         &results,
//!         config.judge_evaluation.output.format,
//!         config.judge_evaluation.detailed_reasoning,
//!     )?;
//!     BatchStatistics::summarize(&results).print_summary("Evaluation");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **LlmClient**: OpenAI-compatible chat client shared by judge and agent
//! - **JudgeClient**: bounded retry around the judge call
//! - **Evaluator**: bounded worker pool producing one record per input
//! - **BatchStatistics**: weighted composite and pass-rate summary
//! - **BenchmarkRunner**: answer, judge and save each QA split

pub mod config;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod llm;

// Re-export commonly used types
pub use config::Config;
pub use error::{BenchError, Result};
pub use eval::{BatchStatistics, EvaluationRecord, Evaluator, JudgeClient};
pub use llm::LlmClient;
